/*!
Homework assignments, set and maintained by teachers.

`teacher_only` has already checked the role; whether a teacher owns the
assignment they're changing is checked by the `Store`.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Form, Path},
    response::Redirect,
};

use crate::config::Glob;
use crate::error::SkedError;
use crate::sched::AssignmentForm;
use crate::user::Identity;

pub async fn create_assignment(
    Extension(glob): Extension<Arc<Glob>>,
    Extension(who): Extension<Identity>,
    Form(form): Form<AssignmentForm>,
) -> Result<Redirect, SkedError> {
    log::trace!("teacher::create_assignment( {}, {:?} ) called.", &who.id, &form);

    let na = form.to_new(who.id, glob.utc_offset)?;
    let id = glob.store.insert_assignment(&na).await?;
    log::info!("Teacher {} set assignment {}.", &who.id, &id);
    Ok(Redirect::to("/dashboard"))
}

pub async fn update_assignment(
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Extension(who): Extension<Identity>,
    Form(form): Form<AssignmentForm>,
) -> Result<Redirect, SkedError> {
    log::trace!(
        "teacher::update_assignment( {}, {}, {:?} ) called.",
        &id, &who.id, &form
    );

    let patch = form.to_patch(glob.utc_offset)?;
    glob.store.update_assignment(id, who.id, patch).await?;
    Ok(Redirect::to("/dashboard"))
}

pub async fn delete_assignment(
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Extension(who): Extension<Identity>,
) -> Result<Redirect, SkedError> {
    log::trace!("teacher::delete_assignment( {}, {} ) called.", &id, &who.id);

    glob.store.delete_assignment(id, who.id).await?;
    Ok(Redirect::to("/dashboard"))
}

#[cfg(test)]
mod tests {
    use crate::inter::{router, tests::*};
    use crate::sched::Day;
    use crate::store::tests::{add_slot, add_user};
    use crate::user::Role;

    use axum::http::StatusCode;
    use serial_test::serial;
    use time::macros::datetime;
    use tower::ServiceExt;

    #[tokio::test]
    async fn incomplete_form_refused() {
        let glob = test_glob();
        let t = cookie_for(&glob, identity(2, Role::Teacher)).await;

        let r = router(glob.clone())
            .oneshot(post_req("/assignments/create", Some(&t), "homework=Read"))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);

        let form = "scheduleId=1&groupName=3011&subjectText=Physics&homework=Read\
            &dueDate=someday";
        let r = router(glob)
            .oneshot(post_req("/assignments/create", Some(&t), form))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[serial]
    async fn assignment_lifecycle() {
        let glob = db_glob().await;

        let author = add_user(&glob.store, Role::Teacher, "petrov", None).await;
        let other = add_user(&glob.store, Role::Teacher, "ivanova", None).await;
        let author_c = cookie_for(&glob, author.identity()).await;
        let other_c = cookie_for(&glob, other.identity()).await;
        let slot = add_slot(&glob.store, Day::Mon, "3011").await;

        // Slot belongs to another group.
        let form = format!(
            "scheduleId={}&groupName=4051&subjectText=Physics&homework=Read&dueDate=2024-03-15",
            slot
        );
        let r = router(glob.clone())
            .oneshot(post_req("/assignments/create", Some(&author_c), &form))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
        assert!(glob.store.get_all_assignments().await.unwrap().is_empty());

        let form = format!(
            "scheduleId={}&groupName=3011&subjectText=Mechanics&homework=Read\
            &dueDate=2024-03-15T18%3A00%3A00Z",
            slot
        );
        let r = router(glob.clone())
            .oneshot(post_req("/assignments/create", Some(&author_c), &form))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&r), Some("/dashboard"));

        let rows = glob.store.get_all_assignments().await.unwrap();
        assert_eq!(rows.len(), 1);
        let a = &rows[0].assignment;
        assert_eq!(a.created_by, author.id);
        assert_eq!(a.due_date, datetime!(2024-03-15 18:00 UTC));

        let uri = format!("/assignments/{}/update", a.id);
        let r = router(glob.clone())
            .oneshot(post_req(&uri, Some(&other_c), "homework=Nothing"))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::FORBIDDEN);

        let r = router(glob.clone())
            .oneshot(post_req(&uri, Some(&author_c), "extendedPenalty=10"))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        let updated = glob.store.get_assignment(a.id).await.unwrap().unwrap();
        assert_eq!(updated.extended_penalty, Some(10));
        assert_eq!(updated.homework, "Read");

        let r = router(glob.clone())
            .oneshot(get_req("/assignments", Some(&other_c)))
            .await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_string(r).await).unwrap();
        assert_eq!(json.as_array().map(|v| v.len()), Some(0));

        let r = router(glob.clone())
            .oneshot(get_req("/assignments", Some(&author_c)))
            .await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_string(r).await).unwrap();
        assert_eq!(json[0]["displaySubject"], "Mechanics");
        assert_eq!(json[0]["createdByUserId"], author.id);
        assert_eq!(json[0]["teacherEmail"], "petrov@school.test");

        let uri = format!("/assignments/{}/delete", a.id);
        let r = router(glob.clone())
            .oneshot(post_req(&uri, Some(&other_c), ""))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::FORBIDDEN);
        let r = router(glob.clone())
            .oneshot(post_req(&uri, Some(&author_c), ""))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert!(glob.store.get_assignment(a.id).await.unwrap().is_none());
        glob.store.nuke_database().await.unwrap();
    }
}
