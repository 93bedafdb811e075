/*!
Changes to the timetable and to events, which only admins may make.

The role check happens in `admin_only`, in front of all of these.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Form, Path},
    response::Redirect,
};

use crate::config::Glob;
use crate::error::SkedError;
use crate::sched::{EventForm, SlotForm};

pub async fn create_slot(
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<SlotForm>,
) -> Result<Redirect, SkedError> {
    log::trace!("admin::create_slot( {:?} ) called.", &form);

    let ns = form.to_new()?;
    let id = glob.store.insert_slot(&ns).await?;
    log::info!("Created schedule slot {}.", &id);
    Ok(Redirect::to("/dashboard"))
}

pub async fn update_slot(
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<SlotForm>,
) -> Result<Redirect, SkedError> {
    log::trace!("admin::update_slot( {}, {:?} ) called.", &id, &form);

    let patch = form.to_patch()?;
    glob.store.update_slot(id, patch).await?;
    Ok(Redirect::to("/dashboard"))
}

pub async fn delete_slot(
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Result<Redirect, SkedError> {
    log::trace!("admin::delete_slot( {} ) called.", &id);

    glob.store.delete_slot(id).await?;
    Ok(Redirect::to("/dashboard"))
}

pub async fn create_event(
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<EventForm>,
) -> Result<Redirect, SkedError> {
    log::trace!("admin::create_event( {:?} ) called.", &form);

    let ne = form.to_new(glob.utc_offset)?;
    let id = glob.store.insert_event(&ne).await?;
    log::info!("Created event {}.", &id);
    Ok(Redirect::to("/dashboard"))
}

pub async fn update_event(
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<EventForm>,
) -> Result<Redirect, SkedError> {
    log::trace!("admin::update_event( {}, {:?} ) called.", &id, &form);

    let patch = form.to_patch(glob.utc_offset)?;
    glob.store.update_event(id, patch).await?;
    Ok(Redirect::to("/dashboard"))
}

pub async fn delete_event(
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Result<Redirect, SkedError> {
    log::trace!("admin::delete_event( {} ) called.", &id);

    glob.store.delete_event(id).await?;
    Ok(Redirect::to("/dashboard"))
}

#[cfg(test)]
mod tests {
    use crate::inter::{router, tests::*};
    use crate::sched::Day;
    use crate::user::Role;

    use axum::http::StatusCode;
    use serial_test::serial;
    use time::macros::time;
    use tower::ServiceExt;

    #[tokio::test]
    #[serial]
    async fn slot_lifecycle() {
        let glob = db_glob().await;
        let admin = cookie_for(&glob, identity(1, Role::Admin)).await;

        let form = "dayOfWeek=Wednesday&startTime=09%3A00&endTime=10%3A30\
            &subject=+Math+&groupName=3011&room=&teacherName=Ivanova";
        let r = router(glob.clone())
            .oneshot(post_req("/schedule/create", Some(&admin), form))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&r), Some("/dashboard"));

        let slots = glob.store.get_slots(None).await.unwrap();
        assert_eq!(slots.len(), 1);
        let s = &slots[0];
        assert_eq!(s.day_of_week, Day::Wed);
        assert_eq!(s.subject, "Math");
        assert_eq!(s.room, None);
        assert_eq!(s.teacher_name.as_deref(), Some("Ivanova"));

        // Blank required fields keep their values; a blank room stays cleared.
        let uri = format!("/schedule/{}/update", s.id);
        let r = router(glob.clone())
            .oneshot(post_req(&uri, Some(&admin), "subject=&startTime=08%3A30&room=2-203"))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        let s = glob.store.get_slot(s.id).await.unwrap().unwrap();
        assert_eq!(s.subject, "Math");
        assert_eq!(s.start_time, time!(8:30));
        assert_eq!(s.room.as_deref(), Some("2-203"));

        let r = router(glob.clone())
            .oneshot(post_req("/schedule/999999/update", Some(&admin), "subject=X"))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::NOT_FOUND);

        let r = router(glob.clone())
            .oneshot(get_req("/api/schedule?groupName=3011", Some(&admin)))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(r).await).unwrap();
        assert_eq!(json[0]["dayOfWeek"], "wed");
        assert_eq!(json[0]["startTime"], "08:30");
        assert_eq!(json[0]["groupName"], "3011");

        let uri = format!("/schedule/{}/delete", s.id);
        for _ in 0..2 {
            let r = router(glob.clone())
                .oneshot(post_req(&uri, Some(&admin), ""))
                .await.unwrap();
            assert_eq!(r.status(), StatusCode::SEE_OTHER);
        }
        assert!(glob.store.get_slots(None).await.unwrap().is_empty());
        glob.store.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn event_lifecycle() {
        let glob = db_glob().await;
        let admin = cookie_for(&glob, identity(1, Role::Admin)).await;

        let form = "title=Science+fair&date=2024-03-13T10%3A00&startTime=12%3A00\
            &endTime=13%3A00&groupName=";
        let r = router(glob.clone())
            .oneshot(post_req("/events/create", Some(&admin), form))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::SEE_OTHER);

        let events = glob.store.get_all_events().await.unwrap();
        assert_eq!(events.len(), 1);
        let e = &events[0].event;
        assert_eq!(e.group_name, None);

        let uri = format!("/events/{}/update", e.id);
        let r = router(glob.clone())
            .oneshot(post_req(&uri, Some(&admin), "groupName=3051&endTime=11%3A00"))
            .await.unwrap();
        // Ends before it starts.
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);

        let r = router(glob.clone())
            .oneshot(post_req(&uri, Some(&admin), "groupName=3051"))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        let e = glob.store.get_event(e.id).await.unwrap().unwrap();
        assert_eq!(e.group_name.as_deref(), Some("3051"));
        assert_eq!(e.title, "Science fair");

        let r = router(glob.clone())
            .oneshot(get_req("/events", Some(&admin)))
            .await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_string(r).await).unwrap();
        assert_eq!(json[0]["date"], "2024-03-13");
        assert_eq!(json[0]["groupName"], "3051");

        let uri = format!("/events/{}/delete", e.id);
        let r = router(glob.clone())
            .oneshot(post_req(&uri, Some(&admin), ""))
            .await.unwrap();
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert!(glob.store.get_event(e.id).await.unwrap().is_none());
        glob.store.nuke_database().await.unwrap();
    }
}
