/*!
JSON listings of slots, assignments, and events.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::config::Glob;
use crate::error::SkedError;
use crate::user::{Identity, Role};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    pub group_name: Option<String>,
}

/// Every slot, or just those of `?groupName=`.
pub async fn schedule(
    Extension(glob): Extension<Arc<Glob>>,
    Query(query): Query<ScheduleQuery>,
) -> Response {
    log::trace!("api::schedule( {:?} ) called.", &query);

    let group = query.group_name.as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty());

    match glob.store.get_slots(group).await {
        Ok(slots) => Json(slots).into_response(),
        Err(e) => SkedError::from(e).into_response(),
    }
}

/// Teachers get their own assignments, admins get all of them, and
/// students get nothing.
pub async fn assignments(
    Extension(glob): Extension<Arc<Glob>>,
    Extension(who): Extension<Identity>,
) -> Response {
    log::trace!("api::assignments( {} {} ) called.", &who.role, &who.id);

    let res = match who.role {
        Role::Teacher => glob.store.get_assignments_by_author(who.id).await,
        Role::Admin => glob.store.get_all_assignments().await,
        Role::Student => {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Forbidden" })),
            ).into_response();
        },
    };

    match res {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => SkedError::from(e).into_response(),
    }
}

pub async fn events(Extension(glob): Extension<Arc<Glob>>) -> Response {
    log::trace!("api::events() called.");

    match glob.store.get_all_events().await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => SkedError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inter::{router, tests::*};

    use tower::ServiceExt;

    #[tokio::test]
    async fn students_cannot_list_assignments() {
        let glob = test_glob();
        let c = cookie_for(&glob, identity(1, Role::Student)).await;

        let r = router(glob).oneshot(get_req("/assignments", Some(&c))).await.unwrap();
        assert_eq!(r.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_str(&body_string(r).await).unwrap();
        assert_eq!(body, json!({ "error": "Forbidden" }));
    }
}
