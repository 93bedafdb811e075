/*!
The dashboard page.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use time::Date;

use crate::config::Glob;
use crate::dashboard::{aggregate, Dashboard};
use crate::error::SkedError;
use crate::user::{Identity, Role};
use crate::week::{Week, WeekQuery};
use super::*;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardPage<'a> {
    title: &'static str,
    user: &'a Identity,
    offset: i64,
    amount: i64,
    week_range_label: String,
    week_start: Date,
    week_end: Date,
    #[serde(flatten)]
    view: &'a Dashboard,
}

fn title(role: Role) -> &'static str {
    match role {
        Role::Student => "Student dashboard",
        Role::Teacher => "Teacher dashboard",
        Role::Admin => "Administrator dashboard",
    }
}

pub async fn dashboard(
    Extension(glob): Extension<Arc<Glob>>,
    Extension(who): Extension<Identity>,
    Query(query): Query<WeekQuery>,
) -> Response {
    log::trace!("dashboard( {} {}, {:?} ) called.", &who.role, &who.id, &query);

    let nav = query.resolve();
    let week = match Week::containing(glob.today(), nav.offset) {
        Some(week) => week,
        None => {
            return respond_bad_request("That week is out of range.".to_owned());
        },
    };

    let view = match aggregate(&glob.store, &who, &week, glob.utc_offset).await {
        Ok(Some(view)) => view,
        Ok(None) => { return respond_forbidden(); },
        Err(e) => { return SkedError::from(e).into_response(); },
    };

    let page = DashboardPage {
        title: title(who.role),
        user: &who,
        offset: nav.offset,
        amount: nav.amount,
        week_range_label: week.label(),
        week_start: week.start,
        week_end: week.end,
        view: &view,
    };

    serve_template(StatusCode::OK, view.template(), &page, vec![])
}
