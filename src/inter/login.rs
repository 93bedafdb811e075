/*!
Landing page, logging in and out, and registration.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Form, Path},
    http::{header, header::HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::auth;
use crate::config::Glob;
use crate::error::SkedError;
use crate::user::{RegistrationForm, Role};
use super::*;

/// Form data from the login page. Deliberately not `Debug`.
#[derive(Deserialize)]
pub struct LoginForm {
    pub login: Option<String>,
    pub password: Option<String>,
}

fn register_title(role: Role) -> &'static str {
    match role {
        Role::Student => "Student registration",
        Role::Teacher => "Teacher registration",
        Role::Admin => "Administrator registration",
    }
}

/// Serve `template`, unless someone's already logged in, in which case
/// send them to their dashboard.
async fn anonymous_page(
    glob: &Glob,
    headers: &HeaderMap,
    template: &str,
    title: &str,
) -> Response {
    if current_identity(glob, headers).await.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    serve_template(
        StatusCode::OK,
        template,
        &json!({ "title": title, "error": null }),
        vec![]
    )
}

pub async fn index(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("login::index() called.");
    anonymous_page(&glob, &headers, "index", "Welcome").await
}

pub async fn login_page(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("login::login_page() called.");
    anonymous_page(&glob, &headers, "login", "Log in").await
}

pub async fn login(
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<LoginForm>,
) -> Response {
    let login = form.login.unwrap_or_default().trim().to_owned();
    let password = form.password.unwrap_or_default();
    log::trace!("login::login( {:?}, [ password ] ) called.", &login);

    match auth::login(&glob.store, &login, &password).await {
        Ok(who) => {
            log::info!("{} {} logged in.", &who.role, &who.id);
            start_session(&glob, who).await
        },
        Err(SkedError::Authentication) => serve_template(
            StatusCode::BAD_REQUEST,
            "login",
            &json!({
                "title": "Log in",
                "error": SkedError::Authentication.to_string(),
                "login": &login,
            }),
            vec![]
        ),
        Err(e) => e.into_response(),
    }
}

pub async fn register_choice(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("login::register_choice() called.");
    anonymous_page(&glob, &headers, "register_choice", "Register").await
}

pub async fn register_page(Path(role): Path<String>) -> Response {
    log::trace!("login::register_page( {:?} ) called.", &role);

    let role: Role = match role.parse() {
        Ok(role) => role,
        Err(_) => { return respond_not_found().await; },
    };

    serve_template(
        StatusCode::OK,
        &format!("register_{}", &role),
        &json!({ "title": register_title(role), "error": null }),
        vec![]
    )
}

pub async fn register(
    Path(role): Path<String>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<RegistrationForm>,
) -> Response {
    log::trace!("login::register( {:?}, [ form ] ) called.", &role);

    let role: Role = match role.parse() {
        Ok(role) => role,
        Err(_) => { return respond_not_found().await; },
    };

    let res = match form.validate(role) {
        Ok(reg) => auth::register(&glob.store, reg).await,
        Err(e) => Err(e),
    };

    match res {
        Ok(who) => start_session(&glob, who).await,
        Err(e @ SkedError::Validation(_)) | Err(e @ SkedError::Duplicate(_)) => {
            serve_template(
                StatusCode::BAD_REQUEST,
                &format!("register_{}", &role),
                &json!({
                    "title": register_title(role),
                    "error": e.to_string(),
                    "fullName": &form.full_name,
                    "groupName": &form.group_name,
                    "subject": &form.subject,
                    "email": &form.email,
                    "login": &form.login,
                    "phone": &form.phone,
                }),
                vec![]
            )
        },
        Err(e) => e.into_response(),
    }
}

pub async fn logout(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("login::logout() called.");

    if let Some(key) = session_key(&headers, &glob.cookie_name) {
        if glob.sessions.write().await.destroy(&key) {
            log::trace!("Session ended.");
        }
    }

    match expired_cookie(&glob.cookie_name) {
        Ok(cookie) => Redirect::to("/login")
            .add_headers(vec![(header::SET_COOKIE, cookie)]),
        Err(e) => e.into_response(),
    }
}
