/*!
Interoperation between the client (user) and server.

(Not the application and the database; that's covered by `auth` and `store`.)
*/
use std::{
    fmt::Debug,
    path::Path,
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::Extension,
    http::{header, Request, StatusCode},
    http::header::{HeaderMap, HeaderName, HeaderValue},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use handlebars::Handlebars;
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::json;
use tower_http::services::ServeDir;

use crate::config::Glob;
use crate::error::SkedError;
use crate::user::{Identity, Role};

pub mod admin;
pub mod api;
pub mod dashboard;
pub mod login;
pub mod teacher;

static TEMPLATES: OnceCell<Handlebars> = OnceCell::new();

static HTML_500: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>homeroom | Error</title>
<link rel="stylesheet" href="/static/homeroom.css">
</head>
<body>
<h1>Internal Server Error</h1>
<p>(Error 500)</p>
<p>Something went wrong on our end. No further or more
helpful information is available about the problem.</p>
</body>
</html>"#;

trait AddHeaders: IntoResponse + Sized {
    fn add_headers(self, mut new_headers: Vec<(HeaderName, HeaderValue)>) -> Response {
        let mut r = self.into_response();
        let r_headers = r.headers_mut();
        for (name, value) in new_headers.drain(..) {
            r_headers.insert(name, value);
        }

        r
    }
}

impl<T: IntoResponse + Sized> AddHeaders for T {}

/**
Initializes the resources used in this module. This function should be called
before any functionality of this module or any of its submodules is used.

Currently the only thing that happens here is loading the templates used by
`serve_template()`, which will respond with a 500 until `init()` has been
called.

The argument is the path to the directory where the templates used by
`serve_template()` can be found.
*/
pub fn init<P: AsRef<Path>>(template_dir: P) -> Result<(), String> {
    if TEMPLATES.get().is_some() {
        log::warn!("Templates directory already initialized; ignoring.");
        return Ok(())
    }

    let template_dir = template_dir.as_ref();

    let mut h = Handlebars::new();
    #[cfg(debug_assertions)]
    h.set_dev_mode(true);
    h.register_templates_directory(".html", template_dir)
        .map_err(|e| format!(
            "Error registering templates directory {}: {}",
            template_dir.display(), &e
        ))?;

    TEMPLATES.set(h)
        .map_err(|old_h| {
            let mut estr = String::from("Templates directory already registered w/templates:");
            for template_name in old_h.get_templates().keys() {
                estr.push('\n');
                estr.push_str(template_name.as_str());
            }
            estr
        })?;

    Ok(())
}

/**
Return an HTML response in the case of an unrecoverable* error.

(*"Unrecoverable" from the perspective of fielding the current request,
not from the perspective of the program crashing.)
*/
pub fn html_500() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(HTML_500)
    ).into_response()
}

pub fn serve_template<S>(
    code: StatusCode,
    template_name: &str,
    data: &S,
    addl_headers: Vec<(HeaderName, HeaderValue)>
) -> Response
where
    S: Serialize + Debug
{
    log::trace!("serve_template( {}, {:?}, ... ) called.", &code, template_name);

    let templates = match TEMPLATES.get() {
        Some(t) => t,
        None => {
            log::error!("serve_template() called before inter::init().");
            return html_500();
        },
    };

    match templates.render(template_name, data) {
        Ok(response_body) => (
            code,
            Html(response_body)
        ).add_headers(addl_headers),
        Err(e) => {
            log::error!(
                "Error rendering template {:?} with data {:?}:\n{}",
                template_name, data, &e
            );
            html_500()
        },
    }
}

pub fn respond_bad_request(msg: String) -> Response {
    log::trace!("respond_bad_request( {:?} ) called.", &msg);

    (
        StatusCode::BAD_REQUEST,
        msg
    ).into_response()
}

/// The page shown to someone whose role doesn't let them in.
pub fn respond_forbidden() -> Response {
    log::trace!("respond_forbidden() called.");

    serve_template(
        StatusCode::FORBIDDEN,
        "forbidden",
        &json!({ "title": "Access denied" }),
        vec![]
    )
}

pub async fn respond_not_found() -> Response {
    serve_template(
        StatusCode::NOT_FOUND,
        "not_found",
        &json!({ "title": "Not found" }),
        vec![]
    )
}

impl IntoResponse for SkedError {
    fn into_response(self) -> Response {
        match self {
            SkedError::Validation(_) | SkedError::Mismatch(_)
            | SkedError::Authentication | SkedError::Duplicate(_) => {
                respond_bad_request(self.to_string())
            },
            SkedError::Unauthenticated => Redirect::to("/login").into_response(),
            SkedError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg).into_response(),
            SkedError::NotFound => (StatusCode::NOT_FOUND, self.to_string()).into_response(),
            SkedError::Db(e) => {
                log::error!("Database error: {}", e.display());
                html_500()
            },
            SkedError::Internal(msg) => {
                log::error!("Internal error: {}", &msg);
                html_500()
            },
        }
    }
}

/// Value of the cookie named `cookie_name`, if the request has one.
fn session_key(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE).iter() {
        let s = match value.to_str() {
            Ok(s) => s,
            Err(_) => { continue; },
        };
        for pair in s.split(';') {
            if let Some((name, val)) = pair.trim().split_once('=') {
                if name == cookie_name && !val.is_empty() {
                    return Some(val.to_owned());
                }
            }
        }
    }

    None
}

/// `Set-Cookie` value that hands out session `key` for `lifetime`.
fn session_cookie(
    cookie_name: &str,
    key: &str,
    lifetime: Duration,
) -> Result<HeaderValue, SkedError> {
    let s = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        cookie_name, key, lifetime.as_secs()
    );
    HeaderValue::from_str(&s)
        .map_err(|e| SkedError::Internal(format!("Bad session cookie: {}", &e)))
}

/// `Set-Cookie` value that makes the browser forget the session.
fn expired_cookie(cookie_name: &str) -> Result<HeaderValue, SkedError> {
    let s = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        cookie_name
    );
    HeaderValue::from_str(&s)
        .map_err(|e| SkedError::Internal(format!("Bad session cookie: {}", &e)))
}

/// Who's logged in on the session this request carries, if anyone.
pub async fn current_identity(glob: &Glob, headers: &HeaderMap) -> Option<Identity> {
    let key = session_key(headers, &glob.cookie_name)?;
    glob.sessions.write().await.get(&key)
}

/// Start a session for `who` and send them to their dashboard.
async fn start_session(glob: &Glob, who: Identity) -> Response {
    let (key, lifetime) = {
        let mut sessions = glob.sessions.write().await;
        let lifetime = sessions.lifetime();
        (sessions.issue(who), lifetime)
    };

    match session_cookie(&glob.cookie_name, &key, lifetime) {
        Ok(cookie) => Redirect::to("/dashboard")
            .add_headers(vec![(header::SET_COOKIE, cookie)]),
        Err(e) => e.into_response(),
    }
}

/**
Middleware that lets through only requests carrying a live session. The
session's `Identity` is added to the request's extensions for the
handlers (and the role gates) behind it.
*/
pub async fn require_session<B>(
    mut req: Request<B>,
    next: Next<B>,
) -> Response {
    let glob: Arc<Glob> = match req.extensions().get::<Arc<Glob>>() {
        Some(glob) => glob.clone(),
        None => {
            log::error!("Global state missing from request extensions.");
            return html_500();
        },
    };

    match current_identity(&glob, req.headers()).await {
        Some(who) => {
            log::trace!("Request from {} {}.", &who.role, &who.id);
            req.extensions_mut().insert(who);
            next.run(req).await
        },
        None => SkedError::Unauthenticated.into_response(),
    }
}

/// `None` if the request's session belongs to one of `allowed`, otherwise
/// the response to send instead.
fn role_gate<B>(req: &Request<B>, allowed: &[Role]) -> Option<Response> {
    match req.extensions().get::<Identity>() {
        None => Some(SkedError::Unauthenticated.into_response()),
        Some(who) if allowed.contains(&who.role) => None,
        Some(who) => {
            log::info!(
                "{} {} refused access to {}.",
                &who.role, &who.id, req.uri().path()
            );
            Some(respond_forbidden())
        },
    }
}

pub async fn admin_only<B>(req: Request<B>, next: Next<B>) -> Response {
    if let Some(r) = role_gate(&req, &[Role::Admin]) {
        return r;
    }
    next.run(req).await
}

pub async fn teacher_only<B>(req: Request<B>, next: Next<B>) -> Response {
    if let Some(r) = role_gate(&req, &[Role::Teacher]) {
        return r;
    }
    next.run(req).await
}

/// The whole application.
pub fn router(glob: Arc<Glob>) -> Router {
    let admin_routes = Router::new()
        .route("/schedule/create", post(admin::create_slot))
        .route("/schedule/:id/update", post(admin::update_slot))
        .route("/schedule/:id/delete", post(admin::delete_slot))
        .route("/events/create", post(admin::create_event))
        .route("/events/:id/update", post(admin::update_event))
        .route("/events/:id/delete", post(admin::delete_event))
        .route_layer(middleware::from_fn(admin_only));

    let teacher_routes = Router::new()
        .route("/assignments/create", post(teacher::create_assignment))
        .route("/assignments/:id/update", post(teacher::update_assignment))
        .route("/assignments/:id/delete", post(teacher::delete_assignment))
        .route_layer(middleware::from_fn(teacher_only));

    let session_routes = Router::new()
        .route("/dashboard", get(dashboard::dashboard))
        .route("/schedule", get(api::schedule))
        .route("/api/schedule", get(api::schedule))
        .route("/assignments", get(api::assignments))
        .route("/events", get(api::events))
        .merge(admin_routes)
        .merge(teacher_routes)
        .route_layer(middleware::from_fn(require_session));

    Router::new()
        .route("/", get(login::index))
        .route("/login", get(login::login_page).post(login::login))
        .route("/register", get(login::register_choice))
        .route("/register/:role", get(login::register_page).post(login::register))
        .route("/logout", get(login::logout))
        .merge(session_routes)
        .nest_service("/static", ServeDir::new(&glob.static_dir))
        .fallback(respond_not_found)
        .layer(Extension(glob))
}
