use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::OffsetDateTime;
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::{accounts::Principal, error::ErrorReport};
use crate::presentation::views::{LayoutChrome, VisitorView};

use super::AppState;

pub const SESSION_COOKIE: &str = "newsdesk_session";
pub const CSRF_COOKIE: &str = "newsdesk_csrf";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Who is making the request, resolved once per request from cookies.
#[derive(Clone, Debug)]
pub struct Visitor {
    pub principal: Option<Principal>,
    pub session_token: Option<String>,
    pub csrf_token: String,
}

impl Visitor {
    pub fn is_admin(&self) -> bool {
        self.view().is_admin
    }

    pub fn view(&self) -> VisitorView {
        VisitorView::new(self.principal.as_ref(), self.csrf_token.clone())
    }

    pub fn chrome(&self) -> LayoutChrome {
        LayoutChrome::new(self.view())
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "newsdesk::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "newsdesk::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "client request error",
            );
        }
    }

    response
}

/// Resolves the session cookie into a [`Visitor`] and issues a CSRF cookie to
/// browsers that do not carry one yet.
pub async fn attach_visitor(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());

    let existing_csrf = jar
        .get(CSRF_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty());
    let issue_csrf = existing_csrf.is_none();
    let csrf_token = existing_csrf.unwrap_or_else(generate_csrf_token);

    let session_token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty());

    let principal = match session_token.as_deref() {
        Some(token) => match state.accounts.authenticate(token).await {
            Ok(principal) => principal,
            Err(err) => {
                warn!(
                    target = "newsdesk::http::session",
                    error = %err,
                    "failed to resolve session; continuing anonymously"
                );
                None
            }
        },
        None => None,
    };

    request.extensions_mut().insert(Visitor {
        principal,
        session_token,
        csrf_token: csrf_token.clone(),
    });

    let mut response = next.run(request).await;

    if issue_csrf {
        let cookie = csrf_cookie(csrf_token, state.secure_cookies);
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

fn generate_csrf_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn csrf_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((CSRF_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .build()
}

pub fn session_cookie(token: String, secure: bool, expires_at: OffsetDateTime) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .expires(expires_at)
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
