//! Per-route enforcement of the access policy table.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, State},
    http::{HeaderMap, Request, StatusCode, Uri, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use subtle::ConstantTimeEq;
use url::form_urlencoded;

use crate::application::{
    error::{ErrorReport, HttpError},
    policy::{Operation, RoleDecision},
};
use crate::presentation::views::{self, LayoutChrome};

use super::middleware::{CSRF_COOKIE, Visitor};

pub const CSRF_FIELD: &str = "__csrf";
pub const CSRF_HEADER: &str = "x-csrf-token";
const LOGIN_PATH: &str = "/Account/Login";

#[derive(Clone)]
pub struct PolicyGate {
    pub operation: Operation,
    pub body_limit: usize,
}

pub async fn enforce_policy(
    State(gate): State<PolicyGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let policy = gate.operation.policy();
    let visitor = request.extensions().get::<Visitor>().cloned();
    let principal = visitor.as_ref().and_then(|visitor| visitor.principal.as_ref());

    match policy.check_role(principal) {
        RoleDecision::Allow => {}
        RoleDecision::Challenge => return challenge(request.uri()),
        RoleDecision::Forbid => {
            let chrome = visitor
                .as_ref()
                .map(Visitor::chrome)
                .unwrap_or_else(LayoutChrome::anonymous);
            return forbidden(chrome, gate.operation, "caller lacks the required role");
        }
    }

    if !policy.csrf.applies_to(request.method()) {
        return next.run(request).await;
    }

    let expected = CookieJar::from_headers(request.headers())
        .get(CSRF_COOKIE)
        .map(|cookie| cookie.value().to_string());

    let (request, submitted) = match submitted_token(request, gate.body_limit).await {
        Ok(found) => found,
        Err(err) => return err.into_response(),
    };

    if !tokens_match(expected.as_deref(), submitted.as_deref()) {
        let chrome = visitor
            .as_ref()
            .map(Visitor::chrome)
            .unwrap_or_else(LayoutChrome::anonymous);
        return forbidden(chrome, gate.operation, "missing or mismatched CSRF token");
    }

    next.run(request).await
}

fn challenge(uri: &Uri) -> Response {
    let return_url = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("returnUrl", return_url)
        .finish();
    Redirect::to(&format!("{LOGIN_PATH}?{query}")).into_response()
}

fn forbidden(chrome: LayoutChrome, operation: Operation, detail: &str) -> Response {
    let mut response =
        views::render_error_page_for(chrome, StatusCode::FORBIDDEN, "You are not allowed to do that.");
    ErrorReport::from_message(
        "infra::http::guard::enforce_policy",
        StatusCode::FORBIDDEN,
        format!("{}: {detail}", operation.as_str()),
    )
    .attach(&mut response);
    response
}

fn tokens_match(expected: Option<&str>, submitted: Option<&str>) -> bool {
    match (expected, submitted) {
        (Some(expected), Some(submitted)) if !expected.is_empty() => {
            bool::from(expected.as_bytes().ct_eq(submitted.as_bytes()))
        }
        _ => false,
    }
}

/// Finds the submitted CSRF token in the header, query string or form body.
/// Form bodies are buffered and handed back so the handler can still read them.
async fn submitted_token(
    request: Request<Body>,
    body_limit: usize,
) -> Result<(Request<Body>, Option<String>), HttpError> {
    if let Some(token) = header_token(request.headers()) {
        return Ok((request, Some(token)));
    }
    if let Some(token) = query_token(request.uri()) {
        return Ok((request, Some(token)));
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, body_limit).await.map_err(|err| {
        HttpError::from_error(
            "infra::http::guard::submitted_token",
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large",
            &err,
        )
    })?;

    let token = match content_type(&parts.headers) {
        Some(value) if value.starts_with("application/x-www-form-urlencoded") => {
            urlencoded_token(&bytes)
        }
        Some(value) if value.starts_with("multipart/form-data") => {
            multipart_token(&parts, bytes.clone()).await
        }
        _ => None,
    };

    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn query_token(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase())
}

fn urlencoded_token(body: &[u8]) -> Option<String> {
    form_urlencoded::parse(body)
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
}

async fn multipart_token(parts: &Parts, body: Bytes) -> Option<String> {
    let mut probe = Request::new(Body::from(body));
    *probe.method_mut() = parts.method.clone();
    *probe.uri_mut() = parts.uri.clone();
    *probe.headers_mut() = parts.headers.clone();
    *probe.extensions_mut() = parts.extensions.clone();

    let mut multipart = Multipart::from_request(probe, &()).await.ok()?;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some(CSRF_FIELD) {
            return field.text().await.ok();
        }
    }
    None
}
