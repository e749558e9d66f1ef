use axum::{
    Extension, Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use crate::application::{accounts::AccountError, error::HttpError};
use crate::presentation::views::{
    LayoutContext, LoginContext, LoginTemplate, render_template_response,
};

use super::{
    AppState,
    middleware::{Visitor, expired_session_cookie, session_cookie},
};

const SOURCE: &str = "infra::http::account";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ReturnQuery {
    #[serde(rename = "returnUrl")]
    return_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    email: String,
    password: String,
    #[serde(rename = "returnUrl")]
    return_url: String,
}

pub(super) async fn login_form(
    Extension(visitor): Extension<Visitor>,
    Query(query): Query<ReturnQuery>,
) -> Response {
    render_login(&visitor, String::new(), query.return_url, None, StatusCode::OK)
}

pub(super) async fn login(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.accounts.login(&form.email, &form.password).await {
        Ok(issued) => {
            let cookie = session_cookie(issued.token, state.secure_cookies, issued.expires_at);
            let target = local_return_url(&form.return_url).unwrap_or("/");
            (jar.add(cookie), Redirect::to(target)).into_response()
        }
        Err(AccountError::InvalidCredentials) => render_login(
            &visitor,
            form.email,
            form.return_url,
            Some("Invalid email or password.".to_string()),
            StatusCode::UNAUTHORIZED,
        ),
        Err(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Sign-in failed",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn logout(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    jar: CookieJar,
) -> Response {
    if let Some(token) = visitor.session_token.as_deref() {
        if let Err(err) = state.accounts.logout(token).await {
            warn!(
                target = "newsdesk::http::account",
                error = %err,
                "failed to delete session on logout"
            );
        } else if let Some(principal) = visitor.principal.as_ref() {
            info!(
                target = "newsdesk::http::account",
                user_id = %principal.user_id,
                "signed out"
            );
        }
    }

    (jar.remove(expired_session_cookie()), Redirect::to("/")).into_response()
}

fn render_login(
    visitor: &Visitor,
    email: String,
    return_url: String,
    error: Option<String>,
    status: StatusCode,
) -> Response {
    let return_url = local_return_url(&return_url)
        .map(str::to_string)
        .unwrap_or_default();
    let content = LoginContext {
        email,
        return_url,
        error,
    };
    let view = LayoutContext::new(visitor.chrome().titled("Sign in"), content);
    render_template_response(LoginTemplate { view }, status)
}

/// Only same-site absolute paths are followed after sign-in.
fn local_return_url(candidate: &str) -> Option<&str> {
    let candidate = candidate.trim();
    let is_local = candidate.starts_with('/')
        && !candidate.starts_with("//")
        && !candidate.contains('\\');
    is_local.then_some(candidate)
}
