mod account;
mod files;
mod guard;
mod home;
mod listing;
pub mod middleware;
mod posts;
mod state;

pub use guard::{CSRF_FIELD, CSRF_HEADER};
pub use middleware::{CSRF_COOKIE, SESSION_COOKIE};
pub use state::AppState;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get, post},
};

use crate::application::{
    error::{ErrorReport, HttpError},
    policy::Operation,
    posts::PostServiceError,
    repos::RepoError,
};
use crate::infra::assets;

use self::guard::{PolicyGate, enforce_policy};
use self::middleware::{attach_visitor, log_responses, set_request_context};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", guarded(&state, Operation::HomeIndex, get(home::index)))
        .route(
            "/Home/Index",
            guarded(&state, Operation::HomeIndex, get(home::index)),
        )
        .route(
            "/Home/PostsByCategory/{id}",
            guarded(
                &state,
                Operation::HomePostsByCategory,
                get(home::posts_by_category),
            ),
        )
        .route(
            "/Error/{status_code}",
            guarded(&state, Operation::ErrorPage, get(home::error_page)),
        )
        .route(
            "/Post/Index",
            guarded(&state, Operation::PostIndex, get(posts::index)),
        )
        .route(
            "/Post/PostsByCategory/{id}",
            guarded(
                &state,
                Operation::AdminPostsByCategory,
                get(posts::posts_by_category),
            ),
        )
        .route(
            "/Post/Search",
            guarded(&state, Operation::Search, post(posts::search)),
        )
        .route(
            "/Post/Create",
            guarded(
                &state,
                Operation::CreatePost,
                get(posts::create_form).post(posts::create_submit),
            ),
        )
        .route(
            "/Post/Edit/{id}",
            guarded(
                &state,
                Operation::EditPost,
                get(posts::edit_form).post(posts::edit_submit),
            ),
        )
        .route(
            "/Post/Delete/{id}",
            guarded(&state, Operation::DeleteConfirm, get(posts::delete_confirm)),
        )
        .route(
            "/Post/DeleteById/{id}",
            guarded(
                &state,
                Operation::DeleteById,
                get(posts::delete_by_id).post(posts::delete_by_id),
            ),
        )
        .route(
            "/Post/FullNews/{id}",
            guarded(&state, Operation::FullNews, get(posts::full_news)),
        )
        .route(
            "/Post/Save",
            guarded(&state, Operation::SaveImage, post(posts::save_image)),
        )
        .route(
            "/Account/Login",
            guarded(&state, Operation::LoginForm, get(account::login_form))
                .merge(guarded(&state, Operation::Login, post(account::login))),
        )
        .route(
            "/Account/Logout",
            guarded(&state, Operation::Logout, post(account::logout)),
        )
        .route(
            "/uploads/{*path}",
            guarded(&state, Operation::ServeUpload, get(files::serve_upload)),
        )
        .route("/static/{*path}", get(assets::serve_static))
        .route("/_health/db", get(db_health))
        .fallback(home::fallback)
        .layer(from_fn_with_state(state.clone(), attach_visitor))
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes))
        .layer(from_fn(log_responses))
        .layer(from_fn(set_request_context))
        .with_state(state)
}

/// Wraps a route with the access policy of `operation`.
fn guarded(
    state: &AppState,
    operation: Operation,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    let gate = PolicyGate {
        operation,
        body_limit: state.upload_limit_bytes,
    };
    route.route_layer(from_fn_with_state(gate, enforce_policy))
}

async fn db_health(State(state): State<AppState>) -> Response {
    match state.health.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Map a repository error to a consistent HTTP error response.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => {
            HttpError::new(source, StatusCode::CONFLICT, "Duplicate record", constraint)
        }
        RepoError::NotFound => HttpError::not_found(source, "resource not found"),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

pub fn post_error_to_http(source: &'static str, err: PostServiceError) -> HttpError {
    match err {
        PostServiceError::Repo(err) => repo_error_to_http(source, err),
        PostServiceError::Storage(err) => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store attachment",
            &err,
        ),
    }
}
