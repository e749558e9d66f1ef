use axum::{
    Extension,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::presentation::views::{
    render_error_page_for, render_not_found_response, render_unclassified_error_page,
};

use super::{
    AppState,
    listing::{Listing, PageQuery, category_heading, load_categories, parse_id, render_listing},
    middleware::Visitor,
    post_error_to_http,
};

pub(super) async fn index(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    all_posts_listing(&state, &visitor, "Latest stories", uri.path(), query.page()).await
}

/// Every post, newest first, one page at a time.
pub(super) async fn all_posts_listing(
    state: &AppState,
    visitor: &Visitor,
    heading: &str,
    base_href: &str,
    page: Option<i64>,
) -> Response {
    let posts = match state.posts.list_all().await {
        Ok(posts) => posts,
        Err(err) => {
            return post_error_to_http("infra::http::home::all_posts_listing", err)
                .into_response();
        }
    };

    let listing = Listing {
        heading: heading.to_string(),
        posts,
        page,
        base_href: Some(base_href.to_string()),
        active_category: None,
        search_query: String::new(),
    };

    render_listing(state, visitor, listing)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

pub(super) async fn posts_by_category(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    Path(raw_id): Path<String>,
) -> Response {
    category_listing(&state, &visitor, &raw_id).await
}

/// Category listing shared by the public and newsroom routes. Always the first
/// page without page links; unknown categories render an empty listing.
pub(super) async fn category_listing(
    state: &AppState,
    visitor: &Visitor,
    raw_id: &str,
) -> Response {
    const SOURCE: &str = "infra::http::home::category_listing";

    let Some(category_id) = parse_id(raw_id) else {
        return render_not_found_response(visitor.chrome());
    };

    let categories = match load_categories(state, SOURCE).await {
        Ok(categories) => categories,
        Err(err) => return err.into_response(),
    };
    let posts = match state.posts.list_by_category(category_id).await {
        Ok(posts) => posts,
        Err(err) => return post_error_to_http(SOURCE, err).into_response(),
    };

    let listing = Listing {
        heading: category_heading(&categories, category_id),
        posts,
        page: None,
        base_href: None,
        active_category: Some(category_id),
        search_query: String::new(),
    };

    render_listing(state, visitor, listing)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

/// `/Error/{statusCode}`: 404 shows the not-found view, everything else the
/// generic error view. 4xx and 5xx codes are echoed as the response status;
/// other or unparsable codes get the unclassified view with 200.
pub(super) async fn error_page(
    Extension(visitor): Extension<Visitor>,
    Path(raw_status): Path<String>,
) -> Response {
    let described = raw_status
        .trim()
        .parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok());

    match described {
        Some(StatusCode::NOT_FOUND) => render_not_found_response(visitor.chrome()),
        Some(status) if status.is_client_error() || status.is_server_error() => {
            render_error_page_for(visitor.chrome(), status, "The request could not be completed.")
        }
        _ => render_unclassified_error_page(visitor.chrome()),
    }
}

pub(super) async fn fallback(Extension(visitor): Extension<Visitor>) -> Response {
    render_not_found_response(visitor.chrome())
}
