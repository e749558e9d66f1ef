//! Shared rendering of paged post listings.

use axum::{http::StatusCode, response::Response};
use serde::Deserialize;

use crate::application::{error::HttpError, pagination::Paged};
use crate::domain::entities::{CategoryRecord, PostRecord};
use crate::presentation::views::{
    ListingContext, ListingTemplate, LayoutContext, PaginationView, build_category_links,
    build_post_card, render_template_response,
};

use super::{AppState, middleware::Visitor};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    /// Non-numeric page values count as absent.
    pub(super) fn page(&self) -> Option<i64> {
        self.page
            .as_deref()
            .and_then(|value| value.trim().parse::<i64>().ok())
    }
}

pub(super) struct Listing {
    pub heading: String,
    pub posts: Vec<PostRecord>,
    pub page: Option<i64>,
    /// Path the page links point at; `None` renders no page links.
    pub base_href: Option<String>,
    pub active_category: Option<i64>,
    pub search_query: String,
}

pub(super) async fn load_categories(
    state: &AppState,
    source: &'static str,
) -> Result<Vec<CategoryRecord>, HttpError> {
    state.categories.list_all().await.map_err(|err| {
        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load categories",
            &err,
        )
    })
}

pub(super) async fn render_listing(
    state: &AppState,
    visitor: &Visitor,
    listing: Listing,
) -> Result<Response, HttpError> {
    let categories = load_categories(state, "infra::http::listing::render_listing").await?;

    let paged = Paged::new(listing.posts, listing.page, state.page_size);
    let pagination = PaginationView::from_paged(&paged, listing.base_href.as_deref());
    let posts: Vec<_> = paged.items.iter().map(build_post_card).collect();

    let content = ListingContext {
        heading: listing.heading.clone(),
        has_results: !posts.is_empty(),
        posts,
        categories: build_category_links(&categories, listing.active_category),
        search_query: listing.search_query,
        pagination,
        show_admin_actions: visitor.is_admin(),
    };

    let view = LayoutContext::new(visitor.chrome().titled(listing.heading), content);
    Ok(render_template_response(
        ListingTemplate { view },
        StatusCode::OK,
    ))
}

/// Heading for a category listing; unknown categories still get a listing.
pub(super) fn category_heading(categories: &[CategoryRecord], category_id: i64) -> String {
    categories
        .iter()
        .find(|category| category.id == category_id)
        .map(|category| format!("Stories in {}", category.name))
        .unwrap_or_else(|| "Stories in this category".to_string())
}

pub(super) fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}
