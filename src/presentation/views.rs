use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::application::{
    accounts::Principal,
    error::{ErrorReport, HttpError},
    pagination::Paged,
    validation::{FieldError, PostSubmission, ValidationReport},
};
use crate::domain::{
    entities::{CategoryRecord, PostRecord},
    types::Role,
};

pub const SITE_TITLE: &str = "Newsdesk";

const DISPLAY_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");
const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Which error view a status code is shown with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorViewKind {
    NotFound,
    Generic,
}

pub fn error_view_for(status: StatusCode) -> ErrorViewKind {
    if status == StatusCode::NOT_FOUND {
        ErrorViewKind::NotFound
    } else {
        ErrorViewKind::Generic
    }
}

/// Renders the error view mapped to `status` with anonymous page chrome.
pub fn render_error_page(status: StatusCode, public_message: &str) -> Response {
    render_error_page_for(LayoutChrome::anonymous(), status, public_message)
}

pub fn render_error_page_for(
    chrome: LayoutChrome,
    status: StatusCode,
    public_message: &str,
) -> Response {
    match error_view_for(status) {
        ErrorViewKind::NotFound => {
            let view = LayoutContext::new(chrome.titled("Not found"), ErrorPageView::not_found());
            fallback_on_failure(NotFoundTemplate { view }, status)
        }
        ErrorViewKind::Generic => {
            let content = ErrorPageView::generic(status, public_message);
            let view = LayoutContext::new(chrome.titled(content.title.clone()), content);
            fallback_on_failure(ErrorTemplate { view }, status)
        }
    }
}

/// Generic error view for a code that names no error. Rendered with 200 and
/// without a status line.
pub fn render_unclassified_error_page(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::unclassified();
    let view = LayoutContext::new(chrome.titled(content.title.clone()), content);
    fallback_on_failure(ErrorTemplate { view }, StatusCode::OK)
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let mut response = render_error_page_for(chrome, StatusCode::NOT_FOUND, "Resource not found");
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

// Error pages cannot go through `HttpError` again without recursing.
fn fallback_on_failure<T: Template>(template: T, status: StatusCode) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            tracing::error!(
                target = "newsdesk::presentation",
                error = %err,
                "error page failed to render"
            );
            (status, status.canonical_reason().unwrap_or("Error")).into_response()
        }
    }
}

#[derive(Clone)]
pub struct VisitorView {
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub csrf_token: String,
}

impl VisitorView {
    pub fn new(principal: Option<&Principal>, csrf_token: impl Into<String>) -> Self {
        Self {
            display_name: principal.map(|principal| principal.display_name.clone()),
            is_admin: principal.is_some_and(|principal| principal.has_role(Role::Administrator)),
            csrf_token: csrf_token.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            display_name: None,
            is_admin: false,
            csrf_token: String::new(),
        }
    }
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    pub page_title: String,
    pub visitor: VisitorView,
}

impl LayoutChrome {
    pub fn new(visitor: VisitorView) -> Self {
        Self {
            site_title: SITE_TITLE.to_string(),
            page_title: SITE_TITLE.to_string(),
            visitor,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(VisitorView::anonymous())
    }

    pub fn titled(self, page_title: impl Into<String>) -> Self {
        Self {
            page_title: page_title.into(),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub site_title: String,
    pub page_title: String,
    pub visitor: VisitorView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            page_title: chrome.page_title,
            visitor: chrome.visitor,
            content,
        }
    }
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category_name: String,
    pub category_href: String,
    pub image_url: Option<String>,
    pub published: String,
    pub iso_date: String,
}

#[derive(Clone)]
pub struct CategoryLink {
    pub name: String,
    pub href: String,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct PaginationView {
    pub page_number: usize,
    pub page_count: usize,
    pub total_items: usize,
    pub first_item: usize,
    pub last_item: usize,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
}

impl PaginationView {
    /// `base_href` is the listing path; `None` disables page links.
    pub fn from_paged<T>(paged: &Paged<T>, base_href: Option<&str>) -> Self {
        let link = |page: usize| base_href.map(|base| format!("{base}?page={page}"));
        Self {
            page_number: paged.page_number,
            page_count: paged.page_count,
            total_items: paged.total_items,
            first_item: paged.first_item_on_page(),
            last_item: paged.last_item_on_page(),
            previous_href: paged.previous_page().and_then(link),
            next_href: paged.next_page().and_then(link),
        }
    }

    pub fn has_links(&self) -> bool {
        self.previous_href.is_some() || self.next_href.is_some()
    }
}

pub struct ListingContext {
    pub heading: String,
    pub posts: Vec<PostCard>,
    pub has_results: bool,
    pub categories: Vec<CategoryLink>,
    pub search_query: String,
    pub pagination: PaginationView,
    pub show_admin_actions: bool,
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct ListingTemplate {
    pub view: LayoutContext<ListingContext>,
}

#[derive(Clone)]
pub struct CategoryOption {
    pub id: i64,
    pub name: String,
    pub selected: bool,
}

pub struct PostFormContext {
    pub heading: String,
    pub action: String,
    pub submit_label: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub categories: Vec<CategoryOption>,
    pub current_image_url: Option<String>,
    pub summary: Option<String>,
    pub errors: Vec<FieldError>,
}

impl PostFormContext {
    pub fn error_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Template)]
#[template(path = "posts/form.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

pub struct PostDetailContext {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub paragraphs: Vec<String>,
    pub category_name: String,
    pub category_href: String,
    pub image_url: Option<String>,
    pub published: String,
    pub iso_date: String,
    pub updated: Option<String>,
    pub show_admin_actions: bool,
}

#[derive(Template)]
#[template(path = "posts/detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

pub struct DeleteConfirmContext {
    pub post: PostDetailContext,
    pub action: String,
}

#[derive(Template)]
#[template(path = "posts/delete.html")]
pub struct DeleteConfirmTemplate {
    pub view: LayoutContext<DeleteConfirmContext>,
}

pub struct LoginContext {
    pub email: String,
    pub return_url: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "account/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginContext>,
}

pub struct ErrorPageView {
    pub status: Option<u16>,
    pub title: String,
    pub message: String,
    pub primary_action: ErrorAction,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            status: Some(StatusCode::NOT_FOUND.as_u16()),
            title: "Not found".to_string(),
            message: "The story you are looking for does not exist or has been removed."
                .to_string(),
            primary_action: ErrorAction::home(),
        }
    }

    pub fn generic(status: StatusCode, message: &str) -> Self {
        Self {
            status: Some(status.as_u16()),
            title: status
                .canonical_reason()
                .unwrap_or("Something went wrong")
                .to_string(),
            message: message.to_string(),
            primary_action: ErrorAction::home(),
        }
    }

    pub fn unclassified() -> Self {
        Self {
            status: None,
            title: "Something went wrong".to_string(),
            message: "The request could not be completed.".to_string(),
            primary_action: ErrorAction::home(),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to the front page".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "errors/error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[derive(Template)]
#[template(path = "errors/not_found.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn upload_url(stored_path: &str) -> String {
    format!("/uploads/{stored_path}")
}

pub fn category_href(category_id: i64) -> String {
    format!("/Home/PostsByCategory/{category_id}")
}

fn format_display(moment: OffsetDateTime) -> String {
    moment.format(DISPLAY_DATE).unwrap_or_default()
}

fn format_iso(moment: OffsetDateTime) -> String {
    moment.format(ISO_DATE).unwrap_or_default()
}

pub fn build_post_card(post: &PostRecord) -> PostCard {
    PostCard {
        id: post.id,
        title: post.title.clone(),
        description: post.description.clone(),
        category_name: post.category_name.clone(),
        category_href: category_href(post.category_id),
        image_url: post.image_path.as_deref().map(upload_url),
        published: format_display(post.created_at),
        iso_date: format_iso(post.created_at),
    }
}

pub fn build_category_links(
    categories: &[CategoryRecord],
    active: Option<i64>,
) -> Vec<CategoryLink> {
    categories
        .iter()
        .map(|category| CategoryLink {
            name: category.name.clone(),
            href: category_href(category.id),
            is_active: active == Some(category.id),
        })
        .collect()
}

pub fn build_post_detail(post: &PostRecord, show_admin_actions: bool) -> PostDetailContext {
    let updated = (post.updated_at > post.created_at).then(|| format_display(post.updated_at));
    PostDetailContext {
        id: post.id,
        title: post.title.clone(),
        description: post.description.clone(),
        paragraphs: split_paragraphs(&post.body),
        category_name: post.category_name.clone(),
        category_href: category_href(post.category_id),
        image_url: post.image_path.as_deref().map(upload_url),
        published: format_display(post.created_at),
        iso_date: format_iso(post.created_at),
        updated,
        show_admin_actions,
    }
}

pub fn build_category_options(
    categories: &[CategoryRecord],
    selected: &str,
) -> Vec<CategoryOption> {
    let selected = selected.trim().parse::<i64>().ok();
    categories
        .iter()
        .map(|category| CategoryOption {
            id: category.id,
            name: category.name.clone(),
            selected: selected == Some(category.id),
        })
        .collect()
}

/// Form context for a submission, carrying the rule violations when it was rejected.
pub fn build_post_form(
    heading: &str,
    action: String,
    submit_label: &str,
    submission: &PostSubmission,
    categories: &[CategoryRecord],
    current_image_url: Option<String>,
    report: Option<&ValidationReport>,
) -> PostFormContext {
    PostFormContext {
        heading: heading.to_string(),
        action,
        submit_label: submit_label.to_string(),
        title: submission.title.clone(),
        description: submission.description.clone(),
        body: submission.body.clone(),
        categories: build_category_options(categories, &submission.category_id),
        current_image_url,
        summary: report
            .and_then(ValidationReport::first)
            .map(|error| error.message.clone()),
        errors: report
            .map(|report| report.errors().to_vec())
            .unwrap_or_default(),
    }
}

fn split_paragraphs(body: &str) -> Vec<String> {
    body.replace("\r\n", "\n")
        .split("\n\n")
        .map(|paragraph| paragraph.trim().to_string())
        .filter(|paragraph| !paragraph.is_empty())
        .collect()
}
