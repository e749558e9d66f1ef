use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use tracing::info;

use crate::application::{
    error::HttpError,
    images::ImageError,
    validation::{PostSubmission, ValidationReport},
};
use crate::domain::{
    Lookup,
    entities::{CategoryRecord, PostRecord},
};
use crate::presentation::views::{
    DeleteConfirmContext, DeleteConfirmTemplate, LayoutContext, PostDetailTemplate,
    PostFormTemplate, build_post_detail, build_post_form,
    render_not_found_response, render_template_response, upload_url,
};

use super::super::{
    AppState,
    home::{all_posts_listing, category_listing},
    listing::{Listing, PageQuery, load_categories, parse_id, render_listing},
    middleware::Visitor,
    post_error_to_http,
};
use super::forms::{CropForm, SearchForm, read_post_form};

const POST_INDEX: &str = "/Post/Index";

pub(crate) async fn index(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    all_posts_listing(&state, &visitor, "All stories", uri.path(), query.page()).await
}

pub(crate) async fn posts_by_category(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    Path(raw_id): Path<String>,
) -> Response {
    category_listing(&state, &visitor, &raw_id).await
}

pub(crate) async fn search(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    Form(form): Form<SearchForm>,
) -> Response {
    let query = form.search_string.trim().to_string();
    let posts = match state.posts.search(&query).await {
        Ok(posts) => posts,
        Err(err) => return post_error_to_http("infra::http::posts::search", err).into_response(),
    };

    let heading = if query.is_empty() {
        "All stories".to_string()
    } else {
        format!("Results for \"{query}\"")
    };

    let listing = Listing {
        heading,
        posts,
        page: None,
        base_href: None,
        active_category: None,
        search_query: query,
    };

    render_listing(&state, &visitor, listing)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

pub(crate) async fn create_form(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
) -> Response {
    let categories = match load_categories(&state, "infra::http::posts::create_form").await {
        Ok(categories) => categories,
        Err(err) => return err.into_response(),
    };

    let content = build_post_form(
        "New story",
        "/Post/Create".to_string(),
        "Publish",
        &PostSubmission::default(),
        &categories,
        None,
        None,
    );
    let view = LayoutContext::new(visitor.chrome().titled("New story"), content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

pub(crate) async fn create_submit(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    mut multipart: Multipart,
) -> Response {
    const SOURCE: &str = "infra::http::posts::create_submit";

    let form = match read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };
    let categories = match load_categories(&state, SOURCE).await {
        Ok(categories) => categories,
        Err(err) => return err.into_response(),
    };

    let draft = match form.submission.validated(&categories) {
        Ok(draft) => draft,
        Err(report) => {
            let content = build_post_form(
                "New story",
                "/Post/Create".to_string(),
                "Publish",
                &form.submission,
                &categories,
                None,
                Some(&report),
            );
            let view = LayoutContext::new(visitor.chrome().titled("New story"), content);
            return render_template_response(
                PostFormTemplate { view },
                StatusCode::UNPROCESSABLE_ENTITY,
            );
        }
    };

    match state.posts.create(draft, form.attachment).await {
        Ok(_) => Redirect::to(POST_INDEX).into_response(),
        Err(err) => post_error_to_http(SOURCE, err).into_response(),
    }
}

pub(crate) async fn edit_form(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    Path(raw_id): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::posts::edit_form";

    let post = match find_post(&state, &raw_id, SOURCE).await {
        Ok(Lookup::Found(post)) => post,
        Ok(Lookup::Missing) => return render_not_found_response(visitor.chrome()),
        Err(err) => return err.into_response(),
    };
    let categories = match load_categories(&state, SOURCE).await {
        Ok(categories) => categories,
        Err(err) => return err.into_response(),
    };

    let submission = PostSubmission {
        title: post.title.clone(),
        description: post.description.clone(),
        body: post.body.clone(),
        category_id: post.category_id.to_string(),
    };
    render_edit_form(&visitor, &post, &submission, &categories, None, StatusCode::OK)
}

pub(crate) async fn edit_submit(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    Path(raw_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    const SOURCE: &str = "infra::http::posts::edit_submit";

    let post = match find_post(&state, &raw_id, SOURCE).await {
        Ok(Lookup::Found(post)) => post,
        Ok(Lookup::Missing) => return render_not_found_response(visitor.chrome()),
        Err(err) => return err.into_response(),
    };
    let form = match read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };
    let categories = match load_categories(&state, SOURCE).await {
        Ok(categories) => categories,
        Err(err) => return err.into_response(),
    };

    let draft = match form.submission.validated(&categories) {
        Ok(draft) => draft,
        Err(report) => {
            return render_edit_form(
                &visitor,
                &post,
                &form.submission,
                &categories,
                Some(&report),
                StatusCode::UNPROCESSABLE_ENTITY,
            );
        }
    };

    match state.posts.update(post.id, draft, form.attachment).await {
        Ok(Lookup::Found(_)) => Redirect::to(POST_INDEX).into_response(),
        Ok(Lookup::Missing) => render_not_found_response(visitor.chrome()),
        Err(err) => post_error_to_http(SOURCE, err).into_response(),
    }
}

fn render_edit_form(
    visitor: &Visitor,
    post: &PostRecord,
    submission: &PostSubmission,
    categories: &[CategoryRecord],
    report: Option<&ValidationReport>,
    status: StatusCode,
) -> Response {
    let content = build_post_form(
        "Edit story",
        format!("/Post/Edit/{}", post.id),
        "Save changes",
        submission,
        categories,
        post.image_path.as_deref().map(upload_url),
        report,
    );
    let view = LayoutContext::new(visitor.chrome().titled("Edit story"), content);
    render_template_response(PostFormTemplate { view }, status)
}

/// Confirmation page only; removal happens through `DeleteById`.
pub(crate) async fn delete_confirm(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    Path(raw_id): Path<String>,
) -> Response {
    let post = match find_post(&state, &raw_id, "infra::http::posts::delete_confirm").await {
        Ok(Lookup::Found(post)) => post,
        Ok(Lookup::Missing) => return render_not_found_response(visitor.chrome()),
        Err(err) => return err.into_response(),
    };

    let content = DeleteConfirmContext {
        action: format!("/Post/DeleteById/{}", post.id),
        post: build_post_detail(&post, visitor.is_admin()),
    };
    let view = LayoutContext::new(visitor.chrome().titled("Delete story"), content);
    render_template_response(DeleteConfirmTemplate { view }, StatusCode::OK)
}

pub(crate) async fn delete_by_id(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    Path(raw_id): Path<String>,
) -> Response {
    let Some(id) = parse_id(&raw_id) else {
        return render_not_found_response(visitor.chrome());
    };

    match state.posts.delete(id).await {
        Ok(Lookup::Found(())) => Redirect::to(POST_INDEX).into_response(),
        Ok(Lookup::Missing) => render_not_found_response(visitor.chrome()),
        Err(err) => post_error_to_http("infra::http::posts::delete_by_id", err).into_response(),
    }
}

pub(crate) async fn full_news(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    Path(raw_id): Path<String>,
) -> Response {
    let post = match find_post(&state, &raw_id, "infra::http::posts::full_news").await {
        Ok(Lookup::Found(post)) => post,
        Ok(Lookup::Missing) => return render_not_found_response(visitor.chrome()),
        Err(err) => return err.into_response(),
    };

    let content = build_post_detail(&post, visitor.is_admin());
    let view = LayoutContext::new(visitor.chrome().titled(post.title.clone()), content);
    render_template_response(PostDetailTemplate { view }, StatusCode::OK)
}

pub(crate) async fn save_image(
    State(state): State<AppState>,
    Form(form): Form<CropForm>,
) -> Response {
    const SOURCE: &str = "infra::http::posts::save_image";

    match state.images.save_cropped(&form.crop_image).await {
        Ok(stored) => {
            info!(
                target = "newsdesk::http::posts",
                stored_path = %stored.stored_path,
                "cropped image accepted"
            );
            Redirect::to("/Home/Index").into_response()
        }
        Err(ImageError::Malformed(err)) => HttpError::from_error(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "The submitted image could not be decoded",
            &err,
        )
        .into_response(),
        Err(ImageError::Storage(err)) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store the image",
            &err,
        )
        .into_response(),
    }
}

/// Non-numeric identifiers resolve to `Missing`.
async fn find_post(
    state: &AppState,
    raw_id: &str,
    source: &'static str,
) -> Result<Lookup<PostRecord>, HttpError> {
    let Some(id) = parse_id(raw_id) else {
        return Ok(Lookup::Missing);
    };
    state
        .posts
        .get(id)
        .await
        .map_err(|err| post_error_to_http(source, err))
}
