use axum::http::StatusCode;
use axum_extra::extract::Multipart;
use serde::Deserialize;
use tracing::warn;

use crate::application::{error::HttpError, posts::PostAttachment, validation::PostSubmission};

const SOURCE: &str = "infra::http::posts::forms";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SearchForm {
    #[serde(rename = "searchString")]
    pub search_string: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CropForm {
    #[serde(rename = "crop-image")]
    pub crop_image: String,
}

/// Fields of the multipart post editor.
pub(super) struct PostForm {
    pub submission: PostSubmission,
    pub attachment: Option<PostAttachment>,
}

pub(super) async fn read_post_form(multipart: &mut Multipart) -> Result<PostForm, HttpError> {
    let mut submission = PostSubmission::default();
    let mut attachment = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                warn!(
                    target = "newsdesk::http::posts",
                    status = status.as_u16(),
                    error = %err,
                    "failed to read post form"
                );
                let public_message = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "The submitted file is too large"
                } else {
                    "The submitted form could not be read"
                };
                return Err(HttpError::from_error(SOURCE, status, public_message, &err));
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .filter(|value| !value.trim().is_empty());
            let data = field.bytes().await.map_err(|err| {
                HttpError::from_error(SOURCE, err.status(), "Failed to read the uploaded file", &err)
            })?;
            if let Some(file_name) = file_name
                && !data.is_empty()
            {
                attachment = Some(PostAttachment { file_name, data });
            }
            continue;
        }

        let text = field.text().await.map_err(|err| {
            HttpError::from_error(SOURCE, err.status(), "The submitted form could not be read", &err)
        })?;
        match name.as_str() {
            "title" => submission.title = text,
            "description" => submission.description = text,
            "body" => submission.body = text,
            "category_id" => submission.category_id = text,
            _ => {}
        }
    }

    Ok(PostForm {
        submission,
        attachment,
    })
}
