//! Post Access: listing, lookup, search and editorial writes.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::repos::{
    CreatePostParams, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::application::validation::PostDraft;
use crate::domain::{Lookup, entities::PostRecord};
use crate::infra::telemetry::{POSTS_CREATED_TOTAL, POSTS_DELETED_TOTAL, POSTS_UPDATED_TOTAL};
use crate::infra::uploads::{UploadStorage, UploadStorageError};

#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Storage(#[from] UploadStorageError),
}

/// File submitted together with a post form.
#[derive(Debug, Clone)]
pub struct PostAttachment {
    pub file_name: String,
    pub data: Bytes,
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    storage: Arc<UploadStorage>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        storage: Arc<UploadStorage>,
    ) -> Self {
        Self {
            reader,
            writer,
            storage,
        }
    }

    pub async fn list_all(&self) -> Result<Vec<PostRecord>, PostServiceError> {
        Ok(self.reader.list_posts().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Lookup<PostRecord>, PostServiceError> {
        Ok(self.reader.find_by_id(id).await?.into())
    }

    pub async fn list_by_category(
        &self,
        category_id: i64,
    ) -> Result<Vec<PostRecord>, PostServiceError> {
        Ok(self.reader.list_by_category(category_id).await?)
    }

    /// Blank queries match every post.
    pub async fn search(&self, query: &str) -> Result<Vec<PostRecord>, PostServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return self.list_all().await;
        }
        Ok(self.reader.search_posts(query).await?)
    }

    pub async fn create(
        &self,
        draft: PostDraft,
        attachment: Option<PostAttachment>,
    ) -> Result<PostRecord, PostServiceError> {
        let image_path = self.store_attachment(attachment).await?;

        let params = CreatePostParams {
            title: draft.title,
            description: draft.description,
            body: draft.body,
            category_id: draft.category_id,
            image_path: image_path.clone(),
        };

        let record = match self.writer.create_post(params).await {
            Ok(record) => record,
            Err(err) => {
                self.discard(image_path.as_deref()).await;
                return Err(err.into());
            }
        };

        metrics::counter!(POSTS_CREATED_TOTAL).increment(1);
        info!(
            target = "newsdesk::posts",
            post_id = record.id,
            category_id = record.category_id,
            "post created"
        );
        Ok(record)
    }

    /// Replaces the editable fields of a post. Without a new attachment the
    /// existing image is kept.
    pub async fn update(
        &self,
        id: i64,
        draft: PostDraft,
        attachment: Option<PostAttachment>,
    ) -> Result<Lookup<PostRecord>, PostServiceError> {
        let Some(existing) = self.reader.find_by_id(id).await? else {
            return Ok(Lookup::Missing);
        };

        let new_image = self.store_attachment(attachment).await?;
        let image_path = new_image.clone().or_else(|| existing.image_path.clone());

        let params = UpdatePostParams {
            id,
            title: draft.title,
            description: draft.description,
            body: draft.body,
            category_id: draft.category_id,
            image_path,
        };

        let record = match self.writer.update_post(params).await {
            Ok(record) => record,
            Err(RepoError::NotFound) => {
                self.discard(new_image.as_deref()).await;
                return Ok(Lookup::Missing);
            }
            Err(err) => {
                self.discard(new_image.as_deref()).await;
                return Err(err.into());
            }
        };

        if new_image.is_some() {
            self.discard(existing.image_path.as_deref()).await;
        }

        metrics::counter!(POSTS_UPDATED_TOTAL).increment(1);
        info!(target = "newsdesk::posts", post_id = id, "post updated");
        Ok(Lookup::Found(record))
    }

    pub async fn delete(&self, id: i64) -> Result<Lookup<()>, PostServiceError> {
        let Some(existing) = self.reader.find_by_id(id).await? else {
            return Ok(Lookup::Missing);
        };

        match self.writer.delete_post(id).await {
            Ok(()) => {}
            Err(RepoError::NotFound) => return Ok(Lookup::Missing),
            Err(err) => return Err(err.into()),
        }

        self.discard(existing.image_path.as_deref()).await;

        metrics::counter!(POSTS_DELETED_TOTAL).increment(1);
        info!(target = "newsdesk::posts", post_id = id, "post deleted");
        Ok(Lookup::Found(()))
    }

    async fn store_attachment(
        &self,
        attachment: Option<PostAttachment>,
    ) -> Result<Option<String>, PostServiceError> {
        let Some(attachment) = attachment else {
            return Ok(None);
        };
        if attachment.data.is_empty() {
            return Ok(None);
        }

        let stored = self
            .storage
            .store_attachment(&attachment.file_name, attachment.data)
            .await?;
        Ok(Some(stored.stored_path))
    }

    async fn discard(&self, stored_path: Option<&str>) {
        let Some(path) = stored_path else {
            return;
        };
        if let Err(err) = self.storage.delete(path).await {
            warn!(
                target = "newsdesk::posts",
                stored_path = path,
                error = %err,
                "failed to remove stored attachment"
            );
        }
    }
}
