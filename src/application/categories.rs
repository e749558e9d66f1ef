use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CategoriesRepo, CategoriesWriteRepo, RepoError};
use crate::domain::entities::CategoryRecord;

pub const CATEGORY_NAME_MAX_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error("a category named `{0}` already exists")]
    Duplicate(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CategoryService {
    reader: Arc<dyn CategoriesRepo>,
    writer: Arc<dyn CategoriesWriteRepo>,
}

impl CategoryService {
    pub fn new(reader: Arc<dyn CategoriesRepo>, writer: Arc<dyn CategoriesWriteRepo>) -> Self {
        Self { reader, writer }
    }

    /// Every category, ordered by name.
    pub async fn list_all(&self) -> Result<Vec<CategoryRecord>, CategoryError> {
        Ok(self.reader.list_categories().await?)
    }

    pub async fn create(&self, name: &str) -> Result<CategoryRecord, CategoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CategoryError::ConstraintViolation(
                "category name is required",
            ));
        }
        if name.chars().count() > CATEGORY_NAME_MAX_CHARS {
            return Err(CategoryError::ConstraintViolation(
                "category name must be at most 100 characters",
            ));
        }

        let record = match self.writer.create_category(name).await {
            Ok(record) => record,
            Err(RepoError::Duplicate { .. }) => {
                return Err(CategoryError::Duplicate(name.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            target = "newsdesk::categories",
            category_id = record.id,
            name = %record.name,
            "category created"
        );
        Ok(record)
    }
}
