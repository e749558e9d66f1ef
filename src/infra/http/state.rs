use std::sync::Arc;

use crate::application::{
    accounts::AccountService, categories::CategoryService, images::ImageService,
    posts::PostService, repos::HealthRepo,
};
use crate::infra::uploads::UploadStorage;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<PostService>,
    pub categories: Arc<CategoryService>,
    pub accounts: Arc<AccountService>,
    pub images: Arc<ImageService>,
    pub uploads: Arc<UploadStorage>,
    pub health: Arc<dyn HealthRepo>,
    pub page_size: usize,
    pub upload_limit_bytes: usize,
    pub secure_cookies: bool,
}
