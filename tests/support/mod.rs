#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header},
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use newsdesk::application::accounts::{AccountService, hash_token};
use newsdesk::application::categories::CategoryService;
use newsdesk::application::images::ImageService;
use newsdesk::application::posts::PostService;
use newsdesk::application::repos::{
    CategoriesRepo, CategoriesWriteRepo, CreatePostParams, CreateSessionParams, CreateUserParams,
    HealthRepo, PostsRepo, PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
};
use newsdesk::domain::entities::{CategoryRecord, PostRecord, SessionRecord, UserRecord};
use newsdesk::domain::types::Role;
use newsdesk::infra::http::{self, AppState, CSRF_COOKIE, SESSION_COOKIE};
use newsdesk::infra::uploads::UploadStorage;

pub const CSRF_TOKEN: &str = "test-csrf-token";
pub const BOUNDARY: &str = "newsdesk-test-boundary";

#[derive(Default)]
struct StoreState {
    categories: BTreeMap<i64, CategoryRecord>,
    posts: BTreeMap<i64, PostRecord>,
    users: Vec<UserRecord>,
    sessions: Vec<SessionRecord>,
    next_category_id: i64,
    next_post_id: i64,
    create_calls: usize,
    update_calls: usize,
    delete_calls: usize,
}

/// In-memory stand-in for the Postgres repositories.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

fn epoch() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_767_225_600).expect("valid timestamp")
}

impl MemoryStore {
    pub async fn add_category(&self, name: &str) -> i64 {
        let mut state = self.state.lock().await;
        state.next_category_id += 1;
        let id = state.next_category_id;
        state.categories.insert(
            id,
            CategoryRecord {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    /// Seeds a post; later seeds are newer.
    pub async fn add_post(&self, title: &str, category_id: i64) -> i64 {
        let mut state = self.state.lock().await;
        state.next_post_id += 1;
        let id = state.next_post_id;
        let category_name = state
            .categories
            .get(&category_id)
            .map(|category| category.name.clone())
            .unwrap_or_default();
        let created_at = epoch() + Duration::minutes(id);
        state.posts.insert(
            id,
            PostRecord {
                id,
                title: title.to_string(),
                description: format!("{title} in brief"),
                body: format!("{title} in full."),
                category_id,
                category_name,
                image_path: None,
                created_at,
                updated_at: created_at,
            },
        );
        id
    }

    pub async fn post(&self, id: i64) -> Option<PostRecord> {
        self.state.lock().await.posts.get(&id).cloned()
    }

    pub async fn post_count(&self) -> usize {
        self.state.lock().await.posts.len()
    }

    pub async fn create_calls(&self) -> usize {
        self.state.lock().await.create_calls
    }

    pub async fn update_calls(&self) -> usize {
        self.state.lock().await.update_calls
    }

    pub async fn delete_calls(&self) -> usize {
        self.state.lock().await.delete_calls
    }

    /// Registers a user with an open session and returns the session token.
    pub async fn open_session(&self, role: Role) -> String {
        let mut state = self.state.lock().await;
        let user_id = Uuid::new_v4();
        state.users.push(UserRecord {
            id: user_id,
            email: format!("{user_id}@newsdesk.test"),
            display_name: format!("{role} tester"),
            password_hash: Vec::new(),
            role,
            created_at: epoch(),
        });

        let token = Uuid::new_v4().simple().to_string();
        state.sessions.push(SessionRecord {
            token_hash: hash_token(&token),
            user_id,
            expires_at: OffsetDateTime::now_utc() + Duration::hours(1),
            created_at: OffsetDateTime::now_utc(),
        });
        token
    }

    fn sorted(posts: impl Iterator<Item = PostRecord>) -> Vec<PostRecord> {
        let mut posts: Vec<_> = posts.collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(&self) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(Self::sorted(state.posts.values().cloned()))
    }

    async fn list_by_category(&self, category_id: i64) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(Self::sorted(
            state
                .posts
                .values()
                .filter(|post| post.category_id == category_id)
                .cloned(),
        ))
    }

    async fn search_posts(&self, query: &str) -> Result<Vec<PostRecord>, RepoError> {
        let needle = query.to_lowercase();
        let state = self.state.lock().await;
        Ok(Self::sorted(
            state
                .posts
                .values()
                .filter(|post| {
                    post.title.to_lowercase().contains(&needle)
                        || post.description.to_lowercase().contains(&needle)
                        || post.body.to_lowercase().contains(&needle)
                })
                .cloned(),
        ))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.state.lock().await.posts.get(&id).cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.create_calls += 1;
        let category_name = state
            .categories
            .get(&params.category_id)
            .map(|category| category.name.clone())
            .ok_or_else(|| RepoError::Integrity {
                message: "unknown category".to_string(),
            })?;
        state.next_post_id += 1;
        let id = state.next_post_id;
        let now = OffsetDateTime::now_utc();
        let record = PostRecord {
            id,
            title: params.title,
            description: params.description,
            body: params.body,
            category_id: params.category_id,
            category_name,
            image_path: params.image_path,
            created_at: now,
            updated_at: now,
        };
        state.posts.insert(id, record.clone());
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.update_calls += 1;
        let category_name = state
            .categories
            .get(&params.category_id)
            .map(|category| category.name.clone())
            .unwrap_or_default();
        let post = state.posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        post.title = params.title;
        post.description = params.description;
        post.body = params.body;
        post.category_id = params.category_id;
        post.category_name = category_name;
        post.image_path = params.image_path;
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.delete_calls += 1;
        state
            .posts
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl CategoriesRepo for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut categories: Vec<_> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_category(&self, id: i64) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }
}

#[async_trait]
impl CategoriesWriteRepo for MemoryStore {
    async fn create_category(&self, name: &str) -> Result<CategoryRecord, RepoError> {
        let id = self.add_category(name).await;
        Ok(CategoryRecord {
            id,
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|user| user.email == params.email) {
            return Err(RepoError::Duplicate {
                constraint: "users_email_key".to_string(),
            });
        }
        let user = UserRecord {
            id: params.id,
            email: params.email,
            display_name: params.display_name,
            password_hash: params.password_hash,
            role: params.role,
            created_at: OffsetDateTime::now_utc(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|user| user.email == email).cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|user| user.id == id).cloned())
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let session = SessionRecord {
            token_hash: params.token_hash,
            user_id: params.user_id,
            expires_at: params.expires_at,
            created_at: OffsetDateTime::now_utc(),
        };
        self.state.lock().await.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_session(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .iter()
            .find(|session| session.token_hash == token_hash)
            .cloned())
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<(), RepoError> {
        self.state
            .lock()
            .await
            .sessions
            .retain(|session| session.token_hash != token_hash);
        Ok(())
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub accounts: Arc<AccountService>,
    pub uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let uploads = TempDir::new().expect("upload dir");
        let storage =
            Arc::new(UploadStorage::new(uploads.path().to_path_buf()).expect("upload storage"));
        let accounts = Arc::new(AccountService::new(
            store.clone(),
            store.clone(),
            Duration::hours(12),
        ));

        let state = AppState {
            posts: Arc::new(PostService::new(store.clone(), store.clone(), storage.clone())),
            categories: Arc::new(CategoryService::new(store.clone(), store.clone())),
            accounts: accounts.clone(),
            images: Arc::new(ImageService::new(storage.clone())),
            uploads: storage,
            health: store.clone(),
            page_size: 20,
            upload_limit_bytes: 2 * 1024 * 1024,
            secure_cookies: false,
        };

        Self {
            router: http::build_router(state),
            store,
            accounts,
            uploads,
        }
    }

    pub async fn admin_cookies(&self) -> String {
        let token = self.store.open_session(Role::Administrator).await;
        cookies(Some(&token))
    }

    pub async fn user_cookies(&self) -> String {
        let token = self.store.open_session(Role::User).await;
        cookies(Some(&token))
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request should build"))
            .await
    }

    /// Posts an urlencoded form; `fields` are sent in order.
    pub async fn post_form(
        &self,
        uri: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
    ) -> Response<Body> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter().copied())
            .finish();
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).expect("request should build"))
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: Option<&str>,
        body: Vec<u8>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).expect("request should build"))
            .await
    }
}

/// Cookie header carrying the test CSRF token and, optionally, a session.
pub fn cookies(session: Option<&str>) -> String {
    match session {
        Some(token) => format!("{CSRF_COOKIE}={CSRF_TOKEN}; {SESSION_COOKIE}={token}"),
        None => format!("{CSRF_COOKIE}={CSRF_TOKEN}"),
    }
}

/// Builds a multipart body from text fields and an optional `file` part.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

pub fn card_count(html: &str) -> usize {
    html.matches("<li class=\"card\">").count()
}
