//! Authentication provider: users, password hashing and cookie sessions.

use std::sync::Arc;

use argon2::Argon2;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::{entities::UserRecord, types::Role};
use crate::infra::telemetry::LOGINS_FAILED_TOTAL;

const HASH_LEN: usize = 32;
/// Salt for the decoy hash computed when no user matches a sign-in.
const DECOY_SALT: Uuid = Uuid::nil();
pub const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error("a user with email `{0}` already exists")]
    DuplicateEmail(String),
    #[error("password hashing failed: {0}")]
    Hashing(#[from] argon2::Error),
    #[error("password hashing worker failed: {0}")]
    Worker(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Signed-in user resolved from a session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

impl From<UserRecord> for Principal {
    fn from(user: UserRecord) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
        }
    }
}

/// Session handed to the browser. `token` is only ever known to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub principal: Principal,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateUserCommand {
    pub email: String,
    pub display_name: String,
    pub password: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    hasher: Argon2<'static>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            hasher: Argon2::default(),
            session_ttl,
        }
    }

    pub async fn create_user(&self, command: CreateUserCommand) -> Result<UserRecord, AccountError> {
        let email = normalize_email(&command.email);
        if email.is_empty() || !email.contains('@') {
            return Err(AccountError::ConstraintViolation(
                "a valid email address is required",
            ));
        }
        let display_name = command.display_name.trim();
        if display_name.is_empty() {
            return Err(AccountError::ConstraintViolation("display name is required"));
        }
        if command.password.chars().count() < PASSWORD_MIN_CHARS {
            return Err(AccountError::ConstraintViolation(
                "password must be at least 8 characters",
            ));
        }

        let id = Uuid::new_v4();
        let password_hash = self.hash_password(id, &command.password).await?;

        let params = CreateUserParams {
            id,
            email: email.clone(),
            display_name: display_name.to_string(),
            password_hash,
            role: command.role,
        };

        let user = match self.users.create_user(params).await {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => return Err(AccountError::DuplicateEmail(email)),
            Err(err) => return Err(err.into()),
        };

        info!(
            target = "newsdesk::accounts",
            user_id = %user.id,
            role = %user.role,
            "user created"
        );
        Ok(user)
    }

    /// Verifies credentials and opens a new session.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, AccountError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            // Unknown emails pay for one hash as well.
            self.hash_password(DECOY_SALT, password).await?;
            self.record_failure(&email);
            return Err(AccountError::InvalidCredentials);
        };

        let candidate = self.hash_password(user.id, password).await?;
        if !bool::from(candidate.as_slice().ct_eq(user.password_hash.as_slice())) {
            self.record_failure(&email);
            return Err(AccountError::InvalidCredentials);
        }

        let token = generate_token();
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;
        self.sessions
            .create_session(CreateSessionParams {
                token_hash: hash_token(&token),
                user_id: user.id,
                expires_at,
            })
            .await?;

        info!(target = "newsdesk::accounts", user_id = %user.id, "session opened");
        Ok(IssuedSession {
            token,
            principal: user.into(),
            expires_at,
        })
    }

    /// Resolves a session token to its principal. Unknown and expired tokens
    /// resolve to `None`.
    pub async fn authenticate(&self, token: &str) -> Result<Option<Principal>, AccountError> {
        let token_hash = hash_token(token);
        let Some(session) = self.sessions.find_session(&token_hash).await? else {
            return Ok(None);
        };

        if session.expires_at <= OffsetDateTime::now_utc() {
            self.sessions.delete_session(&token_hash).await?;
            return Ok(None);
        }

        let user = self.users.find_user(session.user_id).await?;
        Ok(user.map(Principal::from))
    }

    pub async fn logout(&self, token: &str) -> Result<(), AccountError> {
        self.sessions.delete_session(&hash_token(token)).await?;
        Ok(())
    }

    /// Argon2 digest of the password salted with the user's id, computed on
    /// the blocking pool.
    async fn hash_password(&self, salt: Uuid, password: &str) -> Result<Vec<u8>, AccountError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || -> Result<Vec<u8>, AccountError> {
            let mut hash = vec![0u8; HASH_LEN];
            hasher.hash_password_into(password.as_bytes(), salt.as_bytes(), &mut hash)?;
            Ok(hash)
        })
        .await
        .map_err(|err| AccountError::Worker(err.to_string()))?
    }

    fn record_failure(&self, email: &str) {
        metrics::counter!(LOGINS_FAILED_TOTAL).increment(1);
        warn!(target = "newsdesk::accounts", email = %email, "sign-in rejected");
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn hash_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}
