//! Identity lifecycle: registration, login, guest identities, single-slot
//! refresh-token rotation with replay detection, and logout.

pub mod password;
pub mod token;

use anyhow::{anyhow, Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use ulid::Ulid;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::Error;
use crate::model::{PublicUser, Role, UserRecord};
use crate::store::{InsertUserOutcome, NewUserRecord, UserStore};
use token::{TokenKind, TokenSigner};

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

// Guest usernames embed a ULID, so collisions need a pathological RNG; a
// couple of retries is plenty.
const GUEST_CREATE_ATTEMPTS: usize = 3;

/// Tunables for token issuance and the cookie transport.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// Registration payload, validated here rather than at the boundary.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone, Debug)]
pub struct LoginSuccess {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

pub struct IdentityService {
    users: Arc<dyn UserStore>,
    signer: TokenSigner,
}

impl IdentityService {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, secret: SecretString, config: &AuthConfig) -> Self {
        Self {
            users,
            signer: TokenSigner::new(
                secret,
                config.access_ttl_seconds(),
                config.refresh_ttl_seconds(),
            ),
        }
    }

    /// Create a regular, verified account. Duplicate username/email is a
    /// conflict; the check is case-insensitive because both fields are
    /// stored normalized.
    pub async fn register(&self, new_user: NewUser) -> Result<PublicUser, Error> {
        let full_name = new_user.full_name.trim();
        let username = normalize(&new_user.username);
        let email = normalize(&new_user.email);

        if full_name.is_empty()
            || username.is_empty()
            || email.is_empty()
            || new_user.password.is_empty()
        {
            return Err(Error::invalid_input("all fields are required"));
        }
        if !valid_email(&email) {
            return Err(Error::invalid_input("invalid email address"));
        }

        let password_hash = password::hash_password(&new_user.password)?;
        let record = NewUserRecord {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            username,
            email,
            password_hash,
            role: Role::Regular,
            verified: true,
        };

        match self.users.insert_user(record).await? {
            InsertUserOutcome::Created(user) => {
                info!(user_id = %user.id, "user registered");
                Ok(user.public())
            }
            InsertUserOutcome::Conflict => Err(Error::conflict(
                "user with this email or username already exists",
            )),
        }
    }

    /// Resolve by case-insensitive username or email, verify the secret,
    /// and start the sole live session.
    pub async fn login(&self, username_or_email: &str, secret: &str) -> Result<LoginSuccess, Error> {
        let login = normalize(username_or_email);
        if login.is_empty() {
            return Err(Error::invalid_input("username or email is required"));
        }

        let Some(user) = self.users.find_by_login(&login).await? else {
            return Err(Error::not_found("user not found"));
        };

        if !password::verify_password(secret, &user.password_hash)? {
            return Err(Error::unauthorized("invalid credentials"));
        }

        if user.role.requires_verification() && !user.verified {
            return Err(Error::unauthorized("account is not verified"));
        }

        self.start_session(user).await
    }

    /// Synthesise a throwaway identity and log it in. No credential is
    /// ever required or checked for guests.
    pub async fn guest_login(&self) -> Result<LoginSuccess, Error> {
        for _ in 0..GUEST_CREATE_ATTEMPTS {
            let tag = Ulid::new().to_string().to_lowercase();
            let password_hash = password::hash_password(&random_secret()?)?;
            let record = NewUserRecord {
                id: Uuid::new_v4(),
                full_name: "Guest User".to_string(),
                username: format!("guest_{tag}"),
                email: format!("guest_{tag}@guest.local"),
                password_hash,
                role: Role::Guest,
                verified: true,
            };
            match self.users.insert_user(record).await? {
                InsertUserOutcome::Created(user) => return self.start_session(user).await,
                InsertUserOutcome::Conflict => {}
            }
        }
        Err(Error::from(anyhow!("failed to allocate a guest identity")))
    }

    /// Exchange a refresh token for a new pair, rotating the stored slot.
    ///
    /// Rotation is a compare-and-swap: of two concurrent calls presenting
    /// the same token, exactly one wins. The loser, and any presentation
    /// of an already-rotated token, is treated as replay: the session is
    /// revoked and the caller must log in again.
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, Error> {
        let user_id = self
            .signer
            .verify(presented, TokenKind::Refresh)
            .map_err(|_| Error::unauthorized("invalid or expired refresh token"))?;

        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Err(Error::unauthorized("invalid refresh token"));
        };

        let tokens = self.issue_pair(user.id)?;
        let rotated = self
            .users
            .rotate_refresh_token(user.id, presented, &tokens.refresh_token)
            .await?;
        if !rotated {
            self.users.clear_refresh_token(user.id).await?;
            warn!(user_id = %user.id, "refresh token replay detected; session revoked");
            return Err(Error::unauthorized(
                "token expired or already used, please log in again",
            ));
        }

        Ok(tokens)
    }

    /// Clear the stored session and stamp activity. Idempotent.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), Error> {
        self.users.record_logout(user_id).await?;
        info!(user_id = %user_id, "session cleared");
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<PublicUser, Error> {
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Err(Error::not_found("user not found"));
        };
        Ok(user.public())
    }

    /// Pure access-token check: signature and expiry only, no store
    /// access. Returns the acting user id.
    pub fn authenticate(&self, token: &str) -> Result<Uuid, Error> {
        self.signer
            .verify(token, TokenKind::Access)
            .map_err(|_| Error::unauthorized("invalid or expired access token"))
    }

    async fn start_session(&self, user: UserRecord) -> Result<LoginSuccess, Error> {
        let tokens = self.issue_pair(user.id)?;
        self.users
            .record_login(user.id, &tokens.refresh_token)
            .await?;
        info!(user_id = %user.id, role = user.role.as_str(), "session started");
        Ok(LoginSuccess {
            user: user.public(),
            tokens,
        })
    }

    fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, Error> {
        let access_token = self
            .signer
            .issue(user_id, TokenKind::Access)
            .context("failed to issue access token")?;
        let refresh_token = self
            .signer
            .issue(user_id, TokenKind::Refresh)
            .context("failed to issue refresh token")?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

/// Normalize a username or email for lookup/uniqueness checks.
fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Random throwaway secret for guest accounts.
fn random_secret() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate guest secret")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn service(store: Arc<MemoryStore>) -> IdentityService {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        IdentityService::new(store, SecretString::from("test-secret"), &config)
    }

    fn alice() -> NewUser {
        NewUser {
            full_name: "Alice Example".to_string(),
            username: "Alice".to_string(),
            email: "Alice@Example.com".to_string(),
            password: "hunter2hunter2".to_string(),
        }
    }

    #[tokio::test]
    async fn register_normalizes_and_projects() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = service(store);

        let user = identity.register(alice()).await?;
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role, Role::Regular);
        assert!(user.verified);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_empty_fields_and_bad_email() {
        let store = Arc::new(MemoryStore::new());
        let identity = service(store);

        let mut missing = alice();
        missing.password = String::new();
        let result = identity.register(missing).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let mut bad_email = alice();
        bad_email.email = "not-an-email".to_string();
        let result = identity.register(bad_email).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn register_conflicts_on_case_insensitive_email() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = service(store);

        identity.register(alice()).await?;

        let mut shadow = alice();
        shadow.username = "different".to_string();
        shadow.email = "ALICE@EXAMPLE.COM".to_string();
        let result = identity.register(shadow).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        Ok(())
    }

    #[tokio::test]
    async fn login_happy_path_stores_single_session() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = service(store.clone());

        let registered = identity.register(alice()).await?;
        let success = identity.login("ALICE", "hunter2hunter2").await?;
        assert_eq!(success.user.id, registered.id);

        let stored = store.find_by_id(registered.id).await?.expect("user exists");
        assert_eq!(
            stored.refresh_token.as_deref(),
            Some(success.tokens.refresh_token.as_str())
        );
        assert!(store.last_login(registered.id).await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn login_failures_map_to_taxonomy() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = service(store);
        identity.register(alice()).await?;

        let result = identity.login("nobody", "whatever").await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let result = identity.login("alice", "wrong password").await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));

        let result = identity.login("", "whatever").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        Ok(())
    }

    #[tokio::test]
    async fn unverified_regular_account_cannot_login() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = service(store.clone());

        // Seed an unverified account directly; registration always
        // produces verified users.
        let record = NewUserRecord {
            id: Uuid::new_v4(),
            full_name: "Pending User".to_string(),
            username: "pending".to_string(),
            email: "pending@example.com".to_string(),
            password_hash: password::hash_password("secret-enough")?,
            role: Role::Regular,
            verified: false,
        };
        store.insert_user(record).await?;

        let result = identity.login("pending", "secret-enough").await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        Ok(())
    }

    #[tokio::test]
    async fn guest_login_needs_no_credentials_and_is_unique() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = service(store);

        let first = identity.guest_login().await?;
        let second = identity.guest_login().await?;

        assert_eq!(first.user.role, Role::Guest);
        assert!(first.user.verified);
        assert!(first.user.username.starts_with("guest_"));
        assert_ne!(first.user.username, second.user.username);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rotates_and_detects_replay() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = service(store.clone());

        identity.register(alice()).await?;
        let success = identity.login("alice", "hunter2hunter2").await?;
        let first_refresh = success.tokens.refresh_token.clone();

        let rotated = identity.refresh(&first_refresh).await?;
        assert_ne!(rotated.refresh_token, first_refresh);

        // Replaying the superseded token revokes the whole session.
        let result = identity.refresh(&first_refresh).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));

        let stored = store
            .find_by_login("alice")
            .await?
            .expect("user exists")
            .refresh_token;
        assert!(stored.is_none());

        // Even the legitimately rotated token is now dead.
        let result = identity.refresh(&rotated.refresh_token).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_garbage_and_access_tokens() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = service(store);

        identity.register(alice()).await?;
        let success = identity.login("alice", "hunter2hunter2").await?;

        let result = identity.refresh("not-a-token").await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));

        // An access token must not pass as a refresh token.
        let result = identity.refresh(&success.tokens.access_token).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        Ok(())
    }

    #[tokio::test]
    async fn logout_clears_session_and_is_idempotent() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = service(store.clone());

        let user = identity.register(alice()).await?;
        identity.login("alice", "hunter2hunter2").await?;

        identity.logout(user.id).await?;
        let stored = store.find_by_id(user.id).await?.expect("user exists");
        assert!(stored.refresh_token.is_none());

        identity.logout(user.id).await?;
        Ok(())
    }

    #[tokio::test]
    async fn authenticate_accepts_access_rejects_refresh() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = service(store);

        let user = identity.register(alice()).await?;
        let success = identity.login("alice", "hunter2hunter2").await?;

        let acting = identity.authenticate(&success.tokens.access_token)?;
        assert_eq!(acting, user.id);

        let result = identity.authenticate(&success.tokens.refresh_token);
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        Ok(())
    }

    #[tokio::test]
    async fn current_user_round_trips() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = service(store);

        let user = identity.register(alice()).await?;
        let fetched = identity.current_user(user.id).await?;
        assert_eq!(fetched.username, "alice");

        let result = identity.current_user(Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        Ok(())
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_checks_shape() {
        assert!(valid_email("a@example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
    }
}
