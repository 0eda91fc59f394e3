use crate::config::SessionConfig;
use crate::database::models::{NewUser, SessionRecord, UserRecord};
use crate::database::repositories::{SessionRepository, UserRepository};
use crate::database::Database;
use crate::error::{conflict_on_unique, BoardError, BoardResult};
use crate::utils::now_utc_iso;
use anyhow::{anyhow, Context};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

const INVALID_CREDENTIALS: &str = "invalid username or password";

/// Stand-in hash checked when the username is unknown, so a miss costs the
/// same Argon2 work as a wrong password.
static DECOY_HASH: OnceLock<Option<String>> = OnceLock::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub karma: i64,
    pub created_at: String,
}

impl AccountView {
    fn from_record(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            email: record.email,
            karma: record.karma,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_at: String,
    pub user: AccountView,
}

/// Argon2id PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|err| anyhow!("failed to encode password salt: {err}"))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

fn verify_against_decoy(password: &str) {
    let decoy = DECOY_HASH.get_or_init(|| hash_password("no-such-account").ok());
    if let Some(decoy) = decoy {
        let _ = verify_password(password, decoy);
    }
}

pub fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(stored).map_err(|err| anyhow!("invalid password hash format: {err}"))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(anyhow!("password verification failed: {err}")),
    }
}

#[derive(Clone)]
pub struct AccountService {
    database: Database,
    session: SessionConfig,
}

impl AccountService {
    pub fn new(database: Database, session: SessionConfig) -> Self {
        Self { database, session }
    }

    pub fn register(&self, input: RegisterInput) -> BoardResult<AccountView> {
        let username = input.username.trim();
        let email = input.email.trim();
        if username.is_empty() || email.is_empty() || input.password.is_empty() {
            return Err(BoardError::invalid("username, email and password are required"));
        }
        if !email.contains('@') {
            return Err(BoardError::invalid("email address is not valid"));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BoardError::invalid(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let password_hash = hash_password(&input.password)?;

        let user = self.database.with_transaction(|repos| {
            let id = repos
                .users()
                .create(&NewUser {
                    username: username.to_string(),
                    email: email.to_string(),
                    password_hash,
                    created_at: now_utc_iso(),
                })
                .map_err(|err| conflict_on_unique(err, "username or email already taken"))?;
            let stored = repos
                .users()
                .get(id)?
                .context("registration lost newly inserted user")?;
            Ok::<_, BoardError>(stored)
        })?;

        tracing::info!(user_id = user.id, username = %user.username, "user registered");
        Ok(AccountView::from_record(user))
    }

    /// Verifies credentials and opens a session. Unknown users and wrong
    /// passwords fail with the same message.
    pub fn login(&self, input: LoginInput) -> BoardResult<LoginOutcome> {
        let username = input.username.trim();
        if username.is_empty() || input.password.is_empty() {
            return Err(BoardError::invalid("username and password are required"));
        }
        let user = self
            .database
            .with_repositories(|repos| Ok::<_, BoardError>(repos.users().get_by_username(username)?))?;
        let Some(user) = user else {
            verify_against_decoy(&input.password);
            tracing::debug!(username, "login rejected");
            return Err(BoardError::Unauthenticated(INVALID_CREDENTIALS.into()));
        };
        if !verify_password(&input.password, &user.password_hash)? {
            tracing::debug!(username, "login rejected");
            return Err(BoardError::Unauthenticated(INVALID_CREDENTIALS.into()));
        }

        let now = Utc::now();
        let record = SessionRecord {
            token: Uuid::new_v4().to_string(),
            user_id: user.id,
            created_at: now.to_rfc3339_opts(SecondsFormat::Micros, true),
            expires_at: (now + Duration::hours(self.session.ttl_hours))
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        };
        let purged = self.database.with_transaction(|repos| {
            let purged = repos.sessions().purge_expired(&record.created_at)?;
            repos.sessions().create(&record)?;
            Ok::<_, BoardError>(purged)
        })?;

        tracing::info!(user_id = user.id, purged_sessions = purged, "user logged in");
        Ok(LoginOutcome {
            token: record.token,
            expires_at: record.expires_at,
            user: AccountView::from_record(user),
        })
    }

    /// Returns whether a session was actually removed.
    pub fn logout(&self, token: &str) -> BoardResult<bool> {
        let removed = self
            .database
            .with_repositories(|repos| Ok::<_, BoardError>(repos.sessions().delete(token)?))?;
        if removed {
            tracing::debug!("session closed");
        }
        Ok(removed)
    }

    pub fn resolve_session(&self, token: &str) -> BoardResult<Option<AccountView>> {
        let now = now_utc_iso();
        let user = self
            .database
            .with_repositories(|repos| Ok::<_, BoardError>(repos.sessions().find_user(token, &now)?))?;
        Ok(user.map(AccountView::from_record))
    }

    pub fn require_user(&self, token: Option<&str>) -> BoardResult<AccountView> {
        match token {
            Some(token) => self
                .resolve_session(token)?
                .ok_or_else(BoardError::login_required),
            None => Err(BoardError::login_required()),
        }
    }
}
