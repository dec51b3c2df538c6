use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use anyhow::anyhow;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chatdesk_core::{MessageSource, ProfileId, RoleName};
use pasetors::{keys::SymmetricKey, version4::V4};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::{OnceCell, RwLock};

use super::auth::{hash_password, now_unix_ms};

pub const DEFAULT_JSON_BODY_LIMIT_BYTES: usize = 1_048_576;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE: u32 = 60;
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Rows returned by the dashboard conversation board.
pub(crate) const BOARD_CONVERSATION_LIMIT: i64 = 50;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    pub rate_limit_requests_per_minute: u32,
    pub database_url: Option<String>,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_name: String,
    pub bootstrap_admin_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_JSON_BODY_LIMIT_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            rate_limit_requests_per_minute: DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE,
            database_url: None,
            bootstrap_admin_email: None,
            bootstrap_admin_name: String::from("Administrator"),
            bootstrap_admin_password: None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct BootstrapAdmin {
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) password_hash: String,
}

#[derive(Clone)]
pub struct AppState {
    pub(crate) db_pool: Option<PgPool>,
    pub(crate) db_init: Arc<OnceCell<()>>,
    pub(crate) bootstrap: Option<Arc<BootstrapAdmin>>,
    pub(crate) profiles: Arc<RwLock<HashMap<String, ProfileRecord>>>,
    pub(crate) profile_emails: Arc<RwLock<HashMap<String, String>>>,
    pub(crate) role_assignments: Arc<RwLock<HashMap<String, RoleName>>>,
    pub(crate) conversations: Arc<RwLock<HashMap<String, ConversationRecord>>>,
    pub(crate) messages: Arc<RwLock<HashMap<String, Vec<MessageRecord>>>>,
    pub(crate) token_key: Arc<SymmetricKey<V4>>,
    pub(crate) dummy_password_hash: Arc<String>,
}

impl AppState {
    pub(crate) fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let mut key_bytes = [0_u8; 32];
        OsRng.fill_bytes(&mut key_bytes);
        let token_key = SymmetricKey::<V4>::from(&key_bytes)
            .map_err(|e| anyhow!("token key init failed: {e}"))?;
        let dummy_password_hash = hash_password("chatdesk-dummy-password")?;
        let db_pool = if let Some(database_url) = &config.database_url {
            Some(
                PgPoolOptions::new()
                    .max_connections(10)
                    .connect_lazy(database_url)
                    .map_err(|e| anyhow!("postgres pool init failed: {e}"))?,
            )
        } else {
            None
        };

        let bootstrap = build_bootstrap_admin(config)?;

        let mut profiles = HashMap::new();
        let mut profile_emails = HashMap::new();
        let mut role_assignments = HashMap::new();
        if db_pool.is_none() {
            if let Some(admin) = &bootstrap {
                let id = ProfileId::new();
                profiles.insert(
                    id.to_string(),
                    ProfileRecord {
                        id,
                        email: admin.email.clone(),
                        name: admin.name.clone(),
                        password_hash: admin.password_hash.clone(),
                        created_at_unix_ms: now_unix_ms(),
                    },
                );
                profile_emails.insert(admin.email.clone(), id.to_string());
                role_assignments.insert(id.to_string(), RoleName::Admin);
            }
        }

        Ok(Self {
            db_pool,
            db_init: Arc::new(OnceCell::new()),
            bootstrap: bootstrap.map(Arc::new),
            profiles: Arc::new(RwLock::new(profiles)),
            profile_emails: Arc::new(RwLock::new(profile_emails)),
            role_assignments: Arc::new(RwLock::new(role_assignments)),
            conversations: Arc::new(RwLock::new(HashMap::new())),
            messages: Arc::new(RwLock::new(HashMap::new())),
            token_key: Arc::new(token_key),
            dummy_password_hash: Arc::new(dummy_password_hash),
        })
    }
}

fn build_bootstrap_admin(config: &AppConfig) -> anyhow::Result<Option<BootstrapAdmin>> {
    match (
        &config.bootstrap_admin_email,
        &config.bootstrap_admin_password,
    ) {
        (None, None) => Ok(None),
        (Some(_), None) | (None, Some(_)) => Err(anyhow!(
            "bootstrap admin email and password must be set together"
        )),
        (Some(email), Some(password)) => {
            let email = email.trim();
            if email.is_empty() {
                return Err(anyhow!("bootstrap admin email cannot be empty"));
            }
            Ok(Some(BootstrapAdmin {
                email: email.to_owned(),
                name: config.bootstrap_admin_name.clone(),
                password_hash: hash_password(password)?,
            }))
        }
    }
}

/// Caller resolved from a verified access token. Roles are re-read from
/// storage on every request so revocations take effect immediately.
#[derive(Debug, Clone)]
pub(crate) struct Identity {
    pub(crate) profile_id: ProfileId,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) roles: HashSet<RoleName>,
}

#[derive(Debug, Clone)]
pub(crate) struct ProfileRecord {
    pub(crate) id: ProfileId,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) password_hash: String,
    pub(crate) created_at_unix_ms: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct ConversationRecord {
    pub(crate) id: String,
    pub(crate) external_participant_identifier: String,
    pub(crate) operator_id: Option<ProfileId>,
    pub(crate) created_at_unix_ms: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct MessageRecord {
    pub(crate) id: String,
    pub(crate) source: MessageSource,
    pub(crate) content: String,
    pub(crate) created_at_unix_ms: i64,
}

#[cfg(test)]
impl MessageRecord {
    pub(crate) fn new(source: MessageSource, content: String, created_at_unix_ms: i64) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            source,
            content,
            created_at_unix_ms,
        }
    }
}
