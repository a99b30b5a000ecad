//! Persistent user and account store.
//!
//! Each chat user owns one JSON record in S3-compatible object storage
//! (R2): their linked carrier accounts, the default-account pointer and a
//! small scratch map for wizard-in-progress data. Phone numbers never hit
//! the store in cleartext; they travel inside an opaque base64 envelope.

use crate::carrier::SessionToken;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

use crate::config::Settings;

/// Store failure.
#[derive(Error, Debug)]
pub enum StorageError {
    /// S3 download failure
    #[error("S3 get error: {0}")]
    S3Get(Box<SdkError<GetObjectError>>),
    /// S3 upload failure
    #[error("S3 put error: {0}")]
    S3Put(String),
    /// Record (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Byte-stream collection failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Missing configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Internal user identity, 1:1 with the chat platform's numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A carrier account linked to a chat user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedAccount {
    /// Store-assigned id, unique per user, never reused
    pub id: u32,
    /// Phone number as an opaque base64 envelope
    pub msisdn_blob: String,
    /// Carrier session credential
    pub token: SessionToken,
    /// When the account was linked
    pub linked_at: DateTime<Utc>,
}

impl LinkedAccount {
    /// Decode the phone number for display.
    #[must_use]
    pub fn msisdn(&self) -> String {
        decode_msisdn(&self.msisdn_blob).unwrap_or_else(|| "<unknown>".to_string())
    }
}

/// Encode a phone number into the opaque envelope stored on the wire.
#[must_use]
pub fn encode_msisdn(msisdn: &str) -> String {
    BASE64.encode(serde_json::json!({ "msisdn": msisdn }).to_string())
}

fn decode_msisdn(blob: &str) -> Option<String> {
    let bytes = BASE64.decode(blob).ok()?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    value.get("msisdn").and_then(Value::as_str).map(String::from)
}

/// Scratch-map key names shared between flows.
pub mod temp_keys {
    /// Number awaiting OTP exchange during registration
    pub const REGISTER_MSISDN: &str = "register.msisdn";
    /// Last browsed product catalogue
    pub const PLANS_CATALOG: &str = "plans.catalog";
}

/// One user's persisted record.
#[derive(Debug, Serialize, Deserialize, Clone)]
struct UserRecord {
    accounts: Vec<LinkedAccount>,
    default_account: Option<u32>,
    #[serde(default = "first_account_id")]
    next_account_id: u32,
    #[serde(default)]
    temp: HashMap<String, Value>,
}

const fn first_account_id() -> u32 {
    1
}

impl Default for UserRecord {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            default_account: None,
            next_account_id: first_account_id(),
            temp: HashMap::new(),
        }
    }
}

/// Per-user persistence consumed by the core.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Resolve a chat id to the internal user id, creating the record on
    /// first contact.
    async fn get_or_create_user(&self, chat_id: i64) -> Result<UserId, StorageError>;
    /// All linked accounts in insertion order.
    async fn list_accounts(&self, user: UserId) -> Result<Vec<LinkedAccount>, StorageError>;
    /// Link a new account; returns it with its assigned id.
    async fn add_account(
        &self,
        user: UserId,
        msisdn_blob: String,
        token: SessionToken,
    ) -> Result<LinkedAccount, StorageError>;
    /// Replace the stored token for an account.
    async fn update_token(
        &self,
        user: UserId,
        account_id: u32,
        token: SessionToken,
    ) -> Result<(), StorageError>;
    /// Current default-account pointer.
    async fn get_default(&self, user: UserId) -> Result<Option<u32>, StorageError>;
    /// Move or clear the default-account pointer.
    async fn set_default(&self, user: UserId, account_id: Option<u32>)
        -> Result<(), StorageError>;
    /// Unlink an account. Removing an unknown id is a no-op.
    async fn delete_account(&self, user: UserId, account_id: u32) -> Result<(), StorageError>;
    /// Write (or with `None`, clear) a scratch value.
    async fn put_temp(
        &self,
        user: UserId,
        key: &str,
        value: Option<Value>,
    ) -> Result<(), StorageError>;
    /// Read a scratch value.
    async fn get_temp(&self, user: UserId, key: &str) -> Result<Option<Value>, StorageError>;
}

/// R2-backed [`AccountStore`].
pub struct R2AccountStore {
    client: Client,
    bucket: String,
}

impl R2AccountStore {
    /// Create a new store from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if R2 configuration is missing.
    pub async fn new(settings: &Settings) -> Result<Self, StorageError> {
        let endpoint_url = settings
            .r2_endpoint_url
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ENDPOINT_URL is missing".into()))?;
        let access_key = settings
            .r2_access_key_id
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ACCESS_KEY_ID is missing".into()))?;
        let secret_key = settings
            .r2_secret_access_key
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_SECRET_ACCESS_KEY is missing".into()))?;
        let bucket = settings
            .r2_bucket_name
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_BUCKET_NAME is missing".into()))?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "r2-storage");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(endpoint_url)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket: bucket.clone(),
        })
    }

    /// Verify the bucket is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error when the bucket cannot be queried.
    pub async fn check_connection(&self) -> Result<(), StorageError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;
        info!("R2 store connection verified (bucket: {})", self.bucket);
        Ok(())
    }

    fn key(user: UserId) -> String {
        format!("users/{user}.json")
    }

    async fn load_record(&self, user: UserId) -> Result<Option<UserRecord>, StorageError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(Self::key(user))
            .send()
            .await;

        match result {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;
                let record = serde_json::from_slice(&data.into_bytes())?;
                Ok(Some(record))
            }
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => Ok(None),
            Err(e) => Err(StorageError::S3Get(Box::new(e))),
        }
    }

    async fn save_record(&self, user: UserId, record: &UserRecord) -> Result<(), StorageError> {
        let body = serde_json::to_string_pretty(record)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(Self::key(user))
            .body(ByteStream::from(body.into_bytes()))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;
        Ok(())
    }

    /// Load-modify-store under the caller's per-user serialization.
    async fn update_record<F, T>(&self, user: UserId, mutate: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut UserRecord) -> T + Send,
    {
        let mut record = self.load_record(user).await?.unwrap_or_default();
        let out = mutate(&mut record);
        self.save_record(user, &record).await?;
        Ok(out)
    }
}

#[async_trait]
impl AccountStore for R2AccountStore {
    async fn get_or_create_user(&self, chat_id: i64) -> Result<UserId, StorageError> {
        let user = UserId(chat_id);
        if self.load_record(user).await?.is_none() {
            info!("Creating store record for new user {user}");
            self.save_record(user, &UserRecord::default()).await?;
        }
        Ok(user)
    }

    async fn list_accounts(&self, user: UserId) -> Result<Vec<LinkedAccount>, StorageError> {
        Ok(self
            .load_record(user)
            .await?
            .map(|r| r.accounts)
            .unwrap_or_default())
    }

    async fn add_account(
        &self,
        user: UserId,
        msisdn_blob: String,
        token: SessionToken,
    ) -> Result<LinkedAccount, StorageError> {
        self.update_record(user, |record| {
            let account = LinkedAccount {
                id: record.next_account_id,
                msisdn_blob,
                token,
                linked_at: Utc::now(),
            };
            record.next_account_id += 1;
            record.accounts.push(account.clone());
            account
        })
        .await
    }

    async fn update_token(
        &self,
        user: UserId,
        account_id: u32,
        token: SessionToken,
    ) -> Result<(), StorageError> {
        self.update_record(user, |record| {
            if let Some(account) = record.accounts.iter_mut().find(|a| a.id == account_id) {
                account.token = token;
            }
        })
        .await
    }

    async fn get_default(&self, user: UserId) -> Result<Option<u32>, StorageError> {
        Ok(self
            .load_record(user)
            .await?
            .and_then(|r| r.default_account))
    }

    async fn set_default(
        &self,
        user: UserId,
        account_id: Option<u32>,
    ) -> Result<(), StorageError> {
        self.update_record(user, |record| {
            record.default_account = account_id;
        })
        .await
    }

    async fn delete_account(&self, user: UserId, account_id: u32) -> Result<(), StorageError> {
        self.update_record(user, |record| {
            record.accounts.retain(|a| a.id != account_id);
        })
        .await
    }

    async fn put_temp(
        &self,
        user: UserId,
        key: &str,
        value: Option<Value>,
    ) -> Result<(), StorageError> {
        self.update_record(user, |record| match value {
            Some(value) => {
                record.temp.insert(key.to_string(), value);
            }
            None => {
                record.temp.remove(key);
            }
        })
        .await
    }

    async fn get_temp(&self, user: UserId, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .load_record(user)
            .await?
            .and_then(|mut r| r.temp.remove(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msisdn_blob_roundtrips_and_is_not_cleartext() {
        let blob = encode_msisdn("9801234567");
        assert!(!blob.contains("9801234567"));
        assert_eq!(decode_msisdn(&blob).as_deref(), Some("9801234567"));
    }

    #[test]
    fn garbage_blob_decodes_to_placeholder() {
        let account = LinkedAccount {
            id: 1,
            msisdn_blob: "not base64!".to_string(),
            token: SessionToken::new("t"),
            linked_at: Utc::now(),
        };
        assert_eq!(account.msisdn(), "<unknown>");
    }

    #[test]
    fn user_record_defaults_survive_old_payloads() {
        // Records written before the scratch map existed must still load
        let record: UserRecord =
            serde_json::from_str(r#"{"accounts": [], "default_account": null}"#)
                .expect("legacy record parses");
        assert_eq!(record.next_account_id, 1);
        assert!(record.temp.is_empty());
    }
}
