use std::collections::HashMap;
use std::future::Future;

use base64::Engine;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use crate::models::profile::UserProfile;
use crate::services::encryption::{EncryptionError, EncryptionService};

const PROFILES_KEY: &str = "auditgig_user_data:list";
const PASSKEYS_KEY: &str = "auditgig_user_data:passkeys";
const CURRENT_KEY: &str = "auditgig_user_data:current";

const SEALED_PREFIX: &str = "enc:";

/// Durable key-value home of user profiles.
///
/// Single local identity, last writer wins. `settle_payout` is the only
/// path that changes balance and stats.
pub trait ProfileStore: Send + Sync {
    fn load(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<UserProfile>, StoreError>> + Send;

    fn load_by_credential(
        &self,
        credential_id: &str,
    ) -> impl Future<Output = Result<Option<UserProfile>, StoreError>> + Send;

    fn save(&self, profile: &UserProfile) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn health_check(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Credit a mission reward and return the updated profile.
    fn settle_payout(
        &self,
        email: &str,
        reward: u64,
    ) -> impl Future<Output = Result<UserProfile, StoreError>> + Send {
        async move {
            let mut profile = self
                .load(email)
                .await?
                .ok_or_else(|| StoreError::UnknownProfile(email.to_string()))?;
            profile.credit_reward(reward);
            self.save(&profile).await?;
            Ok(profile)
        }
    }
}

/// Serialises profiles to blobs, sealing them when a key is configured.
#[derive(Default)]
pub struct ProfileCodec {
    encryption: Option<EncryptionService>,
}

impl ProfileCodec {
    pub fn sealed(encryption: EncryptionService) -> Self {
        Self {
            encryption: Some(encryption),
        }
    }

    pub fn encode(&self, profile: &UserProfile) -> Result<String, StoreError> {
        let json = serde_json::to_string(profile)?;
        match &self.encryption {
            Some(encryption) => {
                let sealed = encryption.encrypt(json.as_bytes())?;
                Ok(format!(
                    "{SEALED_PREFIX}{}",
                    base64::engine::general_purpose::STANDARD.encode(sealed)
                ))
            }
            None => Ok(json),
        }
    }

    /// Plain JSON blobs are always readable; sealed ones need the key.
    pub fn decode(&self, blob: &str) -> Result<UserProfile, StoreError> {
        match blob.strip_prefix(SEALED_PREFIX) {
            Some(sealed) => {
                let encryption = self.encryption.as_ref().ok_or(StoreError::SealedWithoutKey)?;
                let data = base64::engine::general_purpose::STANDARD.decode(sealed)?;
                let json = encryption.decrypt(&data)?;
                Ok(serde_json::from_slice(&json)?)
            }
            None => Ok(serde_json::from_str(blob)?),
        }
    }
}

/// Redis-backed profile store.
pub struct RedisProfileStore {
    client: redis::Client,
    codec: ProfileCodec,
}

impl RedisProfileStore {
    pub fn new(redis_url: &str, codec: ProfileCodec) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, codec })
    }
}

impl ProfileStore for RedisProfileStore {
    async fn load(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let blob: Option<String> = conn.hget(PROFILES_KEY, email).await?;
        blob.map(|b| self.codec.decode(&b)).transpose()
    }

    async fn load_by_credential(&self, credential_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let email: Option<String> = conn.hget(PASSKEYS_KEY, credential_id).await?;
        match email {
            Some(email) => {
                let blob: Option<String> = conn.hget(PROFILES_KEY, &email).await?;
                blob.map(|b| self.codec.decode(&b)).transpose()
            }
            None => Ok(None),
        }
    }

    async fn save(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let blob = self.codec.encode(profile)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset(PROFILES_KEY, &profile.email, &blob)
            .ignore()
            .set(CURRENT_KEY, &blob)
            .ignore();
        if let Some(credential_id) = &profile.passkey_credential_id {
            pipe.hset(PASSKEYS_KEY, credential_id, &profile.email).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

/// Process-local store for running without Redis.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    async fn load(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.profiles.read().await.get(email).cloned())
    }

    async fn load_by_credential(&self, credential_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self
            .profiles
            .read()
            .await
            .values()
            .find(|p| p.passkey_credential_id.as_deref() == Some(credential_id))
            .cloned())
    }

    async fn save(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.profiles
            .write()
            .await
            .insert(profile.email.clone(), profile.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// The store chosen at start-up.
pub enum ProfileBackend {
    Redis(RedisProfileStore),
    Memory(MemoryProfileStore),
}

impl ProfileBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            ProfileBackend::Redis(_) => "redis",
            ProfileBackend::Memory(_) => "memory",
        }
    }
}

impl ProfileStore for ProfileBackend {
    async fn load(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        match self {
            ProfileBackend::Redis(store) => store.load(email).await,
            ProfileBackend::Memory(store) => store.load(email).await,
        }
    }

    async fn load_by_credential(&self, credential_id: &str) -> Result<Option<UserProfile>, StoreError> {
        match self {
            ProfileBackend::Redis(store) => store.load_by_credential(credential_id).await,
            ProfileBackend::Memory(store) => store.load_by_credential(credential_id).await,
        }
    }

    async fn save(&self, profile: &UserProfile) -> Result<(), StoreError> {
        match self {
            ProfileBackend::Redis(store) => store.save(profile).await,
            ProfileBackend::Memory(store) => store.save(profile).await,
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        match self {
            ProfileBackend::Redis(store) => store.health_check().await,
            ProfileBackend::Memory(store) => store.health_check().await,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Profile blob is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Profile encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("Profile is encrypted but no encryption key is configured")]
    SealedWithoutKey,

    #[error("No profile stored for {0}")]
    UnknownProfile(String),
}
