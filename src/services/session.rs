use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::profile::{Transaction, TransactionKind, TransactionStatus, UserProfile, Wallet};

const SESSION_TTL_HOURS: i64 = 12;

/// Everything that belongs to the signed-in worker. Built at login,
/// dropped at logout.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: Uuid,
    pub profile: UserProfile,
    pub wallet: Wallet,
    pub started_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn open(profile: UserProfile, currency: &str) -> Self {
        let wallet = Wallet::new(profile.balance, currency);
        Self {
            id: Uuid::new_v4(),
            profile,
            wallet,
            started_at: Utc::now(),
        }
    }

    /// Adopt the store's post-payout profile and log the earning.
    pub fn record_payout(&mut self, settled: UserProfile, reward: u64) {
        self.wallet.balance = settled.balance;
        self.wallet.transactions.push(Transaction::new(
            reward,
            TransactionKind::Earning,
            TransactionStatus::Completed,
        ));
        self.profile = settled;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub sid: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and checks the bearer tokens handed to the front-end.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Result<Self, SessionError> {
        if secret.len() < 16 {
            return Err(SessionError::WeakSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn issue(&self, session: &SessionContext) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: session.profile.email.clone(),
            sid: session.id,
            iat: now.timestamp(),
            exp: (now + Duration::hours(SESSION_TTL_HOURS)).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session secret must be at least 16 bytes")]
    WeakSecret,

    #[error("Invalid session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}
