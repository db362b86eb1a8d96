use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Impact points needed per level.
pub const POINTS_PER_LEVEL: u32 = 5;

/// Aggregate worker stats shown on the profile screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStats {
    pub impact_points: u32,
    pub streak: u32,
    pub trust_score: u32,
    pub level: u32,
}

impl Default for UserStats {
    /// Applied to stored profiles that predate stats tracking.
    fn default() -> Self {
        Self {
            impact_points: 0,
            streak: 0,
            trust_score: 95,
            level: 1,
        }
    }
}

impl UserStats {
    pub fn new_member() -> Self {
        Self {
            trust_score: 98,
            ..Self::default()
        }
    }
}

/// Durable user record held by the profile store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub balance: u64,
    pub joined_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passkey_credential_id: Option<String>,
    #[serde(default)]
    pub stats: UserStats,
}

impl UserProfile {
    pub fn new(name: String, email: String, phone: String) -> Self {
        Self {
            name,
            email,
            phone,
            balance: 0,
            joined_date: Utc::now(),
            passkey_credential_id: None,
            stats: UserStats::new_member(),
        }
    }

    /// Payout bookkeeping: balance grows by the reward, one impact point is
    /// earned, and every fifth point bumps the level.
    pub fn credit_reward(&mut self, reward: u64) {
        self.balance = self.balance.saturating_add(reward);
        self.stats.impact_points = self.stats.impact_points.saturating_add(1);
        if self.stats.impact_points % POINTS_PER_LEVEL == 0 {
            self.stats.level = self.stats.level.saturating_add(1);
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Earning,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: Uuid,
    pub amount: u64,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub status: TransactionStatus,
}

impl Transaction {
    pub fn new(amount: u64, kind: TransactionKind, status: TransactionStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            date: Utc::now(),
            kind,
            status,
        }
    }
}

/// Session view of the worker's money: the stored balance plus the
/// transactions made since sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wallet {
    pub balance: u64,
    pub currency: String,
    pub transactions: Vec<Transaction>,
}

impl Wallet {
    pub fn new(balance: u64, currency: &str) -> Self {
        Self {
            balance,
            currency: currency.to_string(),
            transactions: Vec::new(),
        }
    }
}
