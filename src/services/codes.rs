//! Email verification codes.
//!
//! Pending codes live in process memory keyed by `(email, purpose)`; every
//! issued code is also appended to a durable audit store. Verification takes
//! the in-memory fast path and only consults the durable store when the
//! process holds no entry for the key (for example after a restart).

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::{sync::RwLock, task::JoinHandle};

use crate::{
    config::CodesConfig,
    error::{AppError, AppResult},
    models::{email_code::NewEmailCode, CodePurpose},
};

/// Durable side of the code store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeRecordStore: Send + Sync {
    /// Append an issued code
    async fn insert(&self, record: NewEmailCode) -> AppResult<()>;

    /// Mark the newest record for the key as used if it carries `code`, is
    /// unused and has not expired. Superseded records never match.
    /// Returns whether a record was claimed.
    async fn consume(
        &self,
        email: &str,
        purpose: CodePurpose,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;
}

/// Lifetime and resend interval of codes
#[derive(Debug, Clone, Copy)]
pub struct CodePolicy {
    pub ttl: Duration,
    pub cooldown: Duration,
}

impl Default for CodePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(30),
            cooldown: Duration::seconds(60),
        }
    }
}

impl From<&CodesConfig> for CodePolicy {
    fn from(config: &CodesConfig) -> Self {
        Self {
            ttl: Duration::minutes(config.ttl_minutes),
            cooldown: Duration::seconds(config.cooldown_seconds),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCode {
    code: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

enum Lookup {
    Absent,
    Expired,
    Matched,
    Mismatch,
}

type CodeKey = (String, CodePurpose);

fn code_key(email: &str, purpose: CodePurpose) -> CodeKey {
    (email.trim().to_lowercase(), purpose)
}

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

pub struct VerificationCodeStore {
    pending: RwLock<HashMap<CodeKey, PendingCode>>,
    records: Arc<dyn CodeRecordStore>,
    policy: CodePolicy,
}

impl VerificationCodeStore {
    pub fn new(records: Arc<dyn CodeRecordStore>, policy: CodePolicy) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            records,
            policy,
        }
    }

    /// Issue a fresh code, replacing any previous one for the same key
    pub async fn issue(&self, email: &str, purpose: CodePurpose) -> AppResult<String> {
        self.issue_at(email, purpose, Utc::now()).await
    }

    pub async fn issue_at(
        &self,
        email: &str,
        purpose: CodePurpose,
        now: DateTime<Utc>,
    ) -> AppResult<String> {
        let key = code_key(email, purpose);

        // The lock is released before the durable append
        let entry = {
            let mut pending = self.pending.write().await;

            if let Some(existing) = pending.get(&key) {
                if now < existing.issued_at + self.policy.cooldown {
                    return Err(AppError::RateLimited);
                }
            }

            let entry = PendingCode {
                code: generate_code(),
                issued_at: now,
                expires_at: now + self.policy.ttl,
            };
            pending.insert(key.clone(), entry.clone());
            entry
        };

        let record = NewEmailCode {
            email: key.0.clone(),
            code: entry.code.clone(),
            action: purpose,
            created_at: entry.issued_at,
            expires_at: entry.expires_at,
        };
        if let Err(e) = self.records.insert(record).await {
            tracing::warn!("Failed to record {} code for {}: {}", purpose, key.0, e);
        }

        Ok(entry.code)
    }

    /// Check and consume a code. Succeeds at most once per issued code.
    pub async fn verify(&self, email: &str, purpose: CodePurpose, code: &str) -> AppResult<()> {
        self.verify_at(email, purpose, code, Utc::now()).await
    }

    pub async fn verify_at(
        &self,
        email: &str,
        purpose: CodePurpose,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let key = code_key(email, purpose);
        let code = code.trim();

        let lookup = {
            let mut pending = self.pending.write().await;

            let lookup = match pending.get(&key) {
                None => Lookup::Absent,
                Some(entry) if now >= entry.expires_at => Lookup::Expired,
                Some(entry) if entry.code == code => Lookup::Matched,
                Some(_) => Lookup::Mismatch,
            };
            if matches!(lookup, Lookup::Expired | Lookup::Matched) {
                pending.remove(&key);
            }
            lookup
        };

        match lookup {
            Lookup::Expired => Err(AppError::CodeExpired),
            Lookup::Mismatch => Err(AppError::InvalidCode),
            Lookup::Matched => {
                if let Err(e) = self.records.consume(&key.0, purpose, code, now).await {
                    tracing::warn!("Failed to mark {} code used for {}: {}", purpose, key.0, e);
                }
                Ok(())
            }
            Lookup::Absent => {
                if self.records.consume(&key.0, purpose, code, now).await? {
                    Ok(())
                } else {
                    Err(AppError::InvalidCode)
                }
            }
        }
    }

    /// Drop expired entries; returns how many were removed
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut pending = self.pending.write().await;
        let before = pending.len();
        pending.retain(|_, entry| entry.expires_at > now);
        before - pending.len()
    }

    /// Periodically sweep expired entries until the handle is aborted
    pub fn spawn_sweeper(self: Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let removed = self.sweep_expired(Utc::now()).await;
                if removed > 0 {
                    tracing::debug!("Swept {} expired verification codes", removed);
                }
            }
        })
    }

    #[cfg(test)]
    async fn pending_len(&self) -> usize {
        self.pending.read().await.len()
    }
}
