//! MySQL-backed profile store.
//!
//! Two tables: `imitation_profiles` holds one row per (requester, target) with
//! the fingerprint as JSON, `imitation_messages` holds the messages with their
//! upload position. Replacement runs inside one transaction.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mysql_async::{params, prelude::*, Pool, TxOpts};
use tracing::{info, warn};

use super::ProfileStore;
use crate::config::MySqlSettings;
use crate::session::RequesterId;
use crate::style::StyleFingerprint;
use crate::Result;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS imitation_profiles (
        requester_id BIGINT NOT NULL,
        target VARCHAR(255) NOT NULL,
        fingerprint JSON NULL,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
        PRIMARY KEY (requester_id, target)
    ) CHARACTER SET utf8mb4
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS imitation_messages (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        requester_id BIGINT NOT NULL,
        target VARCHAR(255) NOT NULL,
        position INT NOT NULL,
        message TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        INDEX idx_requester_target (requester_id, target, position)
    ) CHARACTER SET utf8mb4
    "#,
];

pub struct MySqlProfileStore {
    pool: Pool,
}

impl MySqlProfileStore {
    pub fn new(settings: &MySqlSettings) -> Self {
        let opts = mysql_async::OptsBuilder::default()
            .ip_or_hostname(settings.host.clone())
            .tcp_port(settings.port)
            .db_name(Some(settings.database.clone()))
            .user(Some(settings.user.clone()))
            .pass(Some(settings.password.clone()));

        Self {
            pool: Pool::new(opts),
        }
    }

    /// Connect and create tables when missing.
    pub async fn connect(settings: &MySqlSettings) -> Result<Self> {
        let store = Self::new(settings);
        store.ensure_schema().await?;
        info!(host = %settings.host, database = %settings.database, "MySQL profile store ready");
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;
        for statement in SCHEMA {
            conn.query_drop(*statement).await?;
        }
        Ok(())
    }

    pub async fn disconnect(self) -> Result<()> {
        self.pool.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MySqlProfileStore {
    async fn replace_messages(
        &self,
        requester: RequesterId,
        target: &str,
        messages: &[String],
        fingerprint: Option<&StyleFingerprint>,
    ) -> Result<()> {
        let fingerprint_json = fingerprint.map(serde_json::to_string).transpose()?;

        let mut conn = self.pool.get_conn().await?;
        // Dropping the transaction without commit rolls it back.
        let mut tx = conn.start_transaction(TxOpts::default()).await?;

        tx.exec_drop(
            "DELETE FROM imitation_messages WHERE requester_id = :requester AND target = :target",
            params! { "requester" => requester, "target" => target },
        )
        .await?;

        tx.exec_drop(
            r#"
            INSERT INTO imitation_profiles (requester_id, target, fingerprint)
            VALUES (:requester, :target, :fingerprint)
            ON DUPLICATE KEY UPDATE fingerprint = VALUES(fingerprint)
            "#,
            params! {
                "requester" => requester,
                "target" => target,
                "fingerprint" => fingerprint_json,
            },
        )
        .await?;

        tx.exec_batch(
            r#"
            INSERT INTO imitation_messages (requester_id, target, position, message)
            VALUES (:requester, :target, :position, :message)
            "#,
            messages.iter().enumerate().map(|(position, message)| {
                params! {
                    "requester" => requester,
                    "target" => target,
                    "position" => position as i64,
                    "message" => message.as_str(),
                }
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_messages(
        &self,
        requester: RequesterId,
        target: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<String> = conn
            .exec(
                r#"
                SELECT message FROM imitation_messages
                WHERE requester_id = :requester AND target = :target
                ORDER BY position DESC LIMIT :limit
                "#,
                params! {
                    "requester" => requester,
                    "target" => target,
                    "limit" => limit as u64,
                },
            )
            .await?;
        Ok(rows)
    }

    async fn get_fingerprint(
        &self,
        requester: RequesterId,
        target: &str,
    ) -> Result<Option<StyleFingerprint>> {
        let mut conn = self.pool.get_conn().await?;
        let raw: Option<Option<String>> = conn
            .exec_first(
                "SELECT fingerprint FROM imitation_profiles WHERE requester_id = :requester AND target = :target",
                params! { "requester" => requester, "target" => target },
            )
            .await?;

        match raw.flatten() {
            Some(json) => match serde_json::from_str(&json) {
                Ok(fp) => Ok(Some(fp)),
                Err(err) => {
                    warn!(requester, target, "Stored fingerprint is unreadable: {}", err);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn delete_all(&self, requester: RequesterId) -> Result<bool> {
        let mut conn = self.pool.get_conn().await?;
        let mut tx = conn.start_transaction(TxOpts::default()).await?;
        tx.exec_drop(
            "DELETE FROM imitation_messages WHERE requester_id = :requester",
            params! { "requester" => requester },
        )
        .await?;
        tx.exec_drop(
            "DELETE FROM imitation_profiles WHERE requester_id = :requester",
            params! { "requester" => requester },
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn delete_target(&self, requester: RequesterId, target: &str) -> Result<bool> {
        let mut conn = self.pool.get_conn().await?;
        let mut tx = conn.start_transaction(TxOpts::default()).await?;
        tx.exec_drop(
            "DELETE FROM imitation_messages WHERE requester_id = :requester AND target = :target",
            params! { "requester" => requester, "target" => target },
        )
        .await?;
        tx.exec_drop(
            "DELETE FROM imitation_profiles WHERE requester_id = :requester AND target = :target",
            params! { "requester" => requester, "target" => target },
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn list_targets(&self, requester: RequesterId) -> Result<Vec<String>> {
        let mut conn = self.pool.get_conn().await?;
        let targets: Vec<String> = conn
            .exec(
                "SELECT target FROM imitation_profiles WHERE requester_id = :requester ORDER BY target",
                params! { "requester" => requester },
            )
            .await?;
        Ok(targets)
    }

    async fn messages_by_target(
        &self,
        requester: RequesterId,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<(String, String)> = conn
            .exec(
                r#"
                SELECT target, message FROM imitation_messages
                WHERE requester_id = :requester
                ORDER BY target, position
                "#,
                params! { "requester" => requester },
            )
            .await?;

        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (target, message) in rows {
            grouped.entry(target).or_default().push(message);
        }
        Ok(grouped)
    }
}
