//! Postgres persistence for signal history and the threshold audit trail

use crate::config;
use crate::models::{
    OutcomeStats, Signal, SignalAction, SignalOutcome, SignalReason, ThresholdAdjustment,
    Timeframe,
};
use crate::threshold::OutcomeSource;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio_postgres::{Client, NoTls, Row};

pub struct SignalDatabase {
    client: Client,
}

impl SignalDatabase {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let database_url = config::get_database_url();
        let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
            .await
            .map_err(|e| {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("Failed to connect to Postgres: {}", e),
                )) as Box<dyn std::error::Error + Send + Sync>
            })?;

        // Drive the connection on its own task
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "Postgres connection error");
            }
        });

        let db = Self { client };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS signals (
                    id TEXT PRIMARY KEY,
                    symbol TEXT NOT NULL,
                    timeframe TEXT NOT NULL,
                    action TEXT NOT NULL,
                    confidence DOUBLE PRECISION NOT NULL,
                    entry_price DOUBLE PRECISION NOT NULL,
                    take_profit DOUBLE PRECISION NOT NULL,
                    stop_loss DOUBLE PRECISION NOT NULL,
                    reasons_json TEXT NOT NULL,
                    narrative TEXT,
                    created_at TIMESTAMPTZ NOT NULL,
                    outcome TEXT NOT NULL,
                    actual_return DOUBLE PRECISION,
                    closed_at TIMESTAMPTZ
                );
                CREATE INDEX IF NOT EXISTS signals_symbol_created_idx
                    ON signals (symbol, created_at DESC);
                CREATE INDEX IF NOT EXISTS signals_outcome_idx
                    ON signals (outcome, created_at DESC);
                CREATE TABLE IF NOT EXISTS threshold_adjustments (
                    id BIGSERIAL PRIMARY KEY,
                    old_threshold DOUBLE PRECISION NOT NULL,
                    new_threshold DOUBLE PRECISION NOT NULL,
                    success_rate DOUBLE PRECISION NOT NULL,
                    sample_size INTEGER NOT NULL,
                    reason TEXT NOT NULL,
                    adjusted_at TIMESTAMPTZ NOT NULL
                );",
            )
            .await
            .map_err(|e| {
                Box::new(std::io::Error::other(format!(
                    "Failed to initialize schema: {}",
                    e
                ))) as Box<dyn std::error::Error + Send + Sync>
            })?;
        Ok(())
    }

    /// Upsert a signal on its dedup id. Re-composing the same setup
    /// refreshes the call; outcome columns are never touched here.
    pub async fn store_signal(
        &self,
        signal: &Signal,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let reasons_json = serde_json::to_string(&signal.reasons).map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to serialize reasons: {}", e),
            )) as Box<dyn std::error::Error + Send + Sync>
        })?;

        self.client
            .execute(
                "INSERT INTO signals (id, symbol, timeframe, action, confidence, entry_price,
                                      take_profit, stop_loss, reasons_json, narrative,
                                      created_at, outcome)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                 ON CONFLICT (id) DO UPDATE SET
                     confidence = EXCLUDED.confidence,
                     entry_price = EXCLUDED.entry_price,
                     take_profit = EXCLUDED.take_profit,
                     stop_loss = EXCLUDED.stop_loss,
                     reasons_json = EXCLUDED.reasons_json,
                     narrative = COALESCE(EXCLUDED.narrative, signals.narrative)",
                &[
                    &signal.id,
                    &signal.symbol,
                    &signal.timeframe.as_str(),
                    &signal.action.as_str(),
                    &signal.confidence,
                    &signal.entry_price,
                    &signal.take_profit,
                    &signal.stop_loss,
                    &reasons_json,
                    &signal.narrative,
                    &signal.created_at,
                    &signal.outcome.as_str(),
                ],
            )
            .await
            .map_err(|e| {
                Box::new(std::io::Error::other(format!("Failed to store signal: {}", e)))
                    as Box<dyn std::error::Error + Send + Sync>
            })?;

        Ok(())
    }

    pub async fn get_signal(
        &self,
        id: &str,
    ) -> Result<Option<Signal>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = self
            .client
            .query(
                "SELECT id, symbol, timeframe, action, confidence, entry_price, take_profit,
                        stop_loss, reasons_json, narrative, created_at, outcome, actual_return,
                        closed_at
                 FROM signals WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(|e| {
                Box::new(std::io::Error::other(format!("Failed to query signal: {}", e)))
                    as Box<dyn std::error::Error + Send + Sync>
            })?;

        rows.first().map(row_to_signal).transpose()
    }

    /// Signal history, newest first, optionally filtered by symbol
    pub async fn get_signals(
        &self,
        symbol: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Signal>, Box<dyn std::error::Error + Send + Sync>> {
        let limit_clause = limit.map(|l| format!(" LIMIT {}", l)).unwrap_or_default();
        let base = "SELECT id, symbol, timeframe, action, confidence, entry_price, take_profit,
                           stop_loss, reasons_json, narrative, created_at, outcome, actual_return,
                           closed_at
                    FROM signals";

        let rows = if let Some(sym) = symbol {
            let query = format!(
                "{} WHERE symbol = $1 ORDER BY created_at DESC{}",
                base, limit_clause
            );
            self.client.query(&query, &[&sym]).await
        } else {
            let query = format!("{} ORDER BY created_at DESC{}", base, limit_clause);
            self.client.query(&query, &[]).await
        }
        .map_err(|e| {
            Box::new(std::io::Error::other(format!(
                "Failed to query signals: {}",
                e
            ))) as Box<dyn std::error::Error + Send + Sync>
        })?;

        rows.iter().map(row_to_signal).collect()
    }

    /// The evaluation window: unresolved directional signals young enough
    /// to still matter. Hold signals never enter the window.
    pub async fn get_pending_signals(
        &self,
        max_age: Duration,
    ) -> Result<Vec<Signal>, Box<dyn std::error::Error + Send + Sync>> {
        let cutoff = Utc::now() - max_age;
        let rows = self
            .client
            .query(
                "SELECT id, symbol, timeframe, action, confidence, entry_price, take_profit,
                        stop_loss, reasons_json, narrative, created_at, outcome, actual_return,
                        closed_at
                 FROM signals
                 WHERE outcome = 'PENDING' AND action <> 'HOLD' AND created_at >= $1
                 ORDER BY created_at ASC",
                &[&cutoff],
            )
            .await
            .map_err(|e| {
                Box::new(std::io::Error::other(format!(
                    "Failed to query pending signals: {}",
                    e
                ))) as Box<dyn std::error::Error + Send + Sync>
            })?;

        rows.iter().map(row_to_signal).collect()
    }

    /// Write a resolution exactly once. Returns false when the signal was
    /// already resolved (idempotent re-evaluation) or unknown.
    pub async fn resolve_outcome(
        &self,
        id: &str,
        outcome: SignalOutcome,
        actual_return: Option<f64>,
        closed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let updated = self
            .client
            .execute(
                "UPDATE signals
                 SET outcome = $2, actual_return = $3, closed_at = $4
                 WHERE id = $1 AND outcome = 'PENDING'",
                &[&id, &outcome.as_str(), &actual_return, &closed_at],
            )
            .await
            .map_err(|e| {
                Box::new(std::io::Error::other(format!(
                    "Failed to resolve outcome: {}",
                    e
                ))) as Box<dyn std::error::Error + Send + Sync>
            })?;

        Ok(updated == 1)
    }

    /// Outcome counts over signals resolved inside the lookback window
    pub async fn get_outcome_stats(
        &self,
        lookback: Duration,
    ) -> Result<OutcomeStats, Box<dyn std::error::Error + Send + Sync>> {
        let cutoff = Utc::now() - lookback;
        let rows = self
            .client
            .query(
                "SELECT outcome, COUNT(*) FROM signals
                 WHERE outcome IN ('WIN', 'LOSS', 'UNTOUCHED') AND closed_at >= $1
                 GROUP BY outcome",
                &[&cutoff],
            )
            .await
            .map_err(|e| {
                Box::new(std::io::Error::other(format!(
                    "Failed to query outcome stats: {}",
                    e
                ))) as Box<dyn std::error::Error + Send + Sync>
            })?;

        let mut stats = OutcomeStats::default();
        for row in rows {
            let outcome: String = row.get(0);
            let count: i64 = row.get(1);
            match outcome.as_str() {
                "WIN" => stats.wins = count as u32,
                "LOSS" => stats.losses = count as u32,
                "UNTOUCHED" => stats.untouched = count as u32,
                _ => {}
            }
        }
        Ok(stats)
    }

    pub async fn record_adjustment(
        &self,
        adjustment: &ThresholdAdjustment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.client
            .execute(
                "INSERT INTO threshold_adjustments
                     (old_threshold, new_threshold, success_rate, sample_size, reason, adjusted_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &adjustment.old_threshold,
                    &adjustment.new_threshold,
                    &adjustment.success_rate,
                    &(adjustment.sample_size as i32),
                    &adjustment.reason,
                    &adjustment.adjusted_at,
                ],
            )
            .await
            .map_err(|e| {
                Box::new(std::io::Error::other(format!(
                    "Failed to record adjustment: {}",
                    e
                ))) as Box<dyn std::error::Error + Send + Sync>
            })?;
        Ok(())
    }

    pub async fn get_recent_adjustments(
        &self,
        limit: usize,
    ) -> Result<Vec<ThresholdAdjustment>, Box<dyn std::error::Error + Send + Sync>> {
        let query = format!(
            "SELECT old_threshold, new_threshold, success_rate, sample_size, reason, adjusted_at
             FROM threshold_adjustments ORDER BY id DESC LIMIT {}",
            limit
        );
        let rows = self.client.query(&query, &[]).await.map_err(|e| {
            Box::new(std::io::Error::other(format!(
                "Failed to query adjustments: {}",
                e
            ))) as Box<dyn std::error::Error + Send + Sync>
        })?;

        Ok(rows
            .iter()
            .map(|row| {
                let sample_size: i32 = row.get(3);
                ThresholdAdjustment {
                    old_threshold: row.get(0),
                    new_threshold: row.get(1),
                    success_rate: row.get(2),
                    sample_size: sample_size as u32,
                    reason: row.get(4),
                    adjusted_at: row.get(5),
                }
            })
            .collect())
    }

    /// Keep only the most recent `keep` audit rows
    pub async fn prune_adjustments(
        &self,
        keep: usize,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let query = format!(
            "DELETE FROM threshold_adjustments
             WHERE id NOT IN (SELECT id FROM threshold_adjustments ORDER BY id DESC LIMIT {})",
            keep
        );
        self.client.execute(&query, &[]).await.map_err(|e| {
            Box::new(std::io::Error::other(format!(
                "Failed to prune adjustments: {}",
                e
            ))) as Box<dyn std::error::Error + Send + Sync>
        })
    }

    /// Explicit retention cleanup of resolved signals
    pub async fn purge_resolved_older_than(
        &self,
        retention: Duration,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let cutoff = Utc::now() - retention;
        self.client
            .execute(
                "DELETE FROM signals WHERE outcome <> 'PENDING' AND created_at < $1",
                &[&cutoff],
            )
            .await
            .map_err(|e| {
                Box::new(std::io::Error::other(format!(
                    "Failed to purge signals: {}",
                    e
                ))) as Box<dyn std::error::Error + Send + Sync>
            })
    }
}

#[async_trait]
impl OutcomeSource for SignalDatabase {
    async fn outcome_stats(
        &self,
        lookback: Duration,
    ) -> Result<OutcomeStats, Box<dyn std::error::Error + Send + Sync>> {
        self.get_outcome_stats(lookback).await
    }
}

fn row_to_signal(row: &Row) -> Result<Signal, Box<dyn std::error::Error + Send + Sync>> {
    let timeframe_str: String = row.get(2);
    let timeframe: Timeframe = timeframe_str.parse().map_err(|e: String| {
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            as Box<dyn std::error::Error + Send + Sync>
    })?;

    let action_str: String = row.get(3);
    let action = SignalAction::parse(&action_str).ok_or_else(|| {
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Unknown action: {}", action_str),
        )) as Box<dyn std::error::Error + Send + Sync>
    })?;

    let outcome_str: String = row.get(11);
    let outcome = SignalOutcome::parse(&outcome_str).ok_or_else(|| {
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Unknown outcome: {}", outcome_str),
        )) as Box<dyn std::error::Error + Send + Sync>
    })?;

    let reasons_json: String = row.get(8);
    let reasons: Vec<SignalReason> = serde_json::from_str(&reasons_json).map_err(|e| {
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to deserialize reasons: {}", e),
        )) as Box<dyn std::error::Error + Send + Sync>
    })?;

    Ok(Signal {
        id: row.get(0),
        symbol: row.get(1),
        timeframe,
        action,
        confidence: row.get(4),
        entry_price: row.get(5),
        take_profit: row.get(6),
        stop_loss: row.get(7),
        reasons,
        narrative: row.get(9),
        created_at: row.get(10),
        outcome,
        actual_return: row.get(12),
        closed_at: row.get(13),
    })
}
