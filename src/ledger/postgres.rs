//! Postgres-backed decision ledger
//!
//! `decision_ledger` is insert-only and unique on the context fingerprint;
//! outcomes live in `decision_outcomes`, keyed by decision id.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::store::LedgerStore;
use super::types::{AppendReceipt, DecisionOutcome, LedgerFilter, LedgerRecord};
use crate::common::errors::{EngineError, Result};
use crate::common::types::{Action, Direction, Timestamp};
use crate::engine::DecisionPacket;

#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<LedgerRecord> {
    let action: String = row.try_get("action")?;
    let action = Action::parse(&action)
        .ok_or_else(|| EngineError::InvalidResponse(format!("unknown action {:?} in ledger", action)))?;
    let direction: Option<String> = row.try_get("direction")?;
    let Json(targets): Json<Vec<Decimal>> = row.try_get("targets")?;
    let Json(packet): Json<DecisionPacket> = row.try_get("packet")?;

    Ok(LedgerRecord {
        id: row.try_get("id")?,
        symbol: row.try_get("symbol")?,
        action,
        direction: direction.as_deref().and_then(Direction::parse),
        confidence: row.try_get("confidence")?,
        size_multiplier: row.try_get("size_multiplier")?,
        price: row.try_get("price")?,
        stop_loss: row.try_get("stop_loss")?,
        targets,
        context_fingerprint: row.try_get("context_fingerprint")?,
        engine_version: row.try_get("engine_version")?,
        decided_at: row.try_get("decided_at")?,
        packet,
    })
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    #[instrument(skip(self, record), fields(id = %record.id, symbol = %record.symbol))]
    async fn append(&self, record: &LedgerRecord) -> Result<AppendReceipt> {
        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO decision_ledger (
                id, symbol, action, direction, confidence, size_multiplier,
                price, stop_loss, targets, context_fingerprint, engine_version,
                decided_at, packet
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (context_fingerprint) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(&record.symbol)
        .bind(record.action.as_str())
        .bind(record.direction.map(|d| d.to_string()))
        .bind(record.confidence)
        .bind(record.size_multiplier)
        .bind(record.price)
        .bind(record.stop_loss)
        .bind(Json(&record.targets))
        .bind(&record.context_fingerprint)
        .bind(&record.engine_version)
        .bind(record.decided_at)
        .bind(Json(&record.packet))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = inserted {
            return Ok(AppendReceipt {
                id,
                duplicate: false,
            });
        }

        let existing = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM decision_ledger WHERE context_fingerprint = $1",
        )
        .bind(&record.context_fingerprint)
        .fetch_one(&self.pool)
        .await?;
        debug!("Context already recorded as {}", existing);

        Ok(AppendReceipt {
            id: existing,
            duplicate: true,
        })
    }

    #[instrument(skip(self))]
    async fn query(&self, filter: &LedgerFilter) -> Result<Vec<LedgerRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, symbol, action, direction, confidence, size_multiplier, price,
                   stop_loss, targets, context_fingerprint, engine_version, decided_at, packet
            FROM decision_ledger
            WHERE ($1::TEXT IS NULL OR symbol = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR decided_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR decided_at < $3)
              AND ($4::TEXT IS NULL OR engine_version = $4)
              AND ($5::TEXT IS NULL OR action = $5)
            ORDER BY decided_at DESC
            LIMIT $6
            "#,
        )
        .bind(filter.symbol.as_deref())
        .bind(filter.since)
        .bind(filter.until)
        .bind(filter.engine_version.as_deref())
        .bind(filter.action.map(|a| a.as_str()))
        .bind(filter.limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn record(&self, decision_id: Uuid) -> Result<Option<LedgerRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, symbol, action, direction, confidence, size_multiplier, price,
                   stop_loss, targets, context_fingerprint, engine_version, decided_at, packet
            FROM decision_ledger
            WHERE id = $1
            "#,
        )
        .bind(decision_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    #[instrument(skip(self, outcome))]
    async fn attach_outcome(&self, decision_id: Uuid, outcome: &DecisionOutcome) -> Result<bool> {
        let known = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM decision_ledger WHERE id = $1)",
        )
        .bind(decision_id)
        .fetch_one(&self.pool)
        .await?;
        if !known {
            return Err(EngineError::UnknownDecision(decision_id));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO decision_outcomes (decision_id, exit_price, realized_pnl, closed_at, note)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (decision_id) DO NOTHING
            "#,
        )
        .bind(decision_id)
        .bind(outcome.exit_price)
        .bind(outcome.realized_pnl)
        .bind(outcome.closed_at)
        .bind(outcome.note.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn outcome(&self, decision_id: Uuid) -> Result<Option<DecisionOutcome>> {
        let row = sqlx::query_as::<_, (Decimal, Decimal, Timestamp, Option<String>)>(
            r#"
            SELECT exit_price, realized_pnl, closed_at, note
            FROM decision_outcomes
            WHERE decision_id = $1
            "#,
        )
        .bind(decision_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(exit_price, realized_pnl, closed_at, note)| DecisionOutcome {
            exit_price,
            realized_pnl,
            closed_at,
            note,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
