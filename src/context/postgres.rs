//! Postgres-backed context repository
//!
//! One row per symbol; the context itself is stored as JSONB next to an
//! integer version column used for compare-and-swap.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::repository::ContextRepository;
use super::types::DecisionContext;
use crate::common::errors::Result;

/// Context repository shared by every handler instance through Postgres
#[derive(Debug, Clone)]
pub struct PgContextRepository {
    pool: PgPool,
}

impl PgContextRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContextRepository for PgContextRepository {
    #[instrument(skip(self))]
    async fn load(&self, symbol: &str) -> Result<Option<DecisionContext>> {
        let row = sqlx::query_scalar::<_, Json<DecisionContext>>(
            "SELECT context FROM decision_contexts WHERE symbol = $1",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(context)| context))
    }

    #[instrument(skip(self, context), fields(version = context.version))]
    async fn compare_and_swap(
        &self,
        symbol: &str,
        expected: Option<u64>,
        context: &DecisionContext,
    ) -> Result<bool> {
        let result = match expected {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO decision_contexts (symbol, version, context, updated_at)
                    VALUES ($1, $2, $3, NOW())
                    ON CONFLICT (symbol) DO NOTHING
                    "#,
                )
                .bind(symbol)
                .bind(context.version as i64)
                .bind(Json(context))
                .execute(&self.pool)
                .await?
            }
            Some(version) => {
                sqlx::query(
                    r#"
                    UPDATE decision_contexts
                    SET version = $3, context = $4, updated_at = NOW()
                    WHERE symbol = $1 AND version = $2
                    "#,
                )
                .bind(symbol)
                .bind(version as i64)
                .bind(context.version as i64)
                .bind(Json(context))
                .execute(&self.pool)
                .await?
            }
        };

        let swapped = result.rows_affected() == 1;
        if !swapped {
            debug!("Version conflict writing context for {}", symbol);
        }
        Ok(swapped)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
