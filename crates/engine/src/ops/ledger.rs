use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*, sea_query::Expr};

use crate::{BesitoTransaction, EngineError, ResultEngine, UserProgress, ledger, user_progress};

use super::{Engine, with_tx};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPage {
    pub items: Vec<BesitoTransaction>,
    pub next_cursor: Option<String>,
}

/// A ledger row whose `balance_after` disagrees with the running sum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDiscrepancy {
    pub seq: i64,
    pub transaction_id: Uuid,
    pub expected_balance_after: i64,
    pub recorded_balance_after: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAudit {
    pub user_id: i64,
    pub entries: usize,
    pub cached_balance: i64,
    pub ledger_balance: i64,
    pub ledger_earned: i64,
    pub ledger_spent: i64,
    pub discrepancies: Vec<LedgerDiscrepancy>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty() && self.cached_balance == self.ledger_balance
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct LedgerCursor {
    seq: i64,
}

impl LedgerCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid ledger cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid ledger cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid ledger cursor".to_string()))
    }
}

impl Engine {
    /// Lists a user's ledger, newest first, with cursor-based pagination.
    pub async fn list_ledger_page(
        &self,
        user_id: i64,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<LedgerPage> {
        let limit = limit.clamp(1, 200);
        let mut query = ledger::Entity::find()
            .filter(ledger::Column::UserId.eq(user_id))
            .order_by_desc(ledger::Column::Seq)
            .limit(limit.saturating_add(1));
        if let Some(cursor) = cursor {
            let cursor = LedgerCursor::decode(cursor)?;
            query = query.filter(ledger::Column::Seq.lt(cursor.seq));
        }

        let rows = query.all(&self.database).await?;
        let has_more = rows.len() > limit as usize;
        let items = rows
            .into_iter()
            .take(limit as usize)
            .map(BesitoTransaction::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        let next_cursor = match items.last() {
            Some(last) if has_more => Some(LedgerCursor { seq: last.seq }.encode()?),
            _ => None,
        };
        Ok(LedgerPage { items, next_cursor })
    }

    /// Replays a user's ledger and compares it with the cached balance.
    pub async fn audit_ledger(&self, user_id: i64) -> ResultEngine<LedgerAudit> {
        let cached_balance = user_progress::Entity::find_by_id(user_id)
            .one(&self.database)
            .await?
            .map_or(0, |model| model.besitos_balance);
        let rows = ledger::Entity::find()
            .filter(ledger::Column::UserId.eq(user_id))
            .order_by_asc(ledger::Column::Seq)
            .all(&self.database)
            .await?;

        let mut audit = LedgerAudit {
            user_id,
            entries: rows.len(),
            cached_balance,
            ledger_balance: 0,
            ledger_earned: 0,
            ledger_spent: 0,
            discrepancies: Vec::new(),
        };
        for row in rows {
            let row = BesitoTransaction::try_from(row)?;
            audit.ledger_balance += row.amount;
            (audit.ledger_earned, audit.ledger_spent) =
                row.kind
                    .apply_to_totals(row.amount, audit.ledger_earned, audit.ledger_spent);
            if row.balance_after != audit.ledger_balance {
                audit.discrepancies.push(LedgerDiscrepancy {
                    seq: row.seq,
                    transaction_id: row.id,
                    expected_balance_after: audit.ledger_balance,
                    recorded_balance_after: row.balance_after,
                });
            }
        }
        if !audit.is_consistent() {
            tracing::warn!(
                user_id,
                operation = "audit_ledger",
                cached = audit.cached_balance,
                ledger = audit.ledger_balance,
                discrepancies = audit.discrepancies.len(),
                "ledger and cached balance disagree"
            );
        }
        Ok(audit)
    }

    /// Rewrites the cached balance and lifetime counters from the ledger.
    ///
    /// Ledger rows are never touched. Returns the repaired row.
    pub async fn repair_balance(&self, user_id: i64) -> ResultEngine<UserProgress> {
        let _guard = self.lock_user(user_id).await?;
        let audit = self.audit_ledger(user_id).await?;
        let now = Utc::now();
        let repaired = with_tx!(self, |db_tx| {
            let progress = user_progress::Entity::find_by_id(user_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| super::missing("user progress"))?;
            user_progress::Entity::update_many()
                .col_expr(
                    user_progress::Column::BesitosBalance,
                    Expr::value(audit.ledger_balance),
                )
                .col_expr(
                    user_progress::Column::TotalPointsEarned,
                    Expr::value(audit.ledger_earned),
                )
                .col_expr(
                    user_progress::Column::TotalPointsSpent,
                    Expr::value(audit.ledger_spent),
                )
                .col_expr(
                    user_progress::Column::Version,
                    Expr::value(progress.version + 1),
                )
                .col_expr(user_progress::Column::UpdatedAt, Expr::value(now))
                .filter(user_progress::Column::UserId.eq(user_id))
                .exec(&db_tx)
                .await?;
            let repaired = user_progress::Entity::find_by_id(user_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| super::missing("user progress"))?;
            Ok::<_, EngineError>(UserProgress::from(repaired))
        })?;
        let level = self.settle_level(user_id, repaired.current_level).await;
        tracing::info!(
            user_id,
            operation = "repair_balance",
            from = audit.cached_balance,
            to = audit.ledger_balance,
            "cached balance rewritten from ledger"
        );
        Ok(UserProgress {
            current_level: level,
            ..repaired
        })
    }
}
