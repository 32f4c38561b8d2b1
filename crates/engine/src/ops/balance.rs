use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr,
};

use crate::{
    BesitoTransaction, DeltaCmd, EngineError, ResultEngine, ledger, user_progress,
    util::normalize_optional_text,
};

use super::{Engine, progress_row, with_tx};

/// Result of a committed balance change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaOutcome {
    pub new_balance: i64,
    pub transaction_id: Uuid,
    pub previous_level: i32,
    pub level: i32,
    /// `true` when an earlier call with the same idempotency key was returned.
    pub replayed: bool,
}

impl DeltaOutcome {
    pub fn leveled_up(&self) -> bool {
        self.level > self.previous_level
    }
}

/// A ledger write that is part of a still-open database transaction.
#[derive(Clone, Debug)]
pub(crate) struct AppliedDelta {
    pub new_balance: i64,
    pub transaction_id: Uuid,
    pub previous_level: i32,
    pub replayed: bool,
}

impl Engine {
    /// Applies a signed delta to a user's balance.
    ///
    /// Writes exactly one ledger row and the cached balance in one database
    /// transaction; a debit larger than the balance fails with
    /// [`EngineError::InsufficientFunds`] and writes nothing. The user's
    /// level is recomputed after the commit; a failure there is logged and
    /// corrected on the next profile read.
    pub async fn apply_delta(&self, cmd: DeltaCmd) -> ResultEngine<DeltaOutcome> {
        let _guard = self.lock_user(cmd.user_id).await?;
        let now = Utc::now();
        let applied = with_tx!(self, |db_tx| apply_delta_in_tx(&db_tx, &cmd, now).await)?;
        let level = self
            .settle_level(cmd.user_id, applied.previous_level)
            .await;
        tracing::debug!(
            user_id = cmd.user_id,
            operation = "apply_delta",
            kind = cmd.kind.as_str(),
            amount = cmd.amount,
            new_balance = applied.new_balance,
            replayed = applied.replayed,
            "balance updated"
        );
        Ok(applied.into_outcome(level))
    }

    /// Current spendable balance; `0` for users never seen.
    pub async fn balance(&self, user_id: i64) -> ResultEngine<i64> {
        Ok(user_progress::Entity::find_by_id(user_id)
            .one(&self.database)
            .await?
            .map_or(0, |model| model.besitos_balance))
    }

    /// Snapshot of the user's balance row, if the user was ever touched.
    pub async fn user_progress(&self, user_id: i64) -> ResultEngine<Option<crate::UserProgress>> {
        Ok(user_progress::Entity::find_by_id(user_id)
            .one(&self.database)
            .await?
            .map(crate::UserProgress::from))
    }
}

impl AppliedDelta {
    pub(crate) fn into_outcome(self, level: i32) -> DeltaOutcome {
        DeltaOutcome {
            new_balance: self.new_balance,
            transaction_id: self.transaction_id,
            previous_level: self.previous_level,
            level,
            replayed: self.replayed,
        }
    }
}

/// Balance engine core. Callers hold the user's lock and commit `db_tx`.
pub(crate) async fn apply_delta_in_tx(
    db_tx: &DatabaseTransaction,
    cmd: &DeltaCmd,
    now: DateTime<Utc>,
) -> ResultEngine<AppliedDelta> {
    if cmd.amount == 0 {
        return Err(EngineError::InvalidAmount(
            "amount must not be zero".to_string(),
        ));
    }
    let idempotency_key = normalize_optional_text(cmd.idempotency_key.as_deref());

    if let Some(key) = idempotency_key.as_deref()
        && let Some(existing) = ledger::Entity::find()
            .filter(ledger::Column::UserId.eq(cmd.user_id))
            .filter(ledger::Column::IdempotencyKey.eq(key))
            .one(db_tx)
            .await?
    {
        let progress = progress_row(db_tx, cmd.user_id, now).await?;
        let existing = BesitoTransaction::try_from(existing)?;
        if existing.amount != cmd.amount || existing.kind != cmd.kind {
            return Err(EngineError::ExistingKey(format!(
                "idempotency key {key} was used for a different delta"
            )));
        }
        return Ok(AppliedDelta {
            new_balance: existing.balance_after,
            transaction_id: existing.id,
            previous_level: progress.current_level,
            replayed: true,
        });
    }

    let progress = progress_row(db_tx, cmd.user_id, now).await?;
    let new_balance = progress
        .besitos_balance
        .checked_add(cmd.amount)
        .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;
    if new_balance < 0 {
        return Err(EngineError::InsufficientFunds {
            balance: progress.besitos_balance,
            requested: cmd.amount.saturating_abs(),
        });
    }
    let (earned, spent) = cmd.kind.apply_to_totals(
        cmd.amount,
        progress.total_points_earned,
        progress.total_points_spent,
    );

    let last_seq = ledger::Entity::find()
        .filter(ledger::Column::UserId.eq(cmd.user_id))
        .order_by_desc(ledger::Column::Seq)
        .one(db_tx)
        .await?
        .map_or(0, |row| row.seq);

    // Guarded by `version`: a concurrent writer that slipped past the user
    // lock (another process) makes this update miss.
    let updated = user_progress::Entity::update_many()
        .col_expr(user_progress::Column::BesitosBalance, Expr::value(new_balance))
        .col_expr(user_progress::Column::TotalPointsEarned, Expr::value(earned))
        .col_expr(user_progress::Column::TotalPointsSpent, Expr::value(spent))
        .col_expr(
            user_progress::Column::Version,
            Expr::value(progress.version + 1),
        )
        .col_expr(user_progress::Column::UpdatedAt, Expr::value(now))
        .filter(user_progress::Column::UserId.eq(cmd.user_id))
        .filter(user_progress::Column::Version.eq(progress.version))
        .exec(db_tx)
        .await?;
    if updated.rows_affected != 1 {
        return Err(EngineError::Busy(format!(
            "balance of user {} changed concurrently",
            cmd.user_id
        )));
    }

    let row = BesitoTransaction {
        id: Uuid::new_v4(),
        user_id: cmd.user_id,
        seq: last_seq + 1,
        amount: cmd.amount,
        kind: cmd.kind,
        reference_id: normalize_optional_text(cmd.reference_id.as_deref()),
        description: normalize_optional_text(cmd.description.as_deref()),
        balance_after: new_balance,
        idempotency_key,
        created_at: now,
    };
    let model: ledger::ActiveModel = (&row).into();
    model.insert(db_tx).await?;

    Ok(AppliedDelta {
        new_balance,
        transaction_id: row.id,
        previous_level: progress.current_level,
        replayed: false,
    })
}
