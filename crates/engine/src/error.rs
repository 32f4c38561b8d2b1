//! The module contains the errors the engine can throw.
//!
//! Validation failures are returned as structured variants so presentation
//! layers can render them (see [`EngineError::user_message`]). Storage
//! failures surface as [`Database`], except lock contention which becomes the
//! retryable [`Busy`].
//!
//!  [`Database`]: EngineError::Database
//!  [`Busy`]: EngineError::Busy
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: i64, requested: i64 },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Daily gift already claimed today")]
    AlreadyClaimedToday,
    #[error("Mission not completed")]
    MissionNotCompleted,
    #[error("Reward already claimed")]
    AlreadyClaimed,
    #[error("Out of stock: {0}")]
    OutOfStock(String),
    #[error("Purchase cap exceeded: {0}")]
    PurchaseCapExceeded(String),
    #[error("Not eligible: {0}")]
    NotEligible(String),
    #[error("Configuration integrity: {0}")]
    ConfigurationIntegrity(String),
    #[error("Busy: {0}")]
    Busy(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error(transparent)]
    Database(DbErr),
}

impl EngineError {
    /// Short text suitable for end users.
    ///
    /// Internal failures are reported generically; the caller is expected to
    /// log the full error with context.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InsufficientFunds { .. } => "You don't have enough besitos.",
            Self::InvalidAmount(_) => "That amount is not valid.",
            Self::AlreadyClaimedToday => "You already claimed today's gift. Come back tomorrow!",
            Self::MissionNotCompleted => "This mission is not completed yet.",
            Self::AlreadyClaimed => "You already claimed this reward.",
            Self::OutOfStock(_) => "This item is out of stock.",
            Self::PurchaseCapExceeded(_) => "You reached the limit for this item.",
            Self::NotEligible(_) => "You are not eligible for this yet.",
            Self::Busy(_) => "We're busy right now, please try again.",
            Self::KeyNotFound(_) => "We couldn't find that.",
            Self::ExistingKey(_) => "That already exists.",
            Self::InvalidCursor(_) => "That page is no longer available.",
            Self::ConfigurationIntegrity(_) | Self::InvalidCatalog(_) | Self::Database(_) => {
                "Something went wrong, please try again later."
            }
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

/// SQLite reports writer contention as `database is locked` (or `database
/// table is locked` with a shared cache).
fn is_lock_contention(err: &DbErr) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
}

impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        if is_lock_contention(&err) {
            return Self::Busy(err.to_string());
        }
        Self::Database(err)
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::InsufficientFunds {
                    balance: a,
                    requested: b,
                },
                Self::InsufficientFunds {
                    balance: c,
                    requested: d,
                },
            ) => a == c && b == d,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::AlreadyClaimedToday, Self::AlreadyClaimedToday) => true,
            (Self::MissionNotCompleted, Self::MissionNotCompleted) => true,
            (Self::AlreadyClaimed, Self::AlreadyClaimed) => true,
            (Self::OutOfStock(a), Self::OutOfStock(b)) => a == b,
            (Self::PurchaseCapExceeded(a), Self::PurchaseCapExceeded(b)) => a == b,
            (Self::NotEligible(a), Self::NotEligible(b)) => a == b,
            (Self::ConfigurationIntegrity(a), Self::ConfigurationIntegrity(b)) => a == b,
            (Self::Busy(a), Self::Busy(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidCatalog(a), Self::InvalidCatalog(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_contention_maps_to_busy() {
        let err = EngineError::from(DbErr::Custom("database is locked".to_string()));
        assert!(matches!(err, EngineError::Busy(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn other_database_errors_stay_fatal() {
        let err = EngineError::from(DbErr::Custom("no such table: levels".to_string()));
        assert!(matches!(err, EngineError::Database(_)));
        assert!(!err.is_retryable());
        assert_eq!(
            err.user_message(),
            "Something went wrong, please try again later."
        );
    }

    #[test]
    fn insufficient_funds_has_user_message() {
        let err = EngineError::InsufficientFunds {
            balance: 100,
            requested: 150,
        };
        assert_eq!(err.user_message(), "You don't have enough besitos.");
        assert_eq!(
            err.to_string(),
            "Insufficient funds: balance 100, requested 150"
        );
    }
}
