//! Ledger-consistent points and inventory engine.
//!
//! Every balance change goes through [`Engine::apply_delta`] (directly or from
//! a daily gift, mission claim or purchase), which writes one ledger row and
//! the cached balance in the same database transaction. Writes for one user
//! are serialized; writes for different users run concurrently.

pub use commands::{
    DeltaCmd, MissionNew, ProgressCmd, PurchaseCmd, PurchaseTarget, RewardNew, ShopItemNew,
};
pub use config::EngineSettings;
pub use daily_gifts::StreakState;
pub use error::EngineError;
pub use inventories::UserInventory;
pub use inventory_items::{AcquisitionSource, ItemKind, UserInventoryItem};
pub use ledger::{BesitoTransaction, TransactionKind};
pub use levels::{Level, band_for};
pub use missions::{Mission, MissionMetadata, ObjectiveType, Recurrence};
pub use ops::{
    DailyGiftOutcome, DailyGiftStatus, DeltaOutcome, Engine, EngineBuilder, InventorySnapshot,
    LeaderboardEntry, LeaderboardKind, LedgerAudit, LedgerDiscrepancy, LedgerPage, MissionClaim,
    MissionView, OwnedBadge, ProfileSummary, PurchaseReceipt, PurchaseRefund,
};
pub use purchases::{PurchaseStatus, ShopItemPurchase};
pub use rewards::{BadgeRarity, Reward, RewardPayload, RewardType, UnlockConditions};
pub use shop_items::{ItemType, ShopItem};
pub use user_missions::{MissionState, ProgressStep, UserMission};
pub use user_progress::UserProgress;

mod commands;
mod config;
mod daily_gifts;
mod error;
mod inventories;
mod inventory_items;
mod ledger;
mod levels;
mod locks;
mod missions;
mod ops;
mod progress_events;
mod purchases;
mod rewards;
mod shop_items;
mod user_missions;
mod user_progress;
mod util;
mod vip;

type ResultEngine<T> = Result<T, EngineError>;
