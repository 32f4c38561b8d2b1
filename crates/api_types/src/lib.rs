use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code, e.g. `insufficient_funds`.
    pub error: String,
    /// Short text that can be shown to end users as is.
    pub message: String,
    /// The same request may succeed if retried.
    pub retryable: bool,
}

pub mod balance {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionKind {
        Grant,
        Purchase,
        MissionReward,
        DailyGift,
        Reaction,
        Reward,
        Refund,
        Adjustment,
    }

    /// Request body for a signed balance change.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct DeltaNew {
        pub amount: i64,
        pub kind: TransactionKind,
        pub reference_id: Option<String>,
        pub description: Option<String>,
        /// Retries with the same key return the first result.
        pub idempotency_key: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DeltaApplied {
        pub new_balance: i64,
        pub transaction_id: Uuid,
        pub level: i32,
        pub leveled_up: bool,
        pub replayed: bool,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct LedgerQuery {
        pub limit: Option<u64>,
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LedgerEntryView {
        pub id: Uuid,
        pub seq: i64,
        pub amount: i64,
        pub kind: TransactionKind,
        pub reference_id: Option<String>,
        pub description: Option<String>,
        pub balance_after: i64,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LedgerPageResponse {
        pub items: Vec<LedgerEntryView>,
        pub next_cursor: Option<String>,
    }
}

pub mod daily_gift {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DailyGiftClaimed {
        pub besitos_granted: i64,
        pub new_balance: i64,
        pub claim_date: NaiveDate,
        pub current_streak: i32,
        pub longest_streak: i32,
        pub total_claims: i32,
        pub level: i32,
        pub leveled_up: bool,
        pub completed_missions: Vec<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DailyGiftStatus {
        pub can_claim: bool,
        pub besitos_amount: i64,
        pub current_streak: i32,
        pub longest_streak: i32,
        pub total_claims: i32,
        pub last_claim_date: Option<NaiveDate>,
    }
}

pub mod mission {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ObjectiveType {
        Streak,
        DailyCount,
        WeeklyCount,
        OneTimeCount,
        SpecificReaction,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum MissionState {
        NotStarted,
        InProgress,
        Completed,
        Claimed,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MissionView {
        pub id: Uuid,
        pub name: String,
        pub description: Option<String>,
        pub objective_type: ObjectiveType,
        pub objective_value: i64,
        pub besitos_reward: i64,
        pub reward_id: Option<Uuid>,
        /// `None` until the user starts the mission.
        pub state: Option<MissionState>,
        pub current_progress: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MissionListResponse {
        pub missions: Vec<MissionView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MissionStarted {
        pub started: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProgressNew {
        pub objective: ObjectiveType,
        pub increment: i64,
        pub reaction: Option<String>,
        pub idempotency_key: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReactionNew {
        pub reaction: String,
        pub idempotency_key: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProgressRecorded {
        pub completed: Vec<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MissionClaimed {
        pub mission_id: Uuid,
        pub besitos_granted: i64,
        pub new_balance: i64,
        pub reward_id: Option<Uuid>,
        pub level: i32,
    }
}

pub mod shop {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ItemType {
        Consumable,
        Cosmetic,
        Collectible,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ShopItemView {
        pub id: Uuid,
        pub name: String,
        pub description: Option<String>,
        pub item_type: ItemType,
        pub price: i64,
        pub stock: Option<i64>,
        pub max_per_user: Option<i64>,
        pub is_vip_only: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ShopResponse {
        pub items: Vec<ShopItemView>,
    }

    /// What to buy: `{"shop_item": "<uuid>"}` or `{"reward": "<uuid>"}`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum PurchaseTarget {
        ShopItem(Uuid),
        Reward(Uuid),
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PurchaseNew {
        pub target: PurchaseTarget,
        /// Defaults to 1.
        pub quantity: Option<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PurchaseCompleted {
        pub purchase_id: Option<Uuid>,
        pub quantity: i64,
        pub price_paid: i64,
        pub new_balance: i64,
        pub inventory_item_id: Option<Uuid>,
        pub level: i32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PurchaseRefunded {
        pub purchase_id: Uuid,
        pub refunded: i64,
        pub new_balance: i64,
    }
}

pub mod inventory {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ItemKind {
        ShopItem,
        Badge,
        Permission,
        RewardItem,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InventoryItemView {
        pub id: Uuid,
        pub item_kind: ItemKind,
        pub item_ref: Uuid,
        pub name: String,
        pub quantity: i64,
        pub is_equipped: bool,
        pub is_used: bool,
        pub acquired_at: DateTime<Utc>,
        pub expires_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InventoryResponse {
        pub total_items: i64,
        pub total_spent: i64,
        pub items: Vec<InventoryItemView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EquipItem {
        pub equipped: bool,
    }
}

pub mod leaderboard {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum LeaderboardKind {
        #[default]
        Besitos,
        Level,
        Streak,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct LeaderboardQuery {
        #[serde(default)]
        pub kind: LeaderboardKind,
        pub limit: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LeaderboardEntryView {
        pub rank: u32,
        pub user_id: i64,
        pub value: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LeaderboardResponse {
        pub kind: LeaderboardKind,
        pub entries: Vec<LeaderboardEntryView>,
    }
}

pub mod profile {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProfileView {
        pub user_id: i64,
        pub besitos_balance: i64,
        pub level: i32,
        pub level_name: Option<String>,
        pub multiplier: f64,
        pub next_level_at: Option<i64>,
        pub total_points_earned: i64,
        pub total_points_spent: i64,
        pub current_streak: i32,
        pub longest_streak: i32,
        pub total_claims: i32,
        pub can_claim_daily_gift: bool,
        pub missions_completed: u64,
        pub inventory_items: i64,
        pub badges: u64,
        pub is_vip: bool,
    }
}
