//! Command structs for engine operations.
//!
//! These types group parameters for write operations (balance deltas,
//! mission progress, purchases and catalog entries), keeping call sites
//! readable and avoiding long argument lists.

use uuid::Uuid;

use crate::{
    ItemType, MissionMetadata, ObjectiveType, RewardPayload, TransactionKind, UnlockConditions,
};

/// Apply a signed besitos delta to a user's balance.
#[derive(Clone, Debug)]
pub struct DeltaCmd {
    pub user_id: i64,
    /// Positive credits, negative debits. Zero is rejected.
    pub amount: i64,
    pub kind: TransactionKind,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

impl DeltaCmd {
    #[must_use]
    pub fn new(user_id: i64, amount: i64, kind: TransactionKind) -> Self {
        Self {
            user_id,
            amount,
            kind,
            reference_id: None,
            description: None,
            idempotency_key: None,
        }
    }

    #[must_use]
    pub fn reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Record qualifying activity for every in-progress mission of one objective type.
#[derive(Clone, Debug)]
pub struct ProgressCmd {
    pub user_id: i64,
    pub objective: ObjectiveType,
    pub increment: i64,
    /// For `specific_reaction` objectives: only missions counting this reaction advance.
    pub reaction: Option<String>,
    /// Repeating a key makes the call a no-op.
    pub idempotency_key: Option<String>,
}

impl ProgressCmd {
    #[must_use]
    pub fn new(user_id: i64, objective: ObjectiveType, increment: i64) -> Self {
        Self {
            user_id,
            objective,
            increment,
            reaction: None,
            idempotency_key: None,
        }
    }

    #[must_use]
    pub fn reaction(mut self, reaction: impl Into<String>) -> Self {
        self.reaction = Some(reaction.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// What a purchase buys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PurchaseTarget {
    ShopItem(Uuid),
    Reward(Uuid),
}

#[derive(Clone, Debug)]
pub struct PurchaseCmd {
    pub user_id: i64,
    pub target: PurchaseTarget,
    /// Units to buy; only shop items accept more than one.
    pub quantity: i64,
}

impl PurchaseCmd {
    #[must_use]
    pub fn shop_item(user_id: i64, item_id: Uuid) -> Self {
        Self {
            user_id,
            target: PurchaseTarget::ShopItem(item_id),
            quantity: 1,
        }
    }

    #[must_use]
    pub fn reward(user_id: i64, reward_id: Uuid) -> Self {
        Self {
            user_id,
            target: PurchaseTarget::Reward(reward_id),
            quantity: 1,
        }
    }

    #[must_use]
    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }
}

/// Create a mission catalog entry.
#[derive(Clone, Debug)]
pub struct MissionNew {
    pub name: String,
    pub description: Option<String>,
    pub objective_type: ObjectiveType,
    pub objective_value: i64,
    pub besitos_reward: i64,
    pub reward_id: Option<Uuid>,
    pub required_level: i32,
    pub is_vip_only: bool,
    pub metadata: MissionMetadata,
}

impl MissionNew {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        objective_type: ObjectiveType,
        objective_value: i64,
        besitos_reward: i64,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            objective_type,
            objective_value,
            besitos_reward,
            reward_id: None,
            required_level: 1,
            is_vip_only: false,
            metadata: MissionMetadata::default(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn reward_id(mut self, reward_id: Uuid) -> Self {
        self.reward_id = Some(reward_id);
        self
    }

    #[must_use]
    pub fn required_level(mut self, level: i32) -> Self {
        self.required_level = level;
        self
    }

    #[must_use]
    pub fn vip_only(mut self, is_vip_only: bool) -> Self {
        self.is_vip_only = is_vip_only;
        self
    }

    #[must_use]
    pub fn reaction(mut self, reaction: impl Into<String>) -> Self {
        self.metadata.reaction = Some(reaction.into());
        self
    }
}

/// Create a reward catalog entry.
#[derive(Clone, Debug)]
pub struct RewardNew {
    pub name: String,
    pub description: Option<String>,
    pub payload: RewardPayload,
    pub cost_besitos: Option<i64>,
    pub unlock: UnlockConditions,
}

impl RewardNew {
    #[must_use]
    pub fn new(name: impl Into<String>, payload: RewardPayload) -> Self {
        Self {
            name: name.into(),
            description: None,
            payload,
            cost_besitos: None,
            unlock: UnlockConditions::default(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn cost(mut self, besitos: i64) -> Self {
        self.cost_besitos = Some(besitos);
        self
    }

    #[must_use]
    pub fn unlocked_by_mission(mut self, mission_id: Uuid) -> Self {
        self.unlock.mission_id = Some(mission_id);
        self
    }

    #[must_use]
    pub fn min_level(mut self, level: i32) -> Self {
        self.unlock.min_level = Some(level);
        self
    }

    #[must_use]
    pub fn min_besitos(mut self, besitos: i64) -> Self {
        self.unlock.min_besitos = Some(besitos);
        self
    }
}

/// Create a shop catalog entry.
#[derive(Clone, Debug)]
pub struct ShopItemNew {
    pub name: String,
    pub description: Option<String>,
    pub item_type: ItemType,
    pub price: i64,
    pub stock: Option<i64>,
    pub max_per_user: Option<i64>,
    pub is_vip_only: bool,
}

impl ShopItemNew {
    #[must_use]
    pub fn new(name: impl Into<String>, item_type: ItemType, price: i64) -> Self {
        Self {
            name: name.into(),
            description: None,
            item_type,
            price,
            stock: None,
            max_per_user: None,
            is_vip_only: false,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn stock(mut self, stock: i64) -> Self {
        self.stock = Some(stock);
        self
    }

    #[must_use]
    pub fn max_per_user(mut self, max: i64) -> Self {
        self.max_per_user = Some(max);
        self
    }

    #[must_use]
    pub fn vip_only(mut self, is_vip_only: bool) -> Self {
        self.is_vip_only = is_vip_only;
        self
    }
}
