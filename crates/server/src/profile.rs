use api_types::profile::ProfileView;
use axum::{Json, extract::State};

use crate::{CurrentUser, ServerError, server::ServerState};

pub async fn get(
    CurrentUser(user_id): CurrentUser,
    State(state): State<ServerState>,
) -> Result<Json<ProfileView>, ServerError> {
    let profile = state.engine.get_profile_summary(user_id).await?;
    Ok(Json(ProfileView {
        user_id: profile.user_id,
        besitos_balance: profile.besitos_balance,
        level: profile.level,
        level_name: profile.level_name,
        multiplier: profile.multiplier,
        next_level_at: profile.next_level_at,
        total_points_earned: profile.total_points_earned,
        total_points_spent: profile.total_points_spent,
        current_streak: profile.current_streak,
        longest_streak: profile.longest_streak,
        total_claims: profile.total_claims,
        can_claim_daily_gift: profile.can_claim_daily_gift,
        missions_completed: profile.missions_completed,
        inventory_items: profile.inventory_items,
        badges: profile.badges,
        is_vip: profile.is_vip,
    }))
}
