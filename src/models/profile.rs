use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AvatarResponse {
    pub avatar: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub total_tickets: u64,
    pub active_tickets: u64,
    pub won_tickets: u64,
    /// 已付款票据的票价合计
    pub total_spent: f64,
    /// 仍在进行且持有有效票的抽奖数
    pub upcoming_draws: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileStatsResponse {
    pub stats: ProfileStats,
}
