use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserResponse;
use crate::entities::UserRole;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: u64,
    pub active_draws: u64,
    pub total_revenue: f64,
    /// 近30天新增用户占比 (%)
    pub user_growth: f64,
    /// 近30天新建抽奖 / 进行中抽奖 (%)
    pub draw_growth: f64,
    /// 至少持有一张票的用户占比 (%)
    pub conversion_rate: f64,
    pub conversion_rate_change: f64,
    pub pending_tickets: u64,
    pub recent_activity: Vec<RecentActivityItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecentActivityItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub ticket_count: u64,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct AdminUpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageResponse {
    pub image_url: String,
    pub public_id: String,
}
