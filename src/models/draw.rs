use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use super::{TicketDetailResponse, UserSummary, cents_to_price};
use crate::entities::{DrawStatus, TicketStatus, draw_entity};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDrawRequest {
    #[schema(example = "Summer Tombola")]
    pub title: String,
    #[schema(example = "Mountain bike")]
    pub prize: String,
    /// 票价 (两位小数)
    #[schema(example = 5.0)]
    pub price: f64,
    /// 默认当前时间
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: DateTime<Utc>,
    pub max_tickets: Option<i32>,
    pub image: Option<String>,
    pub status: Option<DrawStatus>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDrawRequest {
    pub title: Option<String>,
    pub prize: Option<String>,
    pub price: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// 缺省: 不修改; null: 取消票数上限
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<i32>)]
    pub max_tickets: Option<Option<i32>>,
    pub image: Option<String>,
    pub status: Option<DrawStatus>,
}

// 字段出现 (包括 null) 时为 Some
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DrawResponse {
    pub id: i64,
    pub title: String,
    pub prize: String,
    pub price: f64,
    pub image: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub max_tickets: Option<i32>,
    pub status: DrawStatus,
    pub winner_id: Option<i64>,
    pub winning_ticket_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DrawResponse {
    pub fn with_ticket_count(mut self, count: u64) -> Self {
        self.ticket_count = Some(count);
        self
    }
}

impl From<draw_entity::Model> for DrawResponse {
    fn from(m: draw_entity::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            prize: m.prize,
            price: cents_to_price(m.price_cents),
            image: m.image,
            start_date: m.start_date,
            end_date: m.end_date,
            max_tickets: m.max_tickets,
            status: m.status,
            winner_id: m.winner_id,
            winning_ticket_id: m.winning_ticket_id,
            ticket_count: None,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// 公开列表项: 附带当前用户的参与情况 (未登录时为空)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DrawListItem {
    #[serde(flatten)]
    pub draw: DrawResponse,
    pub has_entered: bool,
    pub ticket_status: Option<TicketStatus>,
    pub ticket_id: Option<i64>,
    pub ticket_number: Option<String>,
}

/// 嵌入票据中的抽奖简要信息
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DrawSummary {
    pub id: i64,
    pub title: String,
    pub prize: String,
    pub price: f64,
    pub end_date: DateTime<Utc>,
    pub status: DrawStatus,
}

impl From<draw_entity::Model> for DrawSummary {
    fn from(m: draw_entity::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            prize: m.prize,
            price: cents_to_price(m.price_cents),
            end_date: m.end_date,
            status: m.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ToggleDrawStatusResponse {
    pub id: i64,
    pub status: DrawStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WinnerResponse {
    pub winner: UserSummary,
    pub ticket: TicketDetailResponse,
    pub draw: DrawResponse,
}
