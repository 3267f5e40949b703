use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{DrawSummary, UserSummary};
use crate::entities::{
    DrawStatus, PaymentStatus, TicketStatus, draw_entity, ticket_entity, user_entity,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    pub id: i64,
    pub number: String,
    pub user_id: i64,
    pub draw_id: i64,
    pub purchase_date: DateTime<Utc>,
    pub status: TicketStatus,
    pub payment_status: PaymentStatus,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ticket_entity::Model> for TicketResponse {
    fn from(m: ticket_entity::Model) -> Self {
        Self {
            id: m.id,
            number: m.number,
            user_id: m.user_id,
            draw_id: m.draw_id,
            purchase_date: m.purchase_date,
            status: m.status,
            payment_status: m.payment_status,
            admin_note: m.admin_note,
            created_at: m.created_at,
        }
    }
}

/// 票据 + 所属抽奖 + 持有人
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketDetailResponse {
    #[serde(flatten)]
    pub ticket: TicketResponse,
    pub draw: Option<DrawSummary>,
    pub user: Option<UserSummary>,
}

impl TicketDetailResponse {
    pub fn new(
        ticket: ticket_entity::Model,
        draw: Option<draw_entity::Model>,
        user: Option<user_entity::Model>,
    ) -> Self {
        Self {
            ticket: ticket.into(),
            draw: draw.map(Into::into),
            user: user.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnterDrawResponse {
    pub ticket: TicketDetailResponse,
    pub has_entered: bool,
    pub ticket_status: TicketStatus,
    pub draw_status: DrawStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TicketListResponse {
    pub tickets: Vec<TicketDetailResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TicketEnvelope {
    pub ticket: TicketDetailResponse,
}

/// 管理员审核结果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Accepted,
    Declined,
}

impl ReviewDecision {
    /// 审核结果对应的 (票据状态, 付款状态)
    pub fn outcome(self) -> (TicketStatus, PaymentStatus) {
        match self {
            ReviewDecision::Accepted => (TicketStatus::Active, PaymentStatus::Completed),
            ReviewDecision::Declined => (TicketStatus::Declined, PaymentStatus::Failed),
        }
    }
}

impl std::fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewDecision::Accepted => write!(f, "accepted"),
            ReviewDecision::Declined => write!(f, "declined"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicketStatusRequest {
    pub status: ReviewDecision,
    pub admin_note: Option<String>,
}
