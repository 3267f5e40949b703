use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum DrawStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl std::fmt::Display for DrawStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawStatus::Active => write!(f, "active"),
            DrawStatus::Completed => write!(f, "completed"),
            DrawStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// 抽奖活动
/// - price_cents: 单张票价 (美分)
/// - max_tickets: 票数上限 (NULL = 不限)
/// - winner_id / winning_ticket_id: 开奖后写入
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "draws")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    pub prize: String,
    pub price_cents: i64,
    pub image: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub max_tickets: Option<i32>,
    pub status: DrawStatus,
    pub winner_id: Option<i64>,
    pub winning_ticket_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Active, started and not yet ended at `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == DrawStatus::Active && self.start_date <= now && now < self.end_date
    }

    pub fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        self.end_date <= now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tickets::Entity")]
    Tickets,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::WinnerId",
        to = "super::users::Column::Id",
        on_delete = "SetNull"
    )]
    Winner,
}

impl Related<super::tickets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
