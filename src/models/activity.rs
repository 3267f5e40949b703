use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{ActivityType, activity_entity, user_entity};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub description: String,
    pub user_id: Option<i64>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub user: Option<ActivityUser>,
}

impl From<(activity_entity::Model, Option<user_entity::Model>)> for ActivityResponse {
    fn from((m, user): (activity_entity::Model, Option<user_entity::Model>)) -> Self {
        Self {
            id: m.id,
            title: m.title,
            activity_type: m.activity_type,
            description: m.description,
            user_id: m.user_id,
            metadata: m.metadata,
            timestamp: m.timestamp,
            user: user.map(|u| ActivityUser {
                name: u.name,
                email: u.email,
            }),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivitiesQuery {
    /// 默认 10, 最大 100
    pub limit: Option<u64>,
    #[serde(rename = "type")]
    pub activity_type: Option<ActivityType>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStatsQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sea_orm::FromQueryResult)]
pub struct ActivityTypeCount {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityListResponse {
    pub activities: Vec<ActivityResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityStatsResponse {
    pub stats: Vec<ActivityTypeCount>,
}
