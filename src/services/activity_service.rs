use crate::entities::{ActivityType, activity_entity as activities, user_entity as users};
use crate::error::AppResult;
use crate::models::{
    ActivityResponse, ActivityStatsQuery, ActivityTypeCount, RecentActivitiesQuery,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};
use serde_json::Value;

const DEFAULT_RECENT_LIMIT: u64 = 10;
const MAX_RECENT_LIMIT: u64 = 100;

/// 待写入的动态
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub activity_type: ActivityType,
    pub title: String,
    pub description: String,
    pub user_id: Option<i64>,
    pub metadata: Value,
}

impl NewActivity {
    pub fn new(
        activity_type: ActivityType,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            activity_type,
            title: title.into(),
            description: description.into(),
            user_id: None,
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Clone)]
pub struct ActivityService {
    pool: DatabaseConnection,
}

impl ActivityService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 写入一条动态 (可在事务中调用)
    pub async fn record<C: ConnectionTrait>(
        db: &C,
        activity: NewActivity,
    ) -> AppResult<activities::Model> {
        let model = activities::ActiveModel {
            title: Set(activity.title),
            activity_type: Set(activity.activity_type),
            description: Set(activity.description),
            user_id: Set(activity.user_id),
            metadata: Set(activity.metadata),
            timestamp: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Ok(model)
    }

    /// 记录动态; 失败只记日志, 不影响业务请求
    pub async fn track(&self, activity: NewActivity) {
        let title = activity.title.clone();
        if let Err(e) = Self::record(&self.pool, activity).await {
            log::warn!("Failed to track activity \"{title}\": {e}");
        }
    }

    pub async fn recent(&self, query: &RecentActivitiesQuery) -> AppResult<Vec<ActivityResponse>> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .clamp(1, MAX_RECENT_LIMIT);

        let mut select = activities::Entity::find();
        if let Some(activity_type) = query.activity_type {
            select = select.filter(activities::Column::ActivityType.eq(activity_type));
        }
        select = Self::within(select, query.start_date, query.end_date);

        let rows = select
            .find_also_related(users::Entity)
            .order_by_desc(activities::Column::Timestamp)
            .order_by_desc(activities::Column::Id)
            .limit(limit)
            .all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ActivityResponse::from).collect())
    }

    /// 按类型统计数量
    pub async fn stats(&self, query: &ActivityStatsQuery) -> AppResult<Vec<ActivityTypeCount>> {
        let select = Self::within(activities::Entity::find(), query.start_date, query.end_date);

        let counts = select
            .select_only()
            .column(activities::Column::ActivityType)
            .column_as(Expr::col(activities::Column::Id).count(), "count")
            .group_by(activities::Column::ActivityType)
            .order_by_asc(activities::Column::ActivityType)
            .into_model::<ActivityTypeCount>()
            .all(&self.pool)
            .await?;

        Ok(counts)
    }

    fn within(
        mut select: Select<activities::Entity>,
        start: Option<chrono::DateTime<Utc>>,
        end: Option<chrono::DateTime<Utc>>,
    ) -> Select<activities::Entity> {
        if let Some(start) = start {
            select = select.filter(activities::Column::Timestamp.gte(start));
        }
        if let Some(end) = end {
            select = select.filter(activities::Column::Timestamp.lte(end));
        }
        select
    }
}
