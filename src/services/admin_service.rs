use crate::entities::{
    ActivityType, DrawStatus, PaymentStatus, TicketStatus, draw_entity as draws,
    ticket_entity as tickets, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::external::CloudinaryService;
use crate::models::{
    AdminStats, AdminUpdateUserRequest, AdminUserResponse, PaginatedResponse, PaginationParams,
    RecentActivityItem, UploadImageResponse, UserResponse, cents_to_price,
};
use crate::services::auth_service::find_user_by_email;
use crate::services::{ActivityService, NewActivity};
use crate::utils::{normalize_email, validate_email};
use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};

pub const PRIZE_IMAGE_FOLDER: &str = "prize-images";
const GROWTH_WINDOW_DAYS: i64 = 30;
const RECENT_ACTIVITY_LIMIT: usize = 5;

/// 百分比, 保留两位小数; 分母为 0 时为 0
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone)]
pub struct AdminService {
    pool: DatabaseConnection,
    cloudinary: CloudinaryService,
    activity_service: ActivityService,
}

impl AdminService {
    pub fn new(
        pool: DatabaseConnection,
        cloudinary: CloudinaryService,
        activity_service: ActivityService,
    ) -> Self {
        Self {
            pool,
            cloudinary,
            activity_service,
        }
    }

    pub async fn upload_prize_image(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> AppResult<UploadImageResponse> {
        let uploaded = self
            .cloudinary
            .upload_image(bytes, content_type, PRIZE_IMAGE_FOLDER)
            .await?;
        Ok(UploadImageResponse {
            image_url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    /// 仪表盘统计
    pub async fn stats(&self) -> AppResult<AdminStats> {
        let since = Utc::now() - Duration::days(GROWTH_WINDOW_DAYS);

        let total_users = users::Entity::find().count(&self.pool).await?;
        let active_draws = draws::Entity::find()
            .filter(draws::Column::Status.eq(DrawStatus::Active))
            .count(&self.pool)
            .await?;
        let new_users: Vec<i64> = users::Entity::find()
            .select_only()
            .column(users::Column::Id)
            .filter(users::Column::CreatedAt.gte(since))
            .into_tuple()
            .all(&self.pool)
            .await?;
        let new_draws = draws::Entity::find()
            .filter(draws::Column::CreatedAt.gte(since))
            .count(&self.pool)
            .await?;
        let pending_tickets = tickets::Entity::find()
            .filter(tickets::Column::Status.eq(TicketStatus::Pending))
            .count(&self.pool)
            .await?;

        let ticket_holders: HashSet<i64> = tickets::Entity::find()
            .select_only()
            .column(tickets::Column::UserId)
            .distinct()
            .into_tuple::<i64>()
            .all(&self.pool)
            .await?
            .into_iter()
            .collect();
        let new_holders = new_users
            .iter()
            .filter(|id| ticket_holders.contains(id))
            .count() as u64;

        let conversion_rate = percentage(ticket_holders.len() as u64, total_users);
        let last_month_conversion = percentage(new_holders, new_users.len() as u64);

        Ok(AdminStats {
            total_users,
            active_draws,
            total_revenue: cents_to_price(self.revenue_cents().await?),
            user_growth: percentage(new_users.len() as u64, total_users),
            draw_growth: percentage(new_draws, active_draws),
            conversion_rate,
            conversion_rate_change: round2(conversion_rate - last_month_conversion),
            pending_tickets,
            recent_activity: self.recent_activity().await?,
        })
    }

    /// 已付款票据的票价合计 (美分)
    async fn revenue_cents(&self) -> AppResult<i64> {
        let per_draw: Vec<(i64, i64)> = tickets::Entity::find()
            .select_only()
            .column(tickets::Column::DrawId)
            .column_as(Expr::col(tickets::Column::Id).count(), "count")
            .filter(tickets::Column::PaymentStatus.eq(PaymentStatus::Completed))
            .group_by(tickets::Column::DrawId)
            .into_tuple()
            .all(&self.pool)
            .await?;
        if per_draw.is_empty() {
            return Ok(0);
        }

        let prices: HashMap<i64, i64> = draws::Entity::find()
            .filter(draws::Column::Id.is_in(per_draw.iter().map(|(id, _)| *id)))
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|d| (d.id, d.price_cents))
            .collect();

        Ok(per_draw
            .into_iter()
            .map(|(draw_id, count)| {
                prices
                    .get(&draw_id)
                    .copied()
                    .unwrap_or(0)
                    .saturating_mul(count)
            })
            .fold(0, i64::saturating_add))
    }

    /// 最近的注册与购票, 合并后取最新 5 条
    async fn recent_activity(&self) -> AppResult<Vec<RecentActivityItem>> {
        let limit = RECENT_ACTIVITY_LIMIT as u64;
        let joined = users::Entity::find()
            .order_by_desc(users::Column::CreatedAt)
            .order_by_desc(users::Column::Id)
            .limit(limit)
            .all(&self.pool)
            .await?;
        let purchases = tickets::Entity::find()
            .find_also_related(draws::Entity)
            .order_by_desc(tickets::Column::CreatedAt)
            .order_by_desc(tickets::Column::Id)
            .limit(limit)
            .all(&self.pool)
            .await?;

        let buyer_ids: Vec<i64> = purchases.iter().map(|(t, _)| t.user_id).collect();
        let buyers: HashMap<i64, String> = if buyer_ids.is_empty() {
            HashMap::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(buyer_ids))
                .all(&self.pool)
                .await?
                .into_iter()
                .map(|u| (u.id, u.name))
                .collect()
        };

        let mut items: Vec<RecentActivityItem> = joined
            .into_iter()
            .map(|u| RecentActivityItem {
                id: u.id,
                kind: "New User".to_string(),
                title: format!("{} joined", u.name),
                description: "New user registration".to_string(),
                timestamp: u.created_at,
            })
            .collect();

        items.extend(purchases.into_iter().map(|(ticket, draw)| {
            let buyer = buyers
                .get(&ticket.user_id)
                .cloned()
                .unwrap_or_else(|| "Unknown user".to_string());
            let draw_title = draw.map(|d| d.title).unwrap_or_default();
            RecentActivityItem {
                id: ticket.id,
                kind: "Ticket Purchase".to_string(),
                title: format!("{buyer} purchased a ticket"),
                description: format!("Ticket purchased for {draw_title}"),
                timestamp: ticket.created_at,
            }
        }));

        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items.truncate(RECENT_ACTIVITY_LIMIT);
        Ok(items)
    }

    /// 用户列表 (分页, 附带票数)
    pub async fn list_users(
        &self,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<AdminUserResponse>> {
        let total = users::Entity::find().count(&self.pool).await?;

        let page = users::Entity::find()
            .order_by_desc(users::Column::CreatedAt)
            .order_by_desc(users::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        let ids: Vec<i64> = page.iter().map(|u| u.id).collect();
        let counts: HashMap<i64, i64> = if ids.is_empty() {
            HashMap::new()
        } else {
            tickets::Entity::find()
                .select_only()
                .column(tickets::Column::UserId)
                .column_as(Expr::col(tickets::Column::Id).count(), "count")
                .filter(tickets::Column::UserId.is_in(ids))
                .group_by(tickets::Column::UserId)
                .into_tuple::<(i64, i64)>()
                .all(&self.pool)
                .await?
                .into_iter()
                .collect()
        };

        let data = page
            .into_iter()
            .map(|u| {
                let ticket_count = counts.get(&u.id).copied().unwrap_or(0).max(0) as u64;
                AdminUserResponse {
                    user: u.into(),
                    ticket_count,
                }
            })
            .collect();

        Ok(PaginatedResponse::new(data, params, total))
    }

    pub async fn update_user(
        &self,
        user_id: i64,
        request: AdminUpdateUserRequest,
        admin_id: i64,
    ) -> AppResult<UserResponse> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if user_id == admin_id && matches!(request.role, Some(role) if role != user.role) {
            return Err(AppError::ValidationError(
                "You cannot change your own role".to_string(),
            ));
        }

        let name = match request.name {
            Some(name) if name.trim().is_empty() => {
                return Err(AppError::ValidationError("Name is required".to_string()));
            }
            Some(name) => name.trim().to_string(),
            None => user.name.clone(),
        };
        let email = match request.email {
            Some(email) => {
                let email = normalize_email(&email);
                validate_email(&email)?;
                if email != user.email && find_user_by_email(&self.pool, &email).await?.is_some()
                {
                    return Err(AppError::ValidationError("Email already in use".to_string()));
                }
                email
            }
            None => user.email.clone(),
        };
        let role = request.role.unwrap_or(user.role);

        let mut am = user.into_active_model();
        am.name = Set(name);
        am.email = Set(email);
        am.role = Set(role);
        am.updated_at = Set(Utc::now());
        let user = am
            .update(&self.pool)
            .await
            .map_err(|e| AppError::on_unique_violation(e, "Email already in use"))?;

        self.activity_service
            .track(
                NewActivity::new(
                    ActivityType::User,
                    "User Updated",
                    format!("User updated by admin: {}", user.name),
                )
                .user(admin_id)
                .metadata(json!({ "targetUserId": user.id, "role": user.role.to_string() })),
            )
            .await;

        Ok(user.into())
    }

    /// 删除用户 (级联删除其票据)
    pub async fn delete_user(&self, user_id: i64, admin_id: i64) -> AppResult<()> {
        if user_id == admin_id {
            return Err(AppError::ValidationError(
                "You cannot delete your own account".to_string(),
            ));
        }

        let user = users::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        users::Entity::delete_by_id(user_id).exec(&self.pool).await?;
        log::info!("User {user_id} deleted by admin {admin_id}");

        self.activity_service
            .track(
                NewActivity::new(
                    ActivityType::User,
                    "User Deleted",
                    format!("User deleted: {}", user.name),
                )
                .user(admin_id)
                .metadata(json!({ "targetUserId": user_id, "email": user.email })),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CloudinaryConfig;
    use crate::database::create_test_pool;
    use crate::entities::UserRole;
    use crate::services::test_support::{DrawFixture, insert_draw, insert_ticket, insert_user};

    fn service(pool: &DatabaseConnection) -> AdminService {
        AdminService::new(
            pool.clone(),
            CloudinaryService::new(CloudinaryConfig::default()),
            ActivityService::new(pool.clone()),
        )
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 2), 100.0);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[actix_web::test]
    async fn test_stats() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let a = insert_user(&pool, "a@example.com", UserRole::User).await;
        let b = insert_user(&pool, "b@example.com", UserRole::User).await;
        insert_user(&pool, "c@example.com", UserRole::User).await;
        insert_user(&pool, "admin@example.com", UserRole::Admin).await;
        let draw = insert_draw(&pool, DrawFixture::open()).await;
        insert_draw(&pool, DrawFixture::open()).await;
        insert_ticket(&pool, a.id, draw.id, TicketStatus::Active).await;
        insert_ticket(&pool, b.id, draw.id, TicketStatus::Pending).await;

        let stats = svc.stats().await.unwrap();
        assert_eq!(stats.total_users, 4);
        assert_eq!(stats.active_draws, 2);
        // 仅已付款的票计入收入
        assert_eq!(stats.total_revenue, 5.0);
        assert_eq!(stats.user_growth, 100.0);
        assert_eq!(stats.draw_growth, 100.0);
        assert_eq!(stats.conversion_rate, 50.0);
        assert_eq!(stats.conversion_rate_change, 0.0);
        assert_eq!(stats.pending_tickets, 1);
        assert_eq!(stats.recent_activity.len(), 5);
        assert!(
            stats
                .recent_activity
                .windows(2)
                .all(|w| w[0].timestamp >= w[1].timestamp)
        );
    }

    #[actix_web::test]
    async fn test_revenue_saturates_on_huge_prices() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let a = insert_user(&pool, "a@example.com", UserRole::User).await;
        let b = insert_user(&pool, "b@example.com", UserRole::User).await;
        // 早于票价上限写入的数据
        let draw = insert_draw(
            &pool,
            DrawFixture {
                price_cents: i64::MAX,
                ..DrawFixture::open()
            },
        )
        .await;
        insert_ticket(&pool, a.id, draw.id, TicketStatus::Active).await;
        insert_ticket(&pool, b.id, draw.id, TicketStatus::Active).await;

        assert_eq!(svc.revenue_cents().await.unwrap(), i64::MAX);
    }

    #[actix_web::test]
    async fn test_list_users_paginates_with_ticket_counts() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let a = insert_user(&pool, "a@example.com", UserRole::User).await;
        insert_user(&pool, "b@example.com", UserRole::User).await;
        insert_user(&pool, "c@example.com", UserRole::User).await;
        let draw = insert_draw(&pool, DrawFixture::open()).await;
        insert_ticket(&pool, a.id, draw.id, TicketStatus::Active).await;

        let page = svc
            .list_users(&PaginationParams::new(Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 2);

        let page = svc
            .list_users(&PaginationParams::new(Some(2), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].user.id, a.id);
        assert_eq!(page.data[0].ticket_count, 1);

        let page = svc
            .list_users(&PaginationParams::new(Some(u64::MAX), None))
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.page, u64::MAX);
    }

    #[actix_web::test]
    async fn test_update_user() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let admin = insert_user(&pool, "admin@example.com", UserRole::Admin).await;
        let user = insert_user(&pool, "jane@example.com", UserRole::User).await;

        let updated = svc
            .update_user(
                user.id,
                AdminUpdateUserRequest {
                    role: Some(UserRole::Admin),
                    ..Default::default()
                },
                admin.id,
            )
            .await
            .unwrap();
        assert_eq!(updated.role, UserRole::Admin);

        let err = svc
            .update_user(
                user.id,
                AdminUpdateUserRequest {
                    email: Some("admin@example.com".to_string()),
                    ..Default::default()
                },
                admin.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        assert!(matches!(
            svc.update_user(9999, AdminUpdateUserRequest::default(), admin.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.update_user(
                admin.id,
                AdminUpdateUserRequest {
                    role: Some(UserRole::User),
                    ..Default::default()
                },
                admin.id
            )
            .await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[actix_web::test]
    async fn test_delete_user_cascades_tickets() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let admin = insert_user(&pool, "admin@example.com", UserRole::Admin).await;
        let user = insert_user(&pool, "jane@example.com", UserRole::User).await;
        let draw = insert_draw(&pool, DrawFixture::open()).await;
        insert_ticket(&pool, user.id, draw.id, TicketStatus::Active).await;

        assert!(matches!(
            svc.delete_user(admin.id, admin.id).await,
            Err(AppError::ValidationError(_))
        ));
        svc.delete_user(user.id, admin.id).await.unwrap();
        assert_eq!(tickets::Entity::find().count(&pool).await.unwrap(), 0);
        assert!(matches!(
            svc.delete_user(user.id, admin.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
