use crate::entities::{
    ActivityType, DrawStatus, TicketStatus, draw_entity as draws, ticket_entity as tickets,
    user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::{ReviewDecision, TicketDetailResponse, UpdateTicketStatusRequest};
use crate::services::auth_service::load_user;
use crate::services::{ActivityService, NewActivity};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde_json::json;
use std::collections::HashMap;

#[derive(Clone)]
pub struct TicketService {
    pool: DatabaseConnection,
    activity_service: ActivityService,
}

impl TicketService {
    pub fn new(pool: DatabaseConnection, activity_service: ActivityService) -> Self {
        Self {
            pool,
            activity_service,
        }
    }

    /// 当前用户的票 (最新在前)
    pub async fn my_tickets(&self, user_id: i64) -> AppResult<Vec<TicketDetailResponse>> {
        let user = load_user(&self.pool, user_id).await?;

        let rows = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(user_id))
            .find_also_related(draws::Entity)
            .order_by_desc(tickets::Column::PurchaseDate)
            .order_by_desc(tickets::Column::Id)
            .all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(ticket, draw)| TicketDetailResponse::new(ticket, draw, Some(user.clone())))
            .collect())
    }

    /// 票据详情: 仅持有人或管理员可见
    pub async fn ticket_detail(
        &self,
        ticket_id: i64,
        viewer_id: i64,
    ) -> AppResult<TicketDetailResponse> {
        let viewer = load_user(&self.pool, viewer_id).await?;

        let (ticket, draw) = tickets::Entity::find_by_id(ticket_id)
            .find_also_related(draws::Entity)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

        if ticket.user_id != viewer.id && !viewer.is_admin() {
            return Err(AppError::Forbidden(
                "Not authorized to view this ticket".to_string(),
            ));
        }

        let owner = if ticket.user_id == viewer.id {
            Some(viewer)
        } else {
            users::Entity::find_by_id(ticket.user_id).one(&self.pool).await?
        };

        Ok(TicketDetailResponse::new(ticket, draw, owner))
    }

    /// 待审核的票 (最新在前)
    pub async fn pending_tickets(&self) -> AppResult<Vec<TicketDetailResponse>> {
        let rows = tickets::Entity::find()
            .filter(tickets::Column::Status.eq(TicketStatus::Pending))
            .find_also_related(draws::Entity)
            .order_by_desc(tickets::Column::PurchaseDate)
            .order_by_desc(tickets::Column::Id)
            .all(&self.pool)
            .await?;

        let mut user_ids: Vec<i64> = rows.iter().map(|(t, _)| t.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let owners: HashMap<i64, users::Model> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(user_ids))
                .all(&self.pool)
                .await?
                .into_iter()
                .map(|u| (u.id, u))
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|(ticket, draw)| {
                let owner = owners.get(&ticket.user_id).cloned();
                TicketDetailResponse::new(ticket, draw, owner)
            })
            .collect())
    }

    /// 管理员审核: accepted -> active/completed, declined -> declined/failed
    pub async fn review_ticket(
        &self,
        ticket_id: i64,
        request: UpdateTicketStatusRequest,
        admin_id: i64,
    ) -> AppResult<TicketDetailResponse> {
        let (ticket, draw) = tickets::Entity::find_by_id(ticket_id)
            .find_also_related(draws::Entity)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

        // 已开奖的票不可再审核
        if matches!(ticket.status, TicketStatus::Won | TicketStatus::Lost) {
            return Err(AppError::ValidationError(
                "Ticket can no longer be reviewed".to_string(),
            ));
        }
        let draw_is_active = draw.as_ref().is_some_and(|d| d.status == DrawStatus::Active);
        if matches!(request.status, ReviewDecision::Accepted) && !draw_is_active {
            return Err(AppError::ValidationError(
                "Tickets can only be accepted for active draws".to_string(),
            ));
        }

        let (status, payment_status) = request.status.outcome();
        let note = request
            .admin_note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        // 以读取时的状态为条件, 期间被开奖关闭的票不会被改写
        let mut update = tickets::Entity::update_many()
            .col_expr(tickets::Column::Status, Expr::value(status))
            .col_expr(tickets::Column::PaymentStatus, Expr::value(payment_status))
            .col_expr(tickets::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(note) = note {
            update = update.col_expr(tickets::Column::AdminNote, Expr::value(note));
        }
        let updated = update
            .filter(tickets::Column::Id.eq(ticket_id))
            .filter(tickets::Column::Status.eq(ticket.status))
            .exec(&self.pool)
            .await?;
        if updated.rows_affected == 0 {
            return Err(AppError::ValidationError(
                "Ticket status changed during review".to_string(),
            ));
        }

        let ticket = tickets::Entity::find_by_id(ticket_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

        log::info!(
            "Ticket {ticket_id} reviewed by admin {admin_id}: {}",
            request.status
        );

        let draw_title = draw.as_ref().map(|d| d.title.clone()).unwrap_or_default();
        self.activity_service
            .track(
                NewActivity::new(
                    ActivityType::Ticket,
                    "Ticket Status Updated",
                    format!(
                        "Ticket status updated to {} for draw: {draw_title}",
                        request.status
                    ),
                )
                .user(admin_id)
                .metadata(json!({ "ticketId": ticket.id, "drawId": ticket.draw_id })),
            )
            .await;

        let owner = users::Entity::find_by_id(ticket.user_id).one(&self.pool).await?;
        Ok(TicketDetailResponse::new(ticket, draw, owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_test_pool;
    use crate::entities::{PaymentStatus, UserRole};
    use crate::services::DrawService;
    use crate::services::test_support::{DrawFixture, insert_draw, insert_ticket, insert_user};
    use chrono::Duration;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};

    fn service(pool: &DatabaseConnection) -> TicketService {
        TicketService::new(pool.clone(), ActivityService::new(pool.clone()))
    }

    #[actix_web::test]
    async fn test_my_tickets_newest_first_with_draw() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let user = insert_user(&pool, "jane@example.com", UserRole::User).await;
        let other = insert_user(&pool, "other@example.com", UserRole::User).await;
        let first = insert_draw(&pool, DrawFixture::open()).await;
        let second = insert_draw(&pool, DrawFixture::open()).await;

        let older = insert_ticket(&pool, user.id, first.id, TicketStatus::Active).await;
        let mut am = older.clone().into_active_model();
        am.purchase_date = Set(Utc::now() - Duration::hours(2));
        am.update(&pool).await.unwrap();
        let newer = insert_ticket(&pool, user.id, second.id, TicketStatus::Pending).await;
        insert_ticket(&pool, other.id, first.id, TicketStatus::Pending).await;

        let mine = svc.my_tickets(user.id).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].ticket.id, newer.id);
        assert_eq!(mine[1].ticket.id, older.id);
        let draw = mine[1].draw.as_ref().unwrap();
        assert_eq!(draw.id, first.id);
        assert_eq!(draw.price, 5.0);
    }

    #[actix_web::test]
    async fn test_ticket_detail_visibility() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let owner = insert_user(&pool, "owner@example.com", UserRole::User).await;
        let stranger = insert_user(&pool, "stranger@example.com", UserRole::User).await;
        let admin = insert_user(&pool, "admin@example.com", UserRole::Admin).await;
        let draw = insert_draw(&pool, DrawFixture::open()).await;
        let ticket = insert_ticket(&pool, owner.id, draw.id, TicketStatus::Pending).await;

        let detail = svc.ticket_detail(ticket.id, owner.id).await.unwrap();
        assert_eq!(detail.user.as_ref().unwrap().id, owner.id);

        let detail = svc.ticket_detail(ticket.id, admin.id).await.unwrap();
        assert_eq!(detail.user.as_ref().unwrap().email, "owner@example.com");

        assert!(matches!(
            svc.ticket_detail(ticket.id, stranger.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            svc.ticket_detail(9999, owner.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn test_review_moves_pending_tickets() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let admin = insert_user(&pool, "admin@example.com", UserRole::Admin).await;
        let a = insert_user(&pool, "a@example.com", UserRole::User).await;
        let b = insert_user(&pool, "b@example.com", UserRole::User).await;
        let draw = insert_draw(&pool, DrawFixture::open()).await;
        let accepted = insert_ticket(&pool, a.id, draw.id, TicketStatus::Pending).await;
        let declined = insert_ticket(&pool, b.id, draw.id, TicketStatus::Pending).await;

        assert_eq!(svc.pending_tickets().await.unwrap().len(), 2);

        let reviewed = svc
            .review_ticket(
                accepted.id,
                UpdateTicketStatusRequest {
                    status: ReviewDecision::Accepted,
                    admin_note: Some(" paid cash ".to_string()),
                },
                admin.id,
            )
            .await
            .unwrap();
        assert_eq!(reviewed.ticket.status, TicketStatus::Active);
        assert_eq!(reviewed.ticket.payment_status, PaymentStatus::Completed);
        assert_eq!(reviewed.ticket.admin_note.as_deref(), Some("paid cash"));

        let reviewed = svc
            .review_ticket(
                declined.id,
                UpdateTicketStatusRequest {
                    status: ReviewDecision::Declined,
                    admin_note: None,
                },
                admin.id,
            )
            .await
            .unwrap();
        assert_eq!(reviewed.ticket.status, TicketStatus::Declined);
        assert_eq!(reviewed.ticket.payment_status, PaymentStatus::Failed);

        assert!(svc.pending_tickets().await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_review_rejects_drawn_tickets() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let admin = insert_user(&pool, "admin@example.com", UserRole::Admin).await;
        let user = insert_user(&pool, "a@example.com", UserRole::User).await;
        let draw = insert_draw(&pool, DrawFixture::ended()).await;
        let won = insert_ticket(&pool, user.id, draw.id, TicketStatus::Won).await;

        let request = UpdateTicketStatusRequest {
            status: ReviewDecision::Declined,
            admin_note: None,
        };
        assert!(matches!(
            svc.review_ticket(won.id, request, admin.id).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[actix_web::test]
    async fn test_accepting_requires_active_draw() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let admin = insert_user(&pool, "admin@example.com", UserRole::Admin).await;
        let early = insert_user(&pool, "early@example.com", UserRole::User).await;
        let late = insert_user(&pool, "late@example.com", UserRole::User).await;
        let draw = insert_draw(&pool, DrawFixture::ended()).await;
        insert_ticket(&pool, early.id, draw.id, TicketStatus::Active).await;
        let pending = insert_ticket(&pool, late.id, draw.id, TicketStatus::Pending).await;

        let draws = DrawService::new(pool.clone(), ActivityService::new(pool.clone()));
        let mut rng = StdRng::seed_from_u64(9);
        draws.select_winner_with_rng(draw.id, &mut rng).await.unwrap();

        let accept = || UpdateTicketStatusRequest {
            status: ReviewDecision::Accepted,
            admin_note: None,
        };
        let err = svc.review_ticket(pending.id, accept(), admin.id).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == "Tickets can only be accepted for active draws"));

        let stored = tickets::Entity::find_by_id(pending.id)
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, TicketStatus::Declined);
        assert_eq!(stored.payment_status, PaymentStatus::Failed);

        // 已取消的抽奖: 只能拒绝
        let cancelled = insert_draw(
            &pool,
            DrawFixture {
                status: DrawStatus::Cancelled,
                ..DrawFixture::open()
            },
        )
        .await;
        let waiting = insert_ticket(&pool, late.id, cancelled.id, TicketStatus::Pending).await;
        assert!(matches!(
            svc.review_ticket(waiting.id, accept(), admin.id).await,
            Err(AppError::ValidationError(_))
        ));
        let declined = svc
            .review_ticket(
                waiting.id,
                UpdateTicketStatusRequest {
                    status: ReviewDecision::Declined,
                    admin_note: Some("draw cancelled".to_string()),
                },
                admin.id,
            )
            .await
            .unwrap();
        assert_eq!(declined.ticket.status, TicketStatus::Declined);
        assert_eq!(declined.ticket.admin_note.as_deref(), Some("draw cancelled"));
    }
}
