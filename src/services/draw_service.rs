use crate::entities::{
    ActivityType, DrawStatus, PaymentStatus, TicketStatus, draw_entity as draws,
    ticket_entity as tickets, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateDrawRequest, DrawListItem, DrawResponse, EnterDrawResponse, TicketDetailResponse,
    ToggleDrawStatusResponse, UpdateDrawRequest, UserSummary, WinnerResponse, price_to_cents,
};
use crate::services::auth_service::load_user;
use crate::services::{ActivityService, NewActivity};
use crate::utils::generate_unique_ticket_number;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::json;
use std::collections::HashMap;

pub const ALREADY_ENTERED: &str = "You have already entered this draw";
/// 票价上限 1,000,000.00
pub const MAX_PRICE_CENTS: i64 = 100_000_000;
const CLOSED_BEFORE_REVIEW: &str = "Draw closed before review";

/// 从有效票中均匀随机选出中奖票
pub fn pick_winner<'a, R: Rng + ?Sized>(
    candidates: &'a [tickets::Model],
    rng: &mut R,
) -> Option<&'a tickets::Model> {
    candidates.choose(rng)
}

/// 新建/修改抽奖时的字段校验
struct DrawFields {
    title: String,
    prize: String,
    price_cents: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    max_tickets: Option<i32>,
    status: DrawStatus,
}

impl DrawFields {
    fn validate(&self) -> AppResult<()> {
        if self.title.is_empty() {
            return Err(AppError::ValidationError("Title is required".to_string()));
        }
        if self.prize.is_empty() {
            return Err(AppError::ValidationError("Prize is required".to_string()));
        }
        if self.price_cents <= 0 {
            return Err(AppError::ValidationError(
                "Price must be greater than 0".to_string(),
            ));
        }
        if self.price_cents > MAX_PRICE_CENTS {
            return Err(AppError::ValidationError(
                "Price must not exceed 1000000".to_string(),
            ));
        }
        if self.end_date <= self.start_date {
            return Err(AppError::ValidationError(
                "End date must be after start date".to_string(),
            ));
        }
        if matches!(self.max_tickets, Some(n) if n <= 0) {
            return Err(AppError::ValidationError(
                "Max tickets must be greater than 0".to_string(),
            ));
        }
        // completed 只能通过开奖产生
        if self.status == DrawStatus::Completed {
            return Err(AppError::ValidationError(
                "A draw is completed by selecting a winner".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_price(price: f64) -> AppResult<i64> {
    price_to_cents(price)
        .ok_or_else(|| AppError::ValidationError("Price must be greater than 0".to_string()))
}

#[derive(Clone)]
pub struct DrawService {
    pool: DatabaseConnection,
    activity_service: ActivityService,
}

impl DrawService {
    pub fn new(pool: DatabaseConnection, activity_service: ActivityService) -> Self {
        Self {
            pool,
            activity_service,
        }
    }

    /// 进行中的抽奖 (新建在前), 登录用户附带自己的参与情况
    pub async fn list_active(&self, viewer_id: Option<i64>) -> AppResult<Vec<DrawListItem>> {
        let now = Utc::now();
        let list = draws::Entity::find()
            .filter(draws::Column::Status.eq(DrawStatus::Active))
            .filter(draws::Column::EndDate.gt(now))
            .order_by_desc(draws::Column::CreatedAt)
            .order_by_desc(draws::Column::Id)
            .all(&self.pool)
            .await?;

        let mut entries: HashMap<i64, tickets::Model> = HashMap::new();
        if let Some(user_id) = viewer_id {
            if !list.is_empty() {
                let ids: Vec<i64> = list.iter().map(|d| d.id).collect();
                entries = tickets::Entity::find()
                    .filter(tickets::Column::UserId.eq(user_id))
                    .filter(tickets::Column::DrawId.is_in(ids))
                    .all(&self.pool)
                    .await?
                    .into_iter()
                    .map(|t| (t.draw_id, t))
                    .collect();
            }
        }

        Ok(list
            .into_iter()
            .map(|draw| {
                let entry = entries.remove(&draw.id);
                DrawListItem {
                    draw: draw.into(),
                    has_entered: entry.is_some(),
                    ticket_status: entry.as_ref().map(|t| t.status),
                    ticket_id: entry.as_ref().map(|t| t.id),
                    ticket_number: entry.map(|t| t.number),
                }
            })
            .collect())
    }

    pub async fn get_draw(&self, draw_id: i64) -> AppResult<DrawResponse> {
        let draw = find_draw(&self.pool, draw_id).await?;
        let count = sold_ticket_count(&self.pool, draw_id).await?;
        Ok(DrawResponse::from(draw).with_ticket_count(count))
    }

    /// 管理端: 全部抽奖 (新建在前) 附带票数
    pub async fn list_all(&self) -> AppResult<Vec<DrawResponse>> {
        let list = draws::Entity::find()
            .order_by_desc(draws::Column::CreatedAt)
            .order_by_desc(draws::Column::Id)
            .all(&self.pool)
            .await?;

        let ids: Vec<i64> = list.iter().map(|d| d.id).collect();
        let counts = sold_ticket_counts(&self.pool, ids).await?;

        Ok(list
            .into_iter()
            .map(|d| {
                let count = counts.get(&d.id).copied().unwrap_or(0);
                DrawResponse::from(d).with_ticket_count(count)
            })
            .collect())
    }

    pub async fn create_draw(
        &self,
        request: CreateDrawRequest,
        admin_id: i64,
    ) -> AppResult<DrawResponse> {
        let now = Utc::now();
        let fields = DrawFields {
            title: request.title.trim().to_string(),
            prize: request.prize.trim().to_string(),
            price_cents: parse_price(request.price)?,
            start_date: request.start_date.unwrap_or(now),
            end_date: request.end_date,
            max_tickets: request.max_tickets,
            status: request.status.unwrap_or(DrawStatus::Active),
        };
        fields.validate()?;

        let draw = draws::ActiveModel {
            title: Set(fields.title),
            prize: Set(fields.prize),
            price_cents: Set(fields.price_cents),
            image: Set(request.image.filter(|s| !s.trim().is_empty())),
            start_date: Set(fields.start_date),
            end_date: Set(fields.end_date),
            max_tickets: Set(fields.max_tickets),
            status: Set(fields.status),
            winner_id: Set(None),
            winning_ticket_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!("Draw created: {} by admin {admin_id}", draw.id);
        self.activity_service
            .track(
                NewActivity::new(
                    ActivityType::Draw,
                    "Draw Created",
                    format!("New draw created: {}", draw.title),
                )
                .user(admin_id)
                .metadata(json!({ "drawId": draw.id, "prize": draw.prize })),
            )
            .await;

        Ok(DrawResponse::from(draw).with_ticket_count(0))
    }

    pub async fn update_draw(
        &self,
        draw_id: i64,
        request: UpdateDrawRequest,
        admin_id: i64,
    ) -> AppResult<DrawResponse> {
        let draw = find_draw(&self.pool, draw_id).await?;
        if draw.status == DrawStatus::Completed {
            return Err(AppError::ValidationError(
                "Completed draws cannot be edited".to_string(),
            ));
        }

        let price_cents = match request.price {
            Some(price) => parse_price(price)?,
            None => draw.price_cents,
        };

        let fields = DrawFields {
            title: request
                .title
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| draw.title.clone()),
            prize: request
                .prize
                .map(|p| p.trim().to_string())
                .unwrap_or_else(|| draw.prize.clone()),
            price_cents,
            start_date: request.start_date.unwrap_or(draw.start_date),
            end_date: request.end_date.unwrap_or(draw.end_date),
            max_tickets: request.max_tickets.unwrap_or(draw.max_tickets),
            status: request.status.unwrap_or(draw.status),
        };
        fields.validate()?;

        let image = match request.image {
            Some(image) if !image.trim().is_empty() => Some(image),
            _ => draw.image.clone(),
        };

        let mut am = draw.into_active_model();
        am.title = Set(fields.title);
        am.prize = Set(fields.prize);
        am.price_cents = Set(fields.price_cents);
        am.start_date = Set(fields.start_date);
        am.end_date = Set(fields.end_date);
        am.max_tickets = Set(fields.max_tickets);
        am.status = Set(fields.status);
        am.image = Set(image);
        am.updated_at = Set(Utc::now());
        let draw = am.update(&self.pool).await?;

        self.activity_service
            .track(
                NewActivity::new(
                    ActivityType::Draw,
                    "Draw Updated",
                    format!("Draw updated: {}", draw.title),
                )
                .user(admin_id)
                .metadata(json!({ "drawId": draw.id })),
            )
            .await;

        let count = sold_ticket_count(&self.pool, draw.id).await?;
        Ok(DrawResponse::from(draw).with_ticket_count(count))
    }

    pub async fn delete_draw(&self, draw_id: i64, admin_id: i64) -> AppResult<()> {
        let draw = find_draw(&self.pool, draw_id).await?;

        let ticket_count = tickets::Entity::find()
            .filter(tickets::Column::DrawId.eq(draw_id))
            .count(&self.pool)
            .await?;
        if ticket_count > 0 {
            return Err(AppError::ValidationError(
                "Cannot delete draw with sold tickets".to_string(),
            ));
        }

        draws::Entity::delete_by_id(draw_id).exec(&self.pool).await?;
        log::info!("Draw deleted: {draw_id} by admin {admin_id}");

        self.activity_service
            .track(
                NewActivity::new(
                    ActivityType::Draw,
                    "Draw Deleted",
                    format!("Draw deleted: {}", draw.title),
                )
                .user(admin_id)
                .metadata(json!({ "drawId": draw_id })),
            )
            .await;
        Ok(())
    }

    /// active <-> cancelled
    pub async fn toggle_status(
        &self,
        draw_id: i64,
        admin_id: i64,
    ) -> AppResult<ToggleDrawStatusResponse> {
        let draw = find_draw(&self.pool, draw_id).await?;
        let next = match draw.status {
            DrawStatus::Active => DrawStatus::Cancelled,
            DrawStatus::Cancelled => DrawStatus::Active,
            DrawStatus::Completed => {
                return Err(AppError::ValidationError(
                    "Completed draws cannot change status".to_string(),
                ));
            }
        };

        let title = draw.title.clone();
        let mut am = draw.into_active_model();
        am.status = Set(next);
        am.updated_at = Set(Utc::now());
        let draw = am.update(&self.pool).await?;

        self.activity_service
            .track(
                NewActivity::new(
                    ActivityType::Draw,
                    "Draw Status Changed",
                    format!("Draw {title} is now {next}"),
                )
                .user(admin_id)
                .metadata(json!({ "drawId": draw.id, "status": next.to_string() })),
            )
            .await;

        Ok(ToggleDrawStatusResponse {
            id: draw.id,
            status: draw.status,
        })
    }

    /// 参与抽奖: 每个用户每个抽奖一张票, 新票待审核
    pub async fn enter_draw(&self, user_id: i64, draw_id: i64) -> AppResult<EnterDrawResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let user = load_user(&txn, user_id).await?;
        let draw = find_draw(&txn, draw_id).await?;

        if draw.status != DrawStatus::Active {
            return Err(AppError::ValidationError(
                "This draw is not currently active".to_string(),
            ));
        }
        if now < draw.start_date {
            return Err(AppError::ValidationError(
                "This draw has not started yet".to_string(),
            ));
        }
        if draw.has_ended_at(now) {
            return Err(AppError::ValidationError("This draw has ended".to_string()));
        }

        let existing = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(user_id))
            .filter(tickets::Column::DrawId.eq(draw_id))
            .count(&txn)
            .await?;
        if existing > 0 {
            return Err(AppError::ValidationError(ALREADY_ENTERED.to_string()));
        }

        if let Some(max) = draw.max_tickets {
            let sold = sold_ticket_count(&txn, draw_id).await?;
            if sold >= max as u64 {
                return Err(AppError::ValidationError(
                    "This draw is sold out".to_string(),
                ));
            }
        }

        let number = generate_unique_ticket_number(&txn, draw_id).await?;
        // 并发重复参与由 (user_id, draw_id) 唯一索引拦截
        let ticket = tickets::ActiveModel {
            number: Set(number),
            user_id: Set(user_id),
            draw_id: Set(draw_id),
            purchase_date: Set(now),
            status: Set(TicketStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            admin_note: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| AppError::on_unique_violation(e, ALREADY_ENTERED))?;

        txn.commit().await?;

        log::info!("User {user_id} entered draw {draw_id} with ticket {}", ticket.id);
        self.activity_service
            .track(
                NewActivity::new(
                    ActivityType::Ticket,
                    "Ticket Purchased",
                    format!("Ticket purchased for draw: {}", draw.title),
                )
                .user(user_id)
                .metadata(json!({ "drawId": draw_id, "ticketId": ticket.id })),
            )
            .await;

        let ticket_status = ticket.status;
        let draw_status = draw.status;
        Ok(EnterDrawResponse {
            ticket: TicketDetailResponse::new(ticket, Some(draw), Some(user)),
            has_entered: true,
            ticket_status,
            draw_status,
        })
    }

    pub async fn select_winner(&self, draw_id: i64, admin_id: i64) -> AppResult<WinnerResponse> {
        let mut rng = StdRng::from_entropy();
        let result = self.select_winner_with_rng(draw_id, &mut rng).await?;

        self.activity_service
            .track(
                NewActivity::new(
                    ActivityType::Draw,
                    "Winner Selected",
                    format!(
                        "{} won draw: {}",
                        result.winner.name, result.draw.title
                    ),
                )
                .user(admin_id)
                .metadata(json!({
                    "drawId": draw_id,
                    "winnerId": result.winner.id,
                    "ticketId": result.ticket.ticket.id,
                })),
            )
            .await;

        Ok(result)
    }

    /// 开奖: 一个事务内完成中奖票 won, 其余有效票 lost, 待审核票 declined, 抽奖 completed
    pub async fn select_winner_with_rng<R: Rng + Send>(
        &self,
        draw_id: i64,
        rng: &mut R,
    ) -> AppResult<WinnerResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let draw = find_draw(&txn, draw_id).await?;
        if draw.status != DrawStatus::Active {
            return Err(AppError::ValidationError("Draw is not active".to_string()));
        }
        if !draw.has_ended_at(now) {
            return Err(AppError::ValidationError(
                "Draw cannot be completed yet".to_string(),
            ));
        }

        // 以 status = active 为条件抢占, 同一抽奖只有一次开奖能通过
        if !complete_if_active(&txn, draw_id, now).await? {
            return Err(AppError::ValidationError("Draw is not active".to_string()));
        }

        let candidates = tickets::Entity::find()
            .filter(tickets::Column::DrawId.eq(draw_id))
            .filter(tickets::Column::Status.eq(TicketStatus::Active))
            .order_by_asc(tickets::Column::Id)
            .all(&txn)
            .await?;

        let winning_id = pick_winner(&candidates, rng)
            .map(|t| t.id)
            .ok_or_else(|| {
                AppError::ValidationError("No active tickets for this draw".to_string())
            })?;

        let won = tickets::Entity::update_many()
            .col_expr(tickets::Column::Status, Expr::value(TicketStatus::Won))
            .col_expr(tickets::Column::UpdatedAt, Expr::value(now))
            .filter(tickets::Column::Id.eq(winning_id))
            .filter(tickets::Column::Status.eq(TicketStatus::Active))
            .exec(&txn)
            .await?;
        if won.rows_affected == 0 {
            return Err(AppError::ValidationError(
                "Winning ticket is no longer active".to_string(),
            ));
        }

        tickets::Entity::update_many()
            .col_expr(tickets::Column::Status, Expr::value(TicketStatus::Lost))
            .col_expr(tickets::Column::UpdatedAt, Expr::value(now))
            .filter(tickets::Column::DrawId.eq(draw_id))
            .filter(tickets::Column::Status.eq(TicketStatus::Active))
            .filter(tickets::Column::Id.ne(winning_id))
            .exec(&txn)
            .await?;
        decline_pending_tickets(&txn, draw_id, now).await?;

        let ticket = tickets::Entity::find_by_id(winning_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

        let mut draw_am = draw.into_active_model();
        draw_am.status = Set(DrawStatus::Completed);
        draw_am.winner_id = Set(Some(ticket.user_id));
        draw_am.winning_ticket_id = Set(Some(ticket.id));
        draw_am.updated_at = Set(now);
        let draw = draw_am.update(&txn).await?;

        let winner = users::Entity::find_by_id(ticket.user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Winner not found".to_string()))?;

        txn.commit().await?;

        log::info!(
            "Draw {draw_id} completed, winning ticket {} of user {}",
            ticket.id,
            winner.id
        );

        Ok(WinnerResponse {
            winner: UserSummary::from(winner.clone()),
            ticket: TicketDetailResponse::new(ticket, Some(draw.clone()), Some(winner)),
            draw: draw.into(),
        })
    }

    /// 定时任务: 结束已过期的进行中抽奖; 返回处理的数量
    pub async fn finalize_expired_draws(&self) -> AppResult<usize> {
        let now = Utc::now();
        let expired = draws::Entity::find()
            .filter(draws::Column::Status.eq(DrawStatus::Active))
            .filter(draws::Column::EndDate.lte(now))
            .order_by_asc(draws::Column::EndDate)
            .all(&self.pool)
            .await?;

        let mut finalized = 0;
        for draw in expired {
            match self.finalize_draw(&draw).await {
                Ok(()) => finalized += 1,
                Err(e) => log::error!("Failed to finalize draw {}: {e}", draw.id),
            }
        }
        Ok(finalized)
    }

    async fn finalize_draw(&self, draw: &draws::Model) -> AppResult<()> {
        let active = tickets::Entity::find()
            .filter(tickets::Column::DrawId.eq(draw.id))
            .filter(tickets::Column::Status.eq(TicketStatus::Active))
            .count(&self.pool)
            .await?;

        if active > 0 {
            let mut rng = StdRng::from_entropy();
            let result = self.select_winner_with_rng(draw.id, &mut rng).await?;
            self.activity_service
                .track(
                    NewActivity::new(
                        ActivityType::Draw,
                        "Winner Selected",
                        format!("{} won draw: {}", result.winner.name, draw.title),
                    )
                    .metadata(json!({
                        "drawId": draw.id,
                        "winnerId": result.winner.id,
                        "automatic": true,
                    })),
                )
                .await;
            return Ok(());
        }

        // 无有效票: 直接结束, 不产生中奖者
        let now = Utc::now();
        let txn = self.pool.begin().await?;
        let closed = complete_if_active(&txn, draw.id, now).await?;
        if closed {
            decline_pending_tickets(&txn, draw.id, now).await?;
        }
        txn.commit().await?;

        if closed {
            log::info!("Draw {} ended without active tickets", draw.id);
            self.activity_service
                .track(
                    NewActivity::new(
                        ActivityType::Draw,
                        "Draw Closed",
                        format!("Draw ended without a winner: {}", draw.title),
                    )
                    .metadata(json!({ "drawId": draw.id, "automatic": true })),
                )
                .await;
        }
        Ok(())
    }
}

pub(crate) async fn find_draw<C: ConnectionTrait>(db: &C, draw_id: i64) -> AppResult<draws::Model> {
    draws::Entity::find_by_id(draw_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Draw not found".to_string()))
}

/// active -> completed; 返回是否由本次调用完成
async fn complete_if_active<C: ConnectionTrait>(
    db: &C,
    draw_id: i64,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let updated = draws::Entity::update_many()
        .col_expr(draws::Column::Status, Expr::value(DrawStatus::Completed))
        .col_expr(draws::Column::UpdatedAt, Expr::value(now))
        .filter(draws::Column::Id.eq(draw_id))
        .filter(draws::Column::Status.eq(DrawStatus::Active))
        .exec(db)
        .await?;
    Ok(updated.rows_affected > 0)
}

/// 抽奖结束时仍待审核的票一律拒绝
async fn decline_pending_tickets<C: ConnectionTrait>(
    db: &C,
    draw_id: i64,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    let updated = tickets::Entity::update_many()
        .col_expr(tickets::Column::Status, Expr::value(TicketStatus::Declined))
        .col_expr(
            tickets::Column::PaymentStatus,
            Expr::value(PaymentStatus::Failed),
        )
        .col_expr(
            tickets::Column::AdminNote,
            Expr::value(CLOSED_BEFORE_REVIEW),
        )
        .col_expr(tickets::Column::UpdatedAt, Expr::value(now))
        .filter(tickets::Column::DrawId.eq(draw_id))
        .filter(tickets::Column::Status.eq(TicketStatus::Pending))
        .exec(db)
        .await?;
    if updated.rows_affected > 0 {
        log::info!(
            "Declined {} pending tickets of closed draw {draw_id}",
            updated.rows_affected
        );
    }
    Ok(updated.rows_affected)
}

/// 已售票数 (不含被拒绝的票)
async fn sold_ticket_count<C: ConnectionTrait>(db: &C, draw_id: i64) -> AppResult<u64> {
    Ok(tickets::Entity::find()
        .filter(tickets::Column::DrawId.eq(draw_id))
        .filter(tickets::Column::Status.ne(TicketStatus::Declined))
        .count(db)
        .await?)
}

async fn sold_ticket_counts<C: ConnectionTrait>(
    db: &C,
    draw_ids: Vec<i64>,
) -> AppResult<HashMap<i64, u64>> {
    if draw_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(i64, i64)> = tickets::Entity::find()
        .select_only()
        .column(tickets::Column::DrawId)
        .column_as(Expr::col(tickets::Column::Id).count(), "count")
        .filter(tickets::Column::DrawId.is_in(draw_ids))
        .filter(tickets::Column::Status.ne(TicketStatus::Declined))
        .group_by(tickets::Column::DrawId)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(draw_id, count)| (draw_id, count.max(0) as u64))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_test_pool;
    use crate::entities::UserRole;
    use crate::services::test_support::{DrawFixture, insert_draw, insert_ticket, insert_user};
    use chrono::Duration;

    fn service(pool: &DatabaseConnection) -> DrawService {
        DrawService::new(pool.clone(), ActivityService::new(pool.clone()))
    }

    #[test]
    fn test_pick_winner_is_uniform_over_candidates() {
        let now = Utc::now();
        let candidates: Vec<tickets::Model> = (1..=3)
            .map(|id| tickets::Model {
                id,
                number: format!("T{id}"),
                user_id: id,
                draw_id: 1,
                purchase_date: now,
                status: TicketStatus::Active,
                payment_status: PaymentStatus::Completed,
                admin_note: None,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(42);
        let mut hits = HashMap::new();
        for _ in 0..3000 {
            let winner = pick_winner(&candidates, &mut rng).unwrap();
            *hits.entry(winner.id).or_insert(0) += 1;
        }
        assert_eq!(hits.len(), 3);
        assert!(hits.values().all(|&n| n > 800));

        assert!(pick_winner(&[], &mut rng).is_none());
    }

    #[actix_web::test]
    async fn test_enter_draw_creates_one_pending_ticket() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let user = insert_user(&pool, "jane@example.com", UserRole::User).await;
        let draw = insert_draw(&pool, DrawFixture::open()).await;

        let entered = draws.enter_draw(user.id, draw.id).await.unwrap();
        assert!(entered.has_entered);
        assert_eq!(entered.ticket_status, TicketStatus::Pending);
        assert_eq!(entered.draw_status, DrawStatus::Active);
        assert_eq!(entered.ticket.ticket.payment_status, PaymentStatus::Pending);
        assert_eq!(entered.ticket.ticket.number.len(), 8);

        let rows = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(user.id))
            .count(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[actix_web::test]
    async fn test_entering_twice_is_rejected() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let user = insert_user(&pool, "jane@example.com", UserRole::User).await;
        let draw = insert_draw(&pool, DrawFixture::open()).await;

        draws.enter_draw(user.id, draw.id).await.unwrap();
        let err = draws.enter_draw(user.id, draw.id).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == ALREADY_ENTERED));

        let rows = tickets::Entity::find().count(&pool).await.unwrap();
        assert_eq!(rows, 1);
    }

    #[actix_web::test]
    async fn test_closed_draws_refuse_entries() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let user = insert_user(&pool, "jane@example.com", UserRole::User).await;

        let cancelled = insert_draw(
            &pool,
            DrawFixture {
                status: DrawStatus::Cancelled,
                ..DrawFixture::open()
            },
        )
        .await;
        let ended = insert_draw(&pool, DrawFixture::ended()).await;
        let upcoming = insert_draw(
            &pool,
            DrawFixture {
                start_date: Utc::now() + Duration::days(1),
                end_date: Utc::now() + Duration::days(2),
                ..DrawFixture::open()
            },
        )
        .await;

        for draw_id in [cancelled.id, ended.id, upcoming.id] {
            assert!(matches!(
                draws.enter_draw(user.id, draw_id).await,
                Err(AppError::ValidationError(_))
            ));
        }
        assert!(matches!(
            draws.enter_draw(user.id, 9999).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(tickets::Entity::find().count(&pool).await.unwrap(), 0);
    }

    #[actix_web::test]
    async fn test_sold_out_draw_refuses_entries() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let first = insert_user(&pool, "a@example.com", UserRole::User).await;
        let second = insert_user(&pool, "b@example.com", UserRole::User).await;
        let third = insert_user(&pool, "c@example.com", UserRole::User).await;
        let draw = insert_draw(
            &pool,
            DrawFixture {
                max_tickets: Some(1),
                ..DrawFixture::open()
            },
        )
        .await;

        draws.enter_draw(first.id, draw.id).await.unwrap();
        let err = draws.enter_draw(second.id, draw.id).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == "This draw is sold out"));

        // 被拒绝的票不占名额
        tickets::Entity::update_many()
            .col_expr(tickets::Column::Status, Expr::value(TicketStatus::Declined))
            .exec(&pool)
            .await
            .unwrap();
        assert!(draws.enter_draw(third.id, draw.id).await.is_ok());
    }

    #[actix_web::test]
    async fn test_list_active_annotates_viewer_entries() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let user = insert_user(&pool, "jane@example.com", UserRole::User).await;
        let entered = insert_draw(&pool, DrawFixture::open()).await;
        let other = insert_draw(&pool, DrawFixture::open()).await;
        insert_draw(&pool, DrawFixture::ended()).await;
        let ticket = insert_ticket(&pool, user.id, entered.id, TicketStatus::Pending).await;

        let anonymous = draws.list_active(None).await.unwrap();
        assert_eq!(anonymous.len(), 2);
        assert!(anonymous.iter().all(|d| !d.has_entered && d.ticket_id.is_none()));

        let listed = draws.list_active(Some(user.id)).await.unwrap();
        // 新建在前
        assert_eq!(listed[0].draw.id, other.id);
        assert!(!listed[0].has_entered);
        assert_eq!(listed[1].draw.id, entered.id);
        assert!(listed[1].has_entered);
        assert_eq!(listed[1].ticket_id, Some(ticket.id));
        assert_eq!(listed[1].ticket_status, Some(TicketStatus::Pending));
        assert_eq!(listed[1].ticket_number.as_deref(), Some(ticket.number.as_str()));
    }

    #[actix_web::test]
    async fn test_create_and_update_validate_fields() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let admin = insert_user(&pool, "admin@example.com", UserRole::Admin).await;
        let end = Utc::now() + Duration::days(3);

        let created = draws
            .create_draw(
                CreateDrawRequest {
                    title: " Summer ".to_string(),
                    prize: "Bike".to_string(),
                    price: 2.5,
                    start_date: None,
                    end_date: end,
                    max_tickets: Some(100),
                    image: None,
                    status: None,
                },
                admin.id,
            )
            .await
            .unwrap();
        assert_eq!(created.title, "Summer");
        assert_eq!(created.price, 2.5);
        assert_eq!(created.status, DrawStatus::Active);
        assert_eq!(created.ticket_count, Some(0));

        let bad = CreateDrawRequest {
            title: "Bad".to_string(),
            prize: "Bike".to_string(),
            price: 0.0,
            start_date: None,
            end_date: end,
            max_tickets: None,
            image: None,
            status: None,
        };
        assert!(matches!(
            draws.create_draw(bad, admin.id).await,
            Err(AppError::ValidationError(_))
        ));

        let updated = draws
            .update_draw(
                created.id,
                UpdateDrawRequest {
                    price: Some(3.0),
                    ..Default::default()
                },
                admin.id,
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 3.0);
        assert_eq!(updated.title, "Summer");

        let err = draws
            .update_draw(
                created.id,
                UpdateDrawRequest {
                    end_date: Some(Utc::now() - Duration::days(30)),
                    ..Default::default()
                },
                admin.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[actix_web::test]
    async fn test_price_has_upper_bound() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let admin = insert_user(&pool, "admin@example.com", UserRole::Admin).await;
        let request = |price: f64| CreateDrawRequest {
            title: "Jackpot".to_string(),
            prize: "Car".to_string(),
            price,
            start_date: None,
            end_date: Utc::now() + Duration::days(3),
            max_tickets: None,
            image: None,
            status: None,
        };

        for price in [1e30, f64::MAX, 1_000_000.01] {
            let err = draws.create_draw(request(price), admin.id).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(ref m) if m == "Price must not exceed 1000000"));
        }
        let created = draws.create_draw(request(1_000_000.0), admin.id).await.unwrap();
        assert_eq!(created.price, 1_000_000.0);

        let err = draws
            .update_draw(
                created.id,
                UpdateDrawRequest {
                    price: Some(1e30),
                    ..Default::default()
                },
                admin.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[actix_web::test]
    async fn test_update_can_clear_ticket_cap() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let admin = insert_user(&pool, "admin@example.com", UserRole::Admin).await;
        let draw = insert_draw(
            &pool,
            DrawFixture {
                max_tickets: Some(10),
                ..DrawFixture::open()
            },
        )
        .await;

        let kept = draws
            .update_draw(
                draw.id,
                UpdateDrawRequest {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
                admin.id,
            )
            .await
            .unwrap();
        assert_eq!(kept.max_tickets, Some(10));

        let cleared = draws
            .update_draw(
                draw.id,
                UpdateDrawRequest {
                    max_tickets: Some(None),
                    ..Default::default()
                },
                admin.id,
            )
            .await
            .unwrap();
        assert_eq!(cleared.max_tickets, None);
        assert_eq!(cleared.title, "Renamed");
    }

    #[actix_web::test]
    async fn test_completed_draw_cannot_be_edited() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let admin = insert_user(&pool, "admin@example.com", UserRole::Admin).await;
        let completed = insert_draw(
            &pool,
            DrawFixture {
                status: DrawStatus::Completed,
                ..DrawFixture::ended()
            },
        )
        .await;

        let edits = [
            UpdateDrawRequest {
                title: Some(String::new()),
                ..Default::default()
            },
            UpdateDrawRequest {
                end_date: Some(completed.start_date - Duration::days(1)),
                ..Default::default()
            },
            UpdateDrawRequest {
                status: Some(DrawStatus::Active),
                ..Default::default()
            },
        ];
        for edit in edits {
            let err = draws.update_draw(completed.id, edit, admin.id).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(ref m) if m == "Completed draws cannot be edited"));
        }

        let stored = draws.get_draw(completed.id).await.unwrap();
        assert_eq!(stored.title, completed.title);
        assert_eq!(stored.status, DrawStatus::Completed);
    }

    #[actix_web::test]
    async fn test_delete_draw_with_tickets_is_refused() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let user = insert_user(&pool, "jane@example.com", UserRole::User).await;
        let sold = insert_draw(&pool, DrawFixture::open()).await;
        let empty = insert_draw(&pool, DrawFixture::open()).await;
        insert_ticket(&pool, user.id, sold.id, TicketStatus::Pending).await;

        assert!(matches!(
            draws.delete_draw(sold.id, user.id).await,
            Err(AppError::ValidationError(_))
        ));
        draws.delete_draw(empty.id, user.id).await.unwrap();
        assert!(matches!(
            draws.get_draw(empty.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn test_toggle_status() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let admin = insert_user(&pool, "admin@example.com", UserRole::Admin).await;
        let draw = insert_draw(&pool, DrawFixture::open()).await;
        let completed = insert_draw(
            &pool,
            DrawFixture {
                status: DrawStatus::Completed,
                ..DrawFixture::ended()
            },
        )
        .await;

        let toggled = draws.toggle_status(draw.id, admin.id).await.unwrap();
        assert_eq!(toggled.status, DrawStatus::Cancelled);
        let toggled = draws.toggle_status(draw.id, admin.id).await.unwrap();
        assert_eq!(toggled.status, DrawStatus::Active);
        assert!(matches!(
            draws.toggle_status(completed.id, admin.id).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[actix_web::test]
    async fn test_select_winner_marks_one_won_and_rest_lost() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let draw = insert_draw(&pool, DrawFixture::ended()).await;

        let mut active_ids = Vec::new();
        for i in 0..4 {
            let user = insert_user(&pool, &format!("p{i}@example.com"), UserRole::User).await;
            active_ids.push(insert_ticket(&pool, user.id, draw.id, TicketStatus::Active).await.id);
        }
        let late = insert_user(&pool, "late@example.com", UserRole::User).await;
        let pending = insert_ticket(&pool, late.id, draw.id, TicketStatus::Pending).await;

        let mut rng = StdRng::seed_from_u64(7);
        let result = draws.select_winner_with_rng(draw.id, &mut rng).await.unwrap();
        assert!(active_ids.contains(&result.ticket.ticket.id));
        assert_eq!(result.ticket.ticket.status, TicketStatus::Won);
        assert_eq!(result.draw.status, DrawStatus::Completed);
        assert_eq!(result.draw.winner_id, Some(result.winner.id));
        assert_eq!(result.draw.winning_ticket_id, Some(result.ticket.ticket.id));

        let all = tickets::Entity::find().all(&pool).await.unwrap();
        let won = all.iter().filter(|t| t.status == TicketStatus::Won).count();
        let lost = all.iter().filter(|t| t.status == TicketStatus::Lost).count();
        assert_eq!(won, 1);
        assert_eq!(lost, 3);
        // 开奖时仍待审核的票被拒绝
        let closed = all.iter().find(|t| t.id == pending.id).unwrap();
        assert_eq!(closed.status, TicketStatus::Declined);
        assert_eq!(closed.payment_status, PaymentStatus::Failed);
        assert_eq!(closed.admin_note.as_deref(), Some(CLOSED_BEFORE_REVIEW));
    }

    #[actix_web::test]
    async fn test_repeated_selection_keeps_single_winner() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let draw = insert_draw(&pool, DrawFixture::ended()).await;
        for i in 0..5 {
            let user = insert_user(&pool, &format!("p{i}@example.com"), UserRole::User).await;
            insert_ticket(&pool, user.id, draw.id, TicketStatus::Active).await;
        }

        let mut rng = StdRng::seed_from_u64(3);
        let first = draws.select_winner_with_rng(draw.id, &mut rng).await.unwrap();

        for seed in [4, 5, 6] {
            let mut rng = StdRng::seed_from_u64(seed);
            let err = draws
                .select_winner_with_rng(draw.id, &mut rng)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::ValidationError(ref m) if m == "Draw is not active"));
        }
        // 定时任务随后运行也不再处理该抽奖
        assert_eq!(draws.finalize_expired_draws().await.unwrap(), 0);

        let won = tickets::Entity::find()
            .filter(tickets::Column::Status.eq(TicketStatus::Won))
            .all(&pool)
            .await
            .unwrap();
        assert_eq!(won.len(), 1);
        assert_eq!(won[0].id, first.ticket.ticket.id);

        let stored = draws.get_draw(draw.id).await.unwrap();
        assert_eq!(stored.winner_id, Some(first.winner.id));
        assert_eq!(stored.winning_ticket_id, Some(first.ticket.ticket.id));
    }

    #[actix_web::test]
    async fn test_claiming_a_draw_only_succeeds_once() {
        let pool = create_test_pool().await;
        let draw = insert_draw(&pool, DrawFixture::ended()).await;
        let now = Utc::now();

        assert!(complete_if_active(&pool, draw.id, now).await.unwrap());
        assert!(!complete_if_active(&pool, draw.id, now).await.unwrap());

        let cancelled = insert_draw(
            &pool,
            DrawFixture {
                status: DrawStatus::Cancelled,
                ..DrawFixture::ended()
            },
        )
        .await;
        assert!(!complete_if_active(&pool, cancelled.id, now).await.unwrap());
    }

    #[actix_web::test]
    async fn test_select_winner_preconditions() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let user = insert_user(&pool, "jane@example.com", UserRole::User).await;
        let running = insert_draw(&pool, DrawFixture::open()).await;
        insert_ticket(&pool, user.id, running.id, TicketStatus::Active).await;
        let empty = insert_draw(&pool, DrawFixture::ended()).await;

        let mut rng = StdRng::seed_from_u64(1);
        let err = draws
            .select_winner_with_rng(running.id, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == "Draw cannot be completed yet"));

        let err = draws
            .select_winner_with_rng(empty.id, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let draw = draws.get_draw(empty.id).await.unwrap();
        assert_eq!(draw.status, DrawStatus::Active);
    }

    #[actix_web::test]
    async fn test_finalize_expired_draws() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let user = insert_user(&pool, "jane@example.com", UserRole::User).await;
        let with_tickets = insert_draw(&pool, DrawFixture::ended()).await;
        insert_ticket(&pool, user.id, with_tickets.id, TicketStatus::Active).await;
        let without_tickets = insert_draw(&pool, DrawFixture::ended()).await;
        let late = insert_ticket(&pool, user.id, without_tickets.id, TicketStatus::Pending).await;
        let running = insert_draw(&pool, DrawFixture::open()).await;

        assert_eq!(draws.finalize_expired_draws().await.unwrap(), 2);

        let won = draws.get_draw(with_tickets.id).await.unwrap();
        assert_eq!(won.status, DrawStatus::Completed);
        assert_eq!(won.winner_id, Some(user.id));

        let closed = draws.get_draw(without_tickets.id).await.unwrap();
        assert_eq!(closed.status, DrawStatus::Completed);
        assert!(closed.winner_id.is_none());
        let late = tickets::Entity::find_by_id(late.id)
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(late.status, TicketStatus::Declined);

        assert_eq!(
            draws.get_draw(running.id).await.unwrap().status,
            DrawStatus::Active
        );
        assert_eq!(draws.finalize_expired_draws().await.unwrap(), 0);
    }

    #[actix_web::test]
    async fn test_list_all_counts_sold_tickets() {
        let pool = create_test_pool().await;
        let draws = service(&pool);
        let a = insert_user(&pool, "a@example.com", UserRole::User).await;
        let b = insert_user(&pool, "b@example.com", UserRole::User).await;
        let draw = insert_draw(&pool, DrawFixture::open()).await;
        insert_draw(&pool, DrawFixture::ended()).await;
        insert_ticket(&pool, a.id, draw.id, TicketStatus::Active).await;
        insert_ticket(&pool, b.id, draw.id, TicketStatus::Declined).await;

        let all = draws.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        let listed = all.iter().find(|d| d.id == draw.id).unwrap();
        assert_eq!(listed.ticket_count, Some(1));
        assert_eq!(draws.get_draw(draw.id).await.unwrap().ticket_count, Some(1));
    }
}
