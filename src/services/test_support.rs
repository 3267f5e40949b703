//! 服务层测试用的数据构造

use crate::entities::{
    DrawStatus, PaymentStatus, TicketStatus, UserRole, draw_entity as draws,
    ticket_entity as tickets, user_entity as users,
};
use crate::utils::{JwtService, generate_ticket_number, hash_password};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

pub const TEST_PASSWORD: &str = "secret123";

pub fn jwt() -> JwtService {
    JwtService::new("test-secret", 3600, 7200)
}

pub async fn insert_user(pool: &DatabaseConnection, email: &str, role: UserRole) -> users::Model {
    let now = Utc::now();
    users::ActiveModel {
        name: Set(email.split('@').next().unwrap_or(email).to_string()),
        email: Set(email.to_string()),
        password_hash: Set(hash_password(TEST_PASSWORD).unwrap()),
        role: Set(role),
        phone: Set(None),
        address: Set(None),
        avatar: Set(None),
        is_verified: Set(true),
        verification_token: Set(None),
        reset_password_token: Set(None),
        reset_password_expires: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(pool)
    .await
    .unwrap()
}

pub struct DrawFixture {
    pub title: String,
    pub price_cents: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub max_tickets: Option<i32>,
    pub status: DrawStatus,
}

impl DrawFixture {
    /// 正在进行
    pub fn open() -> Self {
        let now = Utc::now();
        Self {
            title: "Summer Tombola".to_string(),
            price_cents: 500,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(7),
            max_tickets: None,
            status: DrawStatus::Active,
        }
    }

    /// 已到期但仍为 active
    pub fn ended() -> Self {
        let now = Utc::now();
        Self {
            start_date: now - Duration::days(7),
            end_date: now - Duration::hours(1),
            ..Self::open()
        }
    }
}

pub async fn insert_draw(pool: &DatabaseConnection, fixture: DrawFixture) -> draws::Model {
    let now = Utc::now();
    draws::ActiveModel {
        title: Set(fixture.title),
        prize: Set("Mountain bike".to_string()),
        price_cents: Set(fixture.price_cents),
        image: Set(None),
        start_date: Set(fixture.start_date),
        end_date: Set(fixture.end_date),
        max_tickets: Set(fixture.max_tickets),
        status: Set(fixture.status),
        winner_id: Set(None),
        winning_ticket_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(pool)
    .await
    .unwrap()
}

pub async fn insert_ticket(
    pool: &DatabaseConnection,
    user_id: i64,
    draw_id: i64,
    status: TicketStatus,
) -> tickets::Model {
    let now = Utc::now();
    let payment_status = match status {
        TicketStatus::Pending => PaymentStatus::Pending,
        TicketStatus::Declined => PaymentStatus::Failed,
        _ => PaymentStatus::Completed,
    };
    tickets::ActiveModel {
        number: Set(generate_ticket_number(&mut rand::thread_rng())),
        user_id: Set(user_id),
        draw_id: Set(draw_id),
        purchase_date: Set(now),
        status: Set(status),
        payment_status: Set(payment_status),
        admin_note: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(pool)
    .await
    .unwrap()
}
