use crate::entities::ticket_entity as tickets;
use crate::error::{AppError, AppResult};
use rand::Rng;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

const TICKET_NUMBER_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const TICKET_NUMBER_LEN: usize = 8;
const MAX_ATTEMPTS: usize = 10;

/// 生成8位字母数字票号
pub fn generate_ticket_number<R: Rng>(rng: &mut R) -> String {
    (0..TICKET_NUMBER_LEN)
        .map(|_| TICKET_NUMBER_CHARS[rng.gen_range(0..TICKET_NUMBER_CHARS.len())] as char)
        .collect()
}

/// 生成在该抽奖内唯一的票号
pub async fn generate_unique_ticket_number<C: ConnectionTrait>(
    db: &C,
    draw_id: i64,
) -> AppResult<String> {
    for _ in 0..MAX_ATTEMPTS {
        let number = generate_ticket_number(&mut rand::thread_rng());

        let exists = tickets::Entity::find()
            .filter(tickets::Column::DrawId.eq(draw_id))
            .filter(tickets::Column::Number.eq(number.as_str()))
            .count(db)
            .await?;

        if exists == 0 {
            return Ok(number);
        }
    }

    Err(AppError::InternalError(
        "Failed to generate a unique ticket number".to_string(),
    ))
}
