use crate::entities::{
    DrawStatus, PaymentStatus, TicketStatus, draw_entity as draws, ticket_entity as tickets,
};
use crate::error::{AppError, AppResult};
use crate::external::CloudinaryService;
use crate::models::{
    AvatarResponse, ChangePasswordRequest, ProfileStats, UpdateProfileRequest, UserResponse,
    cents_to_price,
};
use crate::services::auth_service::{find_user_by_email, load_user};
use crate::utils::{
    hash_password, normalize_email, validate_email, validate_password, verify_password,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use std::collections::HashSet;

pub const AVATAR_FOLDER: &str = "avatars";

#[derive(Clone)]
pub struct ProfileService {
    pool: DatabaseConnection,
    cloudinary: CloudinaryService,
}

impl ProfileService {
    pub fn new(pool: DatabaseConnection, cloudinary: CloudinaryService) -> Self {
        Self { pool, cloudinary }
    }

    pub async fn get_profile(&self, user_id: i64) -> AppResult<UserResponse> {
        Ok(load_user(&self.pool, user_id).await?.into())
    }

    /// 部分更新; phone/address 传空字符串表示清空
    pub async fn update_profile(
        &self,
        user_id: i64,
        request: UpdateProfileRequest,
    ) -> AppResult<UserResponse> {
        let user = load_user(&self.pool, user_id).await?;

        let name = match request.name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(AppError::ValidationError("Name is required".to_string()));
                }
                name
            }
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

        let phone = match request.phone {
            Some(phone) => Some(phone.trim().to_string()).filter(|p| !p.is_empty()),
            None => user.phone.clone(),
        };
        let address = match request.address {
            Some(address) => Some(address.trim().to_string()).filter(|a| !a.is_empty()),
            None => user.address.clone(),
        };

        let mut am = user.into_active_model();
        am.name = Set(name);
        am.email = Set(email);
        am.phone = Set(phone);
        am.address = Set(address);
        am.updated_at = Set(Utc::now());
        let user = am
            .update(&self.pool)
            .await
            .map_err(|e| AppError::on_unique_violation(e, "Email already in use"))?;

        Ok(user.into())
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        request: ChangePasswordRequest,
    ) -> AppResult<()> {
        let user = load_user(&self.pool, user_id).await?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AppError::ValidationError(
                "Current password is incorrect".to_string(),
            ));
        }
        validate_password(&request.new_password)?;

        let mut am = user.into_active_model();
        am.password_hash = Set(hash_password(&request.new_password)?);
        am.updated_at = Set(Utc::now());
        am.update(&self.pool).await?;

        log::info!("Password changed for user {user_id}");
        Ok(())
    }

    pub async fn upload_avatar(
        &self,
        user_id: i64,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> AppResult<AvatarResponse> {
        let user = load_user(&self.pool, user_id).await?;

        let uploaded = self
            .cloudinary
            .upload_image(bytes, content_type, AVATAR_FOLDER)
            .await?;

        let mut am = user.into_active_model();
        am.avatar = Set(Some(uploaded.secure_url.clone()));
        am.updated_at = Set(Utc::now());
        am.update(&self.pool).await?;

        Ok(AvatarResponse {
            avatar: uploaded.secure_url,
        })
    }

    pub async fn stats(&self, user_id: i64) -> AppResult<ProfileStats> {
        load_user(&self.pool, user_id).await?;

        let rows = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(user_id))
            .find_also_related(draws::Entity)
            .all(&self.pool)
            .await?;

        let now = Utc::now();
        let mut stats = ProfileStats {
            total_tickets: rows.len() as u64,
            active_tickets: 0,
            won_tickets: 0,
            total_spent: 0.0,
            upcoming_draws: 0,
        };
        let mut spent_cents: i64 = 0;
        let mut upcoming: HashSet<i64> = HashSet::new();

        for (ticket, draw) in &rows {
            match ticket.status {
                TicketStatus::Active => stats.active_tickets += 1,
                TicketStatus::Won => stats.won_tickets += 1,
                _ => {}
            }
            let Some(draw) = draw else { continue };
            if ticket.payment_status == PaymentStatus::Completed {
                spent_cents = spent_cents.saturating_add(draw.price_cents);
            }
            if ticket.status == TicketStatus::Active
                && draw.status == DrawStatus::Active
                && draw.end_date > now
            {
                upcoming.insert(draw.id);
            }
        }

        stats.total_spent = cents_to_price(spent_cents);
        stats.upcoming_draws = upcoming.len() as u64;
        Ok(stats)
    }
}
