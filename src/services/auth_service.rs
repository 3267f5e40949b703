use crate::config::AdminConfig;
use crate::entities::{ActivityType, UserRole, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::external::{MailMessage, MailService};
use crate::models::{
    AuthResponse, LoginRequest, RegisterRequest, TokenPairResponse, UserResponse,
};
use crate::services::{ActivityService, NewActivity};
use crate::utils::{
    JwtService, hash_password, normalize_email, validate_email, validate_password,
    verify_password,
};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, Set,
};
use serde_json::json;
use uuid::Uuid;

const RESET_TOKEN_TTL_HOURS: i64 = 1;
const INVALID_CREDENTIALS: &str = "Invalid email or password";
const EMAIL_TAKEN: &str = "Email already registered";

#[derive(Clone)]
pub struct AuthService {
    pool: DatabaseConnection,
    jwt_service: JwtService,
    mail_service: MailService,
    activity_service: ActivityService,
    public_url: String,
}

impl AuthService {
    pub fn new(
        pool: DatabaseConnection,
        jwt_service: JwtService,
        mail_service: MailService,
        activity_service: ActivityService,
        public_url: String,
    ) -> Self {
        Self {
            pool,
            jwt_service,
            mail_service,
            activity_service,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::ValidationError("Name is required".to_string()));
        }
        let email = normalize_email(&request.email);
        validate_email(&email)?;
        validate_password(&request.password)?;

        if find_user_by_email(&self.pool, &email).await?.is_some() {
            return Err(AppError::ValidationError(EMAIL_TAKEN.to_string()));
        }

        let password_hash = hash_password(&request.password)?;
        let verification_token = Uuid::new_v4().to_string();
        let now = Utc::now();

        // 并发注册同一邮箱时由唯一索引兜底
        let user = users::ActiveModel {
            name: Set(name.clone()),
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            role: Set(UserRole::User),
            phone: Set(non_empty(request.phone)),
            address: Set(non_empty(request.address)),
            avatar: Set(None),
            is_verified: Set(false),
            verification_token: Set(Some(verification_token.clone())),
            reset_password_token: Set(None),
            reset_password_expires: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .map_err(|e| AppError::on_unique_violation(e, EMAIL_TAKEN))?;

        log::info!("User registered: {}", user.id);

        self.activity_service
            .track(
                NewActivity::new(
                    ActivityType::User,
                    "User Registration",
                    format!("New user registered: {name}"),
                )
                .user(user.id)
                .metadata(json!({ "email": email })),
            )
            .await;

        let link = format!(
            "{}/api/auth/verify-email/{verification_token}",
            self.public_url
        );
        if let Err(e) = self
            .mail_service
            .send(&MailMessage::verification(&user.email, &link))
            .await
        {
            log::error!("Error sending verification email to {}: {e}", user.id);
        }

        self.auth_response(user)
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(AppError::AuthError(INVALID_CREDENTIALS.to_string()));
        }

        let user = find_user_by_email(&self.pool, &email)
            .await?
            .ok_or_else(|| AppError::AuthError(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::AuthError(INVALID_CREDENTIALS.to_string()));
        }

        self.activity_service
            .track(
                NewActivity::new(
                    ActivityType::User,
                    "User Login",
                    format!("User logged in: {}", user.name),
                )
                .user(user.id),
            )
            .await;

        self.auth_response(user)
    }

    pub async fn verify_email(&self, token: &str) -> AppResult<()> {
        let user = users::Entity::find()
            .filter(users::Column::VerificationToken.eq(token))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::ValidationError("Invalid verification token".to_string()))?;

        let mut am = user.into_active_model();
        am.is_verified = Set(true);
        am.verification_token = Set(None);
        am.updated_at = Set(Utc::now());
        am.update(&self.pool).await?;
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);
        validate_email(&email)?;

        let user = find_user_by_email(&self.pool, &email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let reset_token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut am = user.into_active_model();
        am.reset_password_token = Set(Some(reset_token.clone()));
        am.reset_password_expires = Set(Some(now + Duration::hours(RESET_TOKEN_TTL_HOURS)));
        am.updated_at = Set(now);
        let user = am.update(&self.pool).await?;

        let link = format!("{}/api/auth/reset-password/{reset_token}", self.public_url);
        if let Err(e) = self
            .mail_service
            .send(&MailMessage::password_reset(&user.email, &link))
            .await
        {
            log::error!("Error sending password reset email to {}: {e}", user.id);
        }

        Ok(())
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> AppResult<()> {
        validate_password(password)?;

        let now = Utc::now();
        let user = users::Entity::find()
            .filter(users::Column::ResetPasswordToken.eq(token))
            .filter(users::Column::ResetPasswordExpires.gt(now))
            .one(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::ValidationError("Invalid or expired reset token".to_string())
            })?;

        let mut am = user.into_active_model();
        am.password_hash = Set(hash_password(password)?);
        am.reset_password_token = Set(None);
        am.reset_password_expires = Set(None);
        am.updated_at = Set(now);
        am.update(&self.pool).await?;
        Ok(())
    }

    /// 刷新令牌 (轮换 refresh token)
    pub async fn refresh_token(&self, refresh_token: Option<&str>) -> AppResult<TokenPairResponse> {
        let token = refresh_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::ValidationError("Refresh token is required".to_string()))?;

        let invalid = || AppError::AuthError("Invalid refresh token".to_string());
        let claims = self
            .jwt_service
            .verify_refresh_token(token)
            .map_err(|_| invalid())?;
        let user_id = claims.user_id().map_err(|_| invalid())?;

        let user = users::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(invalid)?;

        Ok(TokenPairResponse {
            token: self.jwt_service.generate_access_token(user.id, user.role)?,
            refresh_token: self.jwt_service.generate_refresh_token(user.id, user.role)?,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }

    /// 令牌中的用户必须仍然存在
    pub async fn authorize(&self, user_id: i64) -> AppResult<users::Model> {
        load_user(&self.pool, user_id).await
    }

    /// 管理员校验: 以数据库中的当前角色为准
    pub async fn require_admin(&self, user_id: i64) -> AppResult<users::Model> {
        let user = self.authorize(user_id).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden(
                "User role is not authorized to access this route".to_string(),
            ));
        }
        Ok(user)
    }

    /// 启动时创建管理员账号 (已存在则跳过)
    pub async fn ensure_admin_account(&self, config: &AdminConfig) -> AppResult<Option<users::Model>> {
        if config.password.is_empty() {
            log::info!("Admin password not configured, skipping admin seeding");
            return Ok(None);
        }

        let email = normalize_email(&config.email);
        validate_email(&email)?;
        validate_password(&config.password)?;

        if find_user_by_email(&self.pool, &email).await?.is_some() {
            log::info!("Admin user already exists");
            return Ok(None);
        }

        let now = Utc::now();
        let admin = users::ActiveModel {
            name: Set(config.name.clone()),
            email: Set(email),
            password_hash: Set(hash_password(&config.password)?),
            role: Set(UserRole::Admin),
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
        .insert(&self.pool)
        .await?;

        log::info!("Admin user created successfully: {}", admin.email);
        self.activity_service
            .track(
                NewActivity::new(ActivityType::System, "Admin Created", "Admin account seeded")
                    .user(admin.id),
            )
            .await;
        Ok(Some(admin))
    }

    fn auth_response(&self, user: users::Model) -> AppResult<AuthResponse> {
        let token = self.jwt_service.generate_access_token(user.id, user.role)?;
        let refresh_token = self.jwt_service.generate_refresh_token(user.id, user.role)?;
        Ok(AuthResponse {
            user: UserResponse::from(user),
            token,
            refresh_token,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }
}

pub(crate) async fn find_user_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> AppResult<Option<users::Model>> {
    Ok(users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(db)
        .await?)
}

/// 按令牌中的用户ID读取用户, 不存在视为认证失败
pub(crate) async fn load_user<C: ConnectionTrait>(db: &C, user_id: i64) -> AppResult<users::Model> {
    users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
