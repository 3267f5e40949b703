use actix_web::{HttpResponse, ResponseError, Result, web};

use crate::models::*;
use crate::services::AuthService;

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "注册成功", body = AuthResponse),
        (status = 400, description = "请求参数错误或邮箱已注册"),
        (status = 500, description = "服务器内部错误")
    )
)]
pub async fn register(
    auth_service: web::Data<AuthService>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    match auth_service.register(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
            response,
            "Registration successful. Please check your email to verify your account.",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = AuthResponse),
        (status = 401, description = "邮箱或密码错误")
    )
)]
pub async fn login(
    auth_service: web::Data<AuthService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    match auth_service.login(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/verify-email/{token}",
    tag = "auth",
    params(("token" = String, Path, description = "邮箱验证令牌")),
    responses(
        (status = 200, description = "验证成功"),
        (status = 400, description = "无效的验证令牌")
    )
)]
pub async fn verify_email(
    auth_service: web::Data<AuthService>,
    token: web::Path<String>,
) -> Result<HttpResponse> {
    match auth_service.verify_email(&token).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::message("Email verified successfully"))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    tag = "auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "重置邮件已发送"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn forgot_password(
    auth_service: web::Data<AuthService>,
    request: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse> {
    match auth_service.forgot_password(&request.email).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::message("Password reset email sent"))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password/{token}",
    tag = "auth",
    params(("token" = String, Path, description = "密码重置令牌")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "密码已重置"),
        (status = 400, description = "令牌无效或已过期")
    )
)]
pub async fn reset_password(
    auth_service: web::Data<AuthService>,
    token: web::Path<String>,
    request: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse> {
    match auth_service.reset_password(&token, &request.password).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::message("Password reset successful"))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh-token",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "刷新令牌成功", body = TokenPairResponse),
        (status = 400, description = "缺少刷新令牌"),
        (status = 401, description = "无效的刷新令牌")
    )
)]
pub async fn refresh_token(
    auth_service: web::Data<AuthService>,
    request: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse> {
    match auth_service
        .refresh_token(request.refresh_token.as_deref())
        .await
    {
        Ok(tokens) => Ok(HttpResponse::Ok().json(ApiResponse::success(tokens))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/verify-email/{token}", web::get().to(verify_email))
            .route("/forgot-password", web::post().to(forgot_password))
            .route("/reset-password/{token}", web::post().to(reset_password))
            .route("/refresh-token", web::post().to(refresh_token)),
    );
}
