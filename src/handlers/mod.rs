pub mod activity;
pub mod admin;
pub mod auth;
pub mod draw;
pub mod profile;
pub mod ticket;
pub(crate) mod upload;

pub use admin::admin_config;
pub use auth::auth_config;
pub use draw::draw_config;
pub use profile::profile_config;
pub use ticket::ticket_config;

use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::middlewares::{AuthenticatedUser, current_user};
use crate::services::AuthService;

/// 登录用户且数据库中的角色为管理员
pub(crate) async fn require_admin(
    req: &HttpRequest,
    auth_service: &AuthService,
) -> AppResult<AuthenticatedUser> {
    let user = current_user(req)?;
    auth_service.require_admin(user.id).await?;
    Ok(user)
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("Invalid request body: {err}")).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("Invalid query parameters: {err}")).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("Invalid path parameter: {err}")).into()
    })
}

pub async fn welcome() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Welcome to Tombola Server!" }))
}

/// 所有 /api 路由
pub fn api_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(welcome)).service(
        web::scope("/api")
            .app_data(json_config())
            .app_data(query_config())
            .app_data(path_config())
            .configure(auth_config)
            .configure(draw_config)
            .configure(ticket_config)
            .configure(profile_config)
            .configure(admin_config),
    );
}
