use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

use crate::handlers::upload::read_image_part;
use crate::middlewares::current_user;
use crate::models::*;
use crate::services::ProfileService;

#[utoipa::path(
    get,
    path = "/api/profile",
    tag = "profile",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取用户资料成功", body = UserEnvelope),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_profile(
    profile_service: web::Data<ProfileService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match profile_service.get_profile(user.id).await {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiResponse::success(UserEnvelope { user }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/profile",
    tag = "profile",
    request_body = UpdateProfileRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新用户资料成功", body = UserEnvelope),
        (status = 400, description = "请求参数错误或邮箱已被使用"),
        (status = 401, description = "未授权")
    )
)]
pub async fn update_profile(
    profile_service: web::Data<ProfileService>,
    req: HttpRequest,
    request: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match profile_service
        .update_profile(user.id, request.into_inner())
        .await
    {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            UserEnvelope { user },
            "Profile updated successfully",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/profile/change-password",
    tag = "profile",
    request_body = ChangePasswordRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "密码修改成功"),
        (status = 400, description = "当前密码错误")
    )
)]
pub async fn change_password(
    profile_service: web::Data<ProfileService>,
    req: HttpRequest,
    request: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match profile_service
        .change_password(user.id, request.into_inner())
        .await
    {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::message("Password updated successfully"))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/profile/avatar",
    tag = "profile",
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "avatar 字段: PNG 或 JPEG, 不超过 5 MiB"),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "头像已更新", body = AvatarResponse),
        (status = 400, description = "图片类型或大小不符合要求"),
        (status = 502, description = "图床上传失败")
    )
)]
pub async fn upload_avatar(
    profile_service: web::Data<ProfileService>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    let image = match read_image_part(payload, "avatar").await {
        Ok(image) => image,
        Err(e) => return Ok(e.error_response()),
    };

    match profile_service
        .upload_avatar(user.id, image.bytes, &image.content_type)
        .await
    {
        Ok(avatar) => Ok(HttpResponse::Ok().json(ApiResponse::success(avatar))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/profile/stats",
    tag = "profile",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "个人统计", body = ProfileStatsResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_stats(
    profile_service: web::Data<ProfileService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match profile_service.stats(user.id).await {
        Ok(stats) => Ok(HttpResponse::Ok().json(ApiResponse::success(ProfileStatsResponse {
            stats,
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn profile_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/profile")
            .route("", web::get().to(get_profile))
            .route("", web::put().to(update_profile))
            .route("/", web::get().to(get_profile))
            .route("/", web::put().to(update_profile))
            .route("/change-password", web::post().to(change_password))
            .route("/avatar", web::post().to(upload_avatar))
            .route("/stats", web::get().to(get_stats)),
    );
}
