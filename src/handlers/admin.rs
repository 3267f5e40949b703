use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

use crate::handlers::upload::read_image_part;
use crate::handlers::{activity, require_admin};
use crate::models::*;
use crate::services::{AdminService, AuthService, DrawService, TicketService};

#[utoipa::path(
    post,
    path = "/api/admin/upload-image",
    tag = "admin",
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "image 字段: PNG 或 JPEG, 不超过 5 MiB"),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "上传成功", body = UploadImageResponse),
        (status = 400, description = "图片类型或大小不符合要求"),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn upload_image(
    auth_service: web::Data<AuthService>,
    admin_service: web::Data<AdminService>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req, &auth_service).await {
        return Ok(e.error_response());
    }

    let image = match read_image_part(payload, "image").await {
        Ok(image) => image,
        Err(e) => return Ok(e.error_response()),
    };

    match admin_service
        .upload_prize_image(image.bytes, &image.content_type)
        .await
    {
        Ok(uploaded) => Ok(HttpResponse::Ok().json(ApiResponse::success(uploaded))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "仪表盘统计", body = AdminStats),
        (status = 401, description = "未授权"),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn get_stats(
    auth_service: web::Data<AuthService>,
    admin_service: web::Data<AdminService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req, &auth_service).await {
        return Ok(e.error_response());
    }

    match admin_service.stats().await {
        Ok(stats) => Ok(HttpResponse::Ok().json(ApiResponse::success(stats))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "admin",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("pageSize" = Option<u64>, Query, description = "每页数量 (默认 20, 最大 100)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "用户列表 (附带票数)", body = [AdminUserResponse]),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn list_users(
    auth_service: web::Data<AuthService>,
    admin_service: web::Data<AdminService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req, &auth_service).await {
        return Ok(e.error_response());
    }

    match admin_service.list_users(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(ApiResponse::success(page))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "用户ID")),
    request_body = AdminUpdateUserRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "用户已更新", body = UserEnvelope),
        (status = 400, description = "邮箱已被使用"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn update_user(
    auth_service: web::Data<AuthService>,
    admin_service: web::Data<AdminService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<AdminUpdateUserRequest>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req, &auth_service).await {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match admin_service
        .update_user(path.into_inner(), request.into_inner(), admin.id)
        .await
    {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiResponse::success(UserEnvelope { user }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "用户ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "用户已删除"),
        (status = 400, description = "不能删除自己"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn delete_user(
    auth_service: web::Data<AuthService>,
    admin_service: web::Data<AdminService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req, &auth_service).await {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match admin_service.delete_user(path.into_inner(), admin.id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::message("User deleted successfully"))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/draws",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "全部抽奖 (附带票数)", body = [DrawResponse]),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn list_draws(
    auth_service: web::Data<AuthService>,
    draw_service: web::Data<DrawService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req, &auth_service).await {
        return Ok(e.error_response());
    }

    match draw_service.list_all().await {
        Ok(draws) => Ok(HttpResponse::Ok().json(ApiResponse::success(draws))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/draws",
    tag = "admin",
    request_body = CreateDrawRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "抽奖已创建", body = DrawResponse),
        (status = 400, description = "请求参数错误"),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn create_draw(
    auth_service: web::Data<AuthService>,
    draw_service: web::Data<DrawService>,
    req: HttpRequest,
    request: web::Json<CreateDrawRequest>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req, &auth_service).await {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match draw_service.create_draw(request.into_inner(), admin.id).await {
        Ok(draw) => Ok(HttpResponse::Created().json(ApiResponse::success(draw))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/draws/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "抽奖ID")),
    request_body = UpdateDrawRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "抽奖已更新", body = DrawResponse),
        (status = 400, description = "请求参数错误"),
        (status = 404, description = "抽奖不存在")
    )
)]
pub async fn update_draw(
    auth_service: web::Data<AuthService>,
    draw_service: web::Data<DrawService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateDrawRequest>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req, &auth_service).await {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match draw_service
        .update_draw(path.into_inner(), request.into_inner(), admin.id)
        .await
    {
        Ok(draw) => Ok(HttpResponse::Ok().json(ApiResponse::success(draw))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/draws/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "抽奖ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "抽奖已删除"),
        (status = 400, description = "已有售出的票"),
        (status = 404, description = "抽奖不存在")
    )
)]
pub async fn delete_draw(
    auth_service: web::Data<AuthService>,
    draw_service: web::Data<DrawService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req, &auth_service).await {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match draw_service.delete_draw(path.into_inner(), admin.id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::message("Draw deleted successfully"))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/api/admin/draws/{id}/toggle-status",
    tag = "admin",
    params(("id" = i64, Path, description = "抽奖ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "状态已切换", body = ToggleDrawStatusResponse),
        (status = 400, description = "已完成的抽奖不可切换"),
        (status = 404, description = "抽奖不存在")
    )
)]
pub async fn toggle_draw_status(
    auth_service: web::Data<AuthService>,
    draw_service: web::Data<DrawService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req, &auth_service).await {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match draw_service.toggle_status(path.into_inner(), admin.id).await {
        Ok(toggled) => Ok(HttpResponse::Ok().json(ApiResponse::success(toggled))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/draws/{id}/select-winner",
    tag = "admin",
    params(("id" = i64, Path, description = "抽奖ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "开奖成功", body = WinnerResponse),
        (status = 400, description = "未结束, 非进行中或无有效票"),
        (status = 404, description = "抽奖不存在")
    )
)]
pub async fn select_winner(
    auth_service: web::Data<AuthService>,
    draw_service: web::Data<DrawService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req, &auth_service).await {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match draw_service.select_winner(path.into_inner(), admin.id).await {
        Ok(result) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            result,
            "Winner selected successfully",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/pending-tickets",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "待审核的票", body = TicketListResponse),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn pending_tickets(
    auth_service: web::Data<AuthService>,
    ticket_service: web::Data<TicketService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req, &auth_service).await {
        return Ok(e.error_response());
    }

    match ticket_service.pending_tickets().await {
        Ok(tickets) => Ok(HttpResponse::Ok().json(ApiResponse::success(TicketListResponse {
            tickets,
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/api/admin/tickets/{ticket_id}/status",
    tag = "admin",
    params(("ticket_id" = i64, Path, description = "票据ID")),
    request_body = UpdateTicketStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "审核完成", body = TicketEnvelope),
        (status = 400, description = "票据已开奖"),
        (status = 404, description = "票据不存在")
    )
)]
pub async fn update_ticket_status(
    auth_service: web::Data<AuthService>,
    ticket_service: web::Data<TicketService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateTicketStatusRequest>,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req, &auth_service).await {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match ticket_service
        .review_ticket(path.into_inner(), request.into_inner(), admin.id)
        .await
    {
        Ok(ticket) => Ok(HttpResponse::Ok().json(ApiResponse::success(TicketEnvelope { ticket }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/upload-image", web::post().to(upload_image))
            .route("/stats", web::get().to(get_stats))
            .route("/users", web::get().to(list_users))
            .route("/users/{id}", web::put().to(update_user))
            .route("/users/{id}", web::delete().to(delete_user))
            .route("/draws", web::get().to(list_draws))
            .route("/draws", web::post().to(create_draw))
            .route("/draws/{id}", web::put().to(update_draw))
            .route("/draws/{id}", web::delete().to(delete_draw))
            .route("/draws/{id}/toggle-status", web::patch().to(toggle_draw_status))
            .route("/draws/{id}/select-winner", web::post().to(select_winner))
            .route("/pending-tickets", web::get().to(pending_tickets))
            .route("/tickets/{ticket_id}/status", web::patch().to(update_ticket_status))
            .configure(activity::activity_routes),
    );
}
