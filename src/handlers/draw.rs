use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

use crate::handlers::admin;
use crate::middlewares::{current_user, optional_user};
use crate::models::*;
use crate::services::{DrawService, TicketService};

#[utoipa::path(
    get,
    path = "/api/draws",
    tag = "draws",
    responses(
        (status = 200, description = "进行中的抽奖 (附带当前用户参与情况)", body = [DrawListItem])
    )
)]
pub async fn list_draws(
    draw_service: web::Data<DrawService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let viewer_id = optional_user(&req).map(|user| user.id);

    match draw_service.list_active(viewer_id).await {
        Ok(draws) => Ok(HttpResponse::Ok().json(ApiResponse::success(draws))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/draws/{id}",
    tag = "draws",
    params(("id" = i64, Path, description = "抽奖ID")),
    responses(
        (status = 200, description = "抽奖详情", body = DrawResponse),
        (status = 404, description = "抽奖不存在")
    )
)]
pub async fn get_draw(
    draw_service: web::Data<DrawService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match draw_service.get_draw(path.into_inner()).await {
        Ok(draw) => Ok(HttpResponse::Ok().json(ApiResponse::success(draw))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/draws/{id}/enter",
    tag = "draws",
    params(("id" = i64, Path, description = "抽奖ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "参与成功", body = EnterDrawResponse),
        (status = 400, description = "已参与, 已结束或已售罄"),
        (status = 401, description = "未授权"),
        (status = 404, description = "抽奖不存在")
    )
)]
pub async fn enter_draw(
    draw_service: web::Data<DrawService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match draw_service.enter_draw(user.id, path.into_inner()).await {
        Ok(entry) => Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
            entry,
            "Successfully entered the draw",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/draws/my/tickets",
    tag = "draws",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "当前用户的票", body = TicketListResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn my_draw_tickets(
    ticket_service: web::Data<TicketService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match ticket_service.my_tickets(user.id).await {
        Ok(tickets) => Ok(HttpResponse::Ok().json(ApiResponse::success(TicketListResponse {
            tickets,
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn draw_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/draws")
            .route("", web::get().to(list_draws))
            .route("/", web::get().to(list_draws))
            .route("", web::post().to(admin::create_draw))
            .route("/", web::post().to(admin::create_draw))
            .route("/my/tickets", web::get().to(my_draw_tickets))
            .route("/{id}", web::get().to(get_draw))
            .route("/{id}", web::put().to(admin::update_draw))
            .route("/{id}", web::delete().to(admin::delete_draw))
            .route("/{id}/enter", web::post().to(enter_draw)),
    );
}
