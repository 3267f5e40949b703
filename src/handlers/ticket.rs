use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

use crate::middlewares::current_user;
use crate::models::*;
use crate::services::{DrawService, TicketService};

#[utoipa::path(
    get,
    path = "/api/tickets/my-tickets",
    tag = "tickets",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "当前用户的票 (最新在前)", body = TicketListResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn my_tickets(
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

/// 购票, 与 POST /api/draws/{id}/enter 规则相同
#[utoipa::path(
    post,
    path = "/api/tickets/draws/{draw_id}/tickets",
    tag = "tickets",
    params(("draw_id" = i64, Path, description = "抽奖ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "购票成功", body = EnterDrawResponse),
        (status = 400, description = "已参与, 已结束或已售罄"),
        (status = 404, description = "抽奖不存在")
    )
)]
pub async fn purchase_ticket(
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
            "Ticket purchased successfully",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/tickets/tickets/{ticket_id}",
    tag = "tickets",
    params(("ticket_id" = i64, Path, description = "票据ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "票据详情", body = TicketEnvelope),
        (status = 403, description = "无权查看"),
        (status = 404, description = "票据不存在")
    )
)]
pub async fn get_ticket(
    ticket_service: web::Data<TicketService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match ticket_service.ticket_detail(path.into_inner(), user.id).await {
        Ok(ticket) => Ok(HttpResponse::Ok().json(ApiResponse::success(TicketEnvelope { ticket }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn ticket_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tickets")
            .route("/my-tickets", web::get().to(my_tickets))
            .route("/draws/{draw_id}/tickets", web::post().to(purchase_ticket))
            .route("/tickets/{ticket_id}", web::get().to(get_ticket)),
    );
}
