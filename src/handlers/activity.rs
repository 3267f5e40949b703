use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

use crate::entities::ActivityType;
use crate::handlers::require_admin;
use crate::models::*;
use crate::services::{ActivityService, AuthService};

#[utoipa::path(
    get,
    path = "/api/admin/activities/recent",
    tag = "activities",
    params(
        ("limit" = Option<u64>, Query, description = "条数 (默认 10, 最大 100)"),
        ("type" = Option<ActivityType>, Query, description = "USER, DRAW, TICKET 或 SYSTEM"),
        ("startDate" = Option<String>, Query, description = "起始时间 (RFC 3339)"),
        ("endDate" = Option<String>, Query, description = "结束时间 (RFC 3339)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "最近动态 (最新在前)", body = ActivityListResponse),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn recent_activities(
    auth_service: web::Data<AuthService>,
    activity_service: web::Data<ActivityService>,
    req: HttpRequest,
    query: web::Query<RecentActivitiesQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req, &auth_service).await {
        return Ok(e.error_response());
    }

    match activity_service.recent(&query).await {
        Ok(activities) => Ok(HttpResponse::Ok().json(ApiResponse::success(
            ActivityListResponse { activities },
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/activities/stats",
    tag = "activities",
    params(
        ("startDate" = Option<String>, Query, description = "起始时间 (RFC 3339)"),
        ("endDate" = Option<String>, Query, description = "结束时间 (RFC 3339)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "按类型统计", body = ActivityStatsResponse),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn activity_stats(
    auth_service: web::Data<AuthService>,
    activity_service: web::Data<ActivityService>,
    req: HttpRequest,
    query: web::Query<ActivityStatsQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req, &auth_service).await {
        return Ok(e.error_response());
    }

    match activity_service.stats(&query).await {
        Ok(stats) => Ok(HttpResponse::Ok().json(ApiResponse::success(ActivityStatsResponse {
            stats,
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 挂在 /admin 作用域下
pub fn activity_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/activities/recent", web::get().to(recent_activities))
        .route("/activities/stats", web::get().to(activity_stats));
}
