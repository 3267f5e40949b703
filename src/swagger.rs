use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{ActivityType, DrawStatus, PaymentStatus, TicketStatus, UserRole};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::verify_email,
        handlers::auth::forgot_password,
        handlers::auth::reset_password,
        handlers::auth::refresh_token,
        handlers::draw::list_draws,
        handlers::draw::get_draw,
        handlers::draw::enter_draw,
        handlers::draw::my_draw_tickets,
        handlers::ticket::my_tickets,
        handlers::ticket::purchase_ticket,
        handlers::ticket::get_ticket,
        handlers::profile::get_profile,
        handlers::profile::update_profile,
        handlers::profile::change_password,
        handlers::profile::upload_avatar,
        handlers::profile::get_stats,
        handlers::admin::upload_image,
        handlers::admin::get_stats,
        handlers::admin::list_users,
        handlers::admin::update_user,
        handlers::admin::delete_user,
        handlers::admin::list_draws,
        handlers::admin::create_draw,
        handlers::admin::update_draw,
        handlers::admin::delete_draw,
        handlers::admin::toggle_draw_status,
        handlers::admin::select_winner,
        handlers::admin::pending_tickets,
        handlers::admin::update_ticket_status,
        handlers::activity::recent_activities,
        handlers::activity::activity_stats,
    ),
    components(
        schemas(
            UserRole,
            DrawStatus,
            TicketStatus,
            PaymentStatus,
            ActivityType,
            RegisterRequest,
            LoginRequest,
            RefreshTokenRequest,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            UserResponse,
            UserSummary,
            UserEnvelope,
            AuthResponse,
            TokenPairResponse,
            CreateDrawRequest,
            UpdateDrawRequest,
            DrawResponse,
            DrawListItem,
            DrawSummary,
            ToggleDrawStatusResponse,
            WinnerResponse,
            TicketResponse,
            TicketDetailResponse,
            TicketListResponse,
            TicketEnvelope,
            EnterDrawResponse,
            ReviewDecision,
            UpdateTicketStatusRequest,
            UpdateProfileRequest,
            ChangePasswordRequest,
            AvatarResponse,
            ProfileStats,
            ProfileStatsResponse,
            AdminStats,
            RecentActivityItem,
            AdminUserResponse,
            AdminUpdateUserRequest,
            UploadImageResponse,
            ActivityUser,
            ActivityResponse,
            ActivityTypeCount,
            ActivityListResponse,
            ActivityStatsResponse,
            PaginationParams,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and account recovery"),
        (name = "draws", description = "Public draw listing and entry"),
        (name = "tickets", description = "Ticket purchase and lookup"),
        (name = "profile", description = "Current user profile"),
        (name = "admin", description = "Administration"),
        (name = "activities", description = "Admin activity feed"),
    ),
    info(
        title = "Tombola Backend API",
        version = "1.0.0",
        description = "Tombola prize draw REST API documentation"
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/auth/register"));
        assert!(paths.contains_key("/api/draws/{id}/enter"));
        assert!(paths.contains_key("/api/admin/draws/{id}/select-winner"));
        assert!(
            doc.components
                .as_ref()
                .is_some_and(|c| c.security_schemes.contains_key("bearer_auth"))
        );
    }
}
