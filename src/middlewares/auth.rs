use crate::entities::UserRole;
use crate::error::{AppError, AppResult};
use crate::utils::JwtService;
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

const DRAWS_PREFIX: &str = "/api/draws";

/// 通过令牌校验的调用者, 存放在请求扩展中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub role: UserRole,
}

// 公开路径配置
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            // 完全匹配的公开路径
            exact_paths: vec!["/", "/swagger-ui", "/api-docs/openapi.json"],
            // 前缀匹配的公开路径
            prefix_paths: vec!["/swagger-ui/", "/api-docs/", "/api/auth/"],
        }
    }

    fn is_public_path(&self, method: &Method, path: &str) -> bool {
        if self.exact_paths.contains(&path) {
            return true;
        }

        if self
            .prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
        {
            return true;
        }

        // 抽奖列表与详情允许匿名访问 (/api/draws/my/... 除外)
        method == Method::GET && is_public_draw_path(path)
    }
}

fn is_public_draw_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix(DRAWS_PREFIX) else {
        return false;
    };
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return true;
    }
    match rest.strip_prefix('/') {
        Some(segment) => !segment.is_empty() && !segment.contains('/') && segment != "my",
        None => false,
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    public_paths: PublicPaths,
}

impl<S> AuthMiddlewareService<S> {
    fn authenticate(&self, token: &str) -> AppResult<AuthenticatedUser> {
        let claims = self.jwt_service.verify_access_token(token)?;
        Ok(AuthenticatedUser {
            id: claims.user_id()?,
            role: claims.role,
        })
    }
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let authenticated = bearer_token(&req).map(|token| self.authenticate(token));

        // 公开路径: 令牌可选, 无效令牌按匿名处理
        if self.public_paths.is_public_path(req.method(), req.path()) {
            if let Some(Ok(user)) = authenticated {
                req.extensions_mut().insert(user);
            }
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        match authenticated {
            Some(Ok(user)) => {
                req.extensions_mut().insert(user);
                let fut = self.service.call(req);
                Box::pin(fut)
            }
            Some(Err(e)) => {
                log::debug!("Rejected token on {}: {e}", req.path());
                let error = AppError::AuthError("Invalid or expired token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
            None => {
                let error = AppError::AuthError("Not authorized to access this route".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

/// 当前登录用户; 未登录时返回 401
pub fn current_user(req: &HttpRequest) -> AppResult<AuthenticatedUser> {
    optional_user(req)
        .ok_or_else(|| AppError::AuthError("Not authorized to access this route".to_string()))
}

pub fn optional_user(req: &HttpRequest) -> Option<AuthenticatedUser> {
    req.extensions().get::<AuthenticatedUser>().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        let paths = PublicPaths::new();
        assert!(paths.is_public_path(&Method::GET, "/"));
        assert!(paths.is_public_path(&Method::POST, "/api/auth/login"));
        assert!(paths.is_public_path(&Method::GET, "/swagger-ui/index.html"));
        assert!(paths.is_public_path(&Method::GET, "/api/draws"));
        assert!(paths.is_public_path(&Method::GET, "/api/draws/"));
        assert!(paths.is_public_path(&Method::GET, "/api/draws/42"));

        assert!(!paths.is_public_path(&Method::POST, "/api/draws"));
        assert!(!paths.is_public_path(&Method::POST, "/api/draws/42/enter"));
        assert!(!paths.is_public_path(&Method::GET, "/api/draws/my/tickets"));
        assert!(!paths.is_public_path(&Method::GET, "/api/drawsx"));
        assert!(!paths.is_public_path(&Method::GET, "/api/profile"));
        assert!(!paths.is_public_path(&Method::GET, "/api/admin/stats"));
    }
}
