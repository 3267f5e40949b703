use actix_cors::Cors;

pub fn create_cors() -> Cors {
    Cors::default()
        .allowed_origin_fn(|_, _req_head| true)
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        // 前端会带 Authorization 与 Content-Type 之外的自定义 Header
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}
