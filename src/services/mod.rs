pub mod activity_service;
pub mod admin_service;
pub mod auth_service;
pub mod draw_service;
pub mod profile_service;
pub mod ticket_service;

#[cfg(test)]
pub(crate) mod test_support;

pub use activity_service::*;
pub use admin_service::*;
pub use auth_service::*;
pub use draw_service::*;
pub use profile_service::*;
pub use ticket_service::*;
