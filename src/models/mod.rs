pub mod activity;
pub mod admin;
pub mod common;
pub mod draw;
pub mod pagination;
pub mod profile;
pub mod ticket;
pub mod user;

pub use activity::*;
pub use admin::*;
pub use common::*;
pub use draw::*;
pub use pagination::*;
pub use profile::*;
pub use ticket::*;
pub use user::*;
