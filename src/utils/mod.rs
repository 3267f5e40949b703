pub mod avatar;
pub mod email;
pub mod jwt;
pub mod password;
pub mod ticket_number;

pub use avatar::gravatar_url;
pub use email::*;
pub use jwt::*;
pub use password::*;
pub use ticket_number::{generate_ticket_number, generate_unique_ticket_number};
