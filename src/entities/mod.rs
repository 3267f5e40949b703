pub mod activities;
pub mod draws;
pub mod tickets;
pub mod users;

pub use activities as activity_entity;
pub use activities::ActivityType;
pub use draws as draw_entity;
pub use draws::DrawStatus;
pub use tickets as ticket_entity;
pub use tickets::{PaymentStatus, TicketStatus};
pub use users as user_entity;
pub use users::UserRole;
