//! SeaORM entities for the team workspace.

pub mod bom_item;
pub mod conversation;
pub mod conversation_message;
pub mod order;
pub mod order_item;
pub mod part;
pub mod session;
pub mod team;
pub mod team_member;
pub mod user;
pub mod vendor;

pub use conversation_message::MessageRole;
pub use order::OrderStatus;
pub use team::Program;
pub use team_member::MemberRole;
