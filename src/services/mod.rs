// Team workspace
pub mod members;
pub mod teams;

// Inventory and purchasing
pub mod bom;
pub mod money;
pub mod orders;
pub mod parts;
pub mod vendors;

// Assistant state
pub mod conversations;
