pub mod handlers;
pub mod usage;
