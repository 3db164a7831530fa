pub mod subscription;
pub mod upgrade_request;
pub mod user;
