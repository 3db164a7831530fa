pub mod accounts;
pub mod extractor;
pub mod handlers;
pub mod jwt;
pub mod password;
