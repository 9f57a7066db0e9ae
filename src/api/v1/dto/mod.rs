pub mod auth_request;
pub mod error_detail;
pub mod token;
