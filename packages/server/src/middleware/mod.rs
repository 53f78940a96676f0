pub mod auth;
pub mod deadline;
pub mod rate_limit;
pub mod request_id;
