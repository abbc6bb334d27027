pub mod errors;
pub mod handlers;
