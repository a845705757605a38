pub mod api;
pub mod api_doc;
pub mod auth;
pub mod server;

pub use server::run_server;
