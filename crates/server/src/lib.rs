pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod routes;
pub mod temp_resource;

pub use routes::build_router;
