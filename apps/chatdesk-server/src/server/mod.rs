pub(crate) mod analytics;
pub(crate) mod auth;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod domain;
pub(crate) mod errors;
pub(crate) mod guard;
pub(crate) mod handlers;
pub(crate) mod roles;
pub(crate) mod router;
pub(crate) mod types;

pub use core::AppConfig;
pub use errors::init_tracing;
pub use router::build_router;
