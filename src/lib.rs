pub mod auth;
pub mod config;
pub mod files;
pub mod http_error;
pub mod kernel;
pub mod openai;
pub mod plugins;
pub mod store;

pub use crate::config::*;
pub use crate::kernel::*;
