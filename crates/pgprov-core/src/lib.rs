pub mod config;
pub mod error;
pub mod inventory;
pub mod io;
pub mod lifecycle;
pub mod paths;
pub mod render;
pub mod request;
pub mod runner;
pub mod types;
pub mod workspace;

pub use error::{ProvisionError, Result};
