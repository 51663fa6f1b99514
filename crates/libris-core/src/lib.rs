pub mod config;
pub mod error;
pub mod io;
pub mod paths;
pub mod provision;
pub mod role;
pub mod setup;
pub mod store;

pub use error::{LibrisError, Result};
