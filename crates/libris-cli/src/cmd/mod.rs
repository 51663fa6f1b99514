pub mod config;
pub mod init;
pub mod roles;
pub mod setup;
