pub mod backup;
pub mod chapter;
pub mod config;
pub mod photo;
pub mod session;
pub mod show;
pub mod watch;
