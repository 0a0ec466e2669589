pub mod capture;
pub mod config;
pub mod permissions;

pub use capture::*;
pub use config::*;
pub use permissions::*;
