pub mod api;
pub mod config;
pub mod error;
pub mod plist;
pub mod validate;

pub use api::*;
pub use config::*;
pub use error::*;
