pub mod changes;
pub mod config;
pub mod db;
pub mod docs;
pub mod env;
pub mod error;
pub mod git;
pub mod github;
pub mod logging;
pub mod process;
pub mod project;
pub mod release;
pub mod session;
pub mod ui;
pub mod version;
pub mod warning;

pub use error::{CiError, Result};
