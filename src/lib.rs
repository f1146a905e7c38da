#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod blog;
pub mod config;
pub mod data;
pub mod logging;
pub mod query;
pub mod render;
pub mod storage;
pub mod sync;
pub mod ui;
pub mod view;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
