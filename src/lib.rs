pub mod api;
pub mod app;
pub mod console;
pub mod error;
pub mod format;
pub mod import;
pub mod render;
pub mod scheduler;
pub mod store;
pub mod utils;

#[cfg(feature = "gui")]
pub mod ui;
