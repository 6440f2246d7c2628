// Library surface for the binary and for headless/integration tests.
pub mod api;
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod countdown;
pub mod message;
pub mod route;
pub mod runtime;
pub mod session;
pub mod ui;
pub mod util;

/// Redraw interval of the main loop
pub const TICK_RATE_MS: u64 = 100;
