//! Worker: job table, serial processor, and the HTTP surface.

pub mod http;
pub mod processor;
pub mod table;

pub use http::{router, serve, AppState};
pub use processor::JobProcessor;
pub use table::JobTable;
