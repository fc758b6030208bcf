//! Family task-and-reward tracker: HTTP server and SQLite storage.

pub mod server;
pub mod storage;
