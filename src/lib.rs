pub mod config;
pub mod error;
pub mod format;
pub mod identity;
pub mod ledger;
pub mod rut;
pub mod server;
pub mod storage;
