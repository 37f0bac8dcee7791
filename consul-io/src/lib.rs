pub mod cli;
pub mod config;
pub mod export;
pub mod import;
pub mod logging;
pub mod search;
pub mod sync;
pub mod update;
