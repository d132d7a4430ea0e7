//! Mirror Sync Library
//!
//! Polls a project-management service for changed tasks, keeps a local
//! snapshot store, and mirrors tasks between lists by declarative rules.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod resolve;
pub mod sync;
pub mod types;
