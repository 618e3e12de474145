//! Landfall Library
//!
//! Core modules for the landfall deployment tool.

pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod remote;
pub mod report;
pub mod utils;
