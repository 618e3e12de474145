//! Local filesystem helpers

pub mod file;
