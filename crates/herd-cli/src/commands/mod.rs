//! CLI commands

pub mod catalog;
