//! Runner support for the node CPU hog experiment binary

pub mod api;
pub mod config;
