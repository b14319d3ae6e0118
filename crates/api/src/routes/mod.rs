//! HTTP route handlers

pub mod assistant;
pub mod health;
pub mod video;
