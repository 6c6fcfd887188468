//! HTTP route handlers

pub mod health;
pub mod registration;
pub mod waivers;
