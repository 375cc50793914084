// src/handlers/mod.rs

pub mod auth;
pub mod contents;
pub mod courses;
pub mod evaluations;
pub mod files;
pub mod health;
pub mod tabs;
