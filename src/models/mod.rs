// src/models/mod.rs

pub mod course;
pub mod evaluation;
pub mod file;
pub mod user;
