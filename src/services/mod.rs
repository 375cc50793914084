// src/services/mod.rs

pub mod files;
pub mod ordering;
