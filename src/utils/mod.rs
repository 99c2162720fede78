// src/utils/mod.rs
pub mod geo;
pub mod http;
pub mod json;
