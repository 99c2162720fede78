// src/models/mod.rs
pub mod driver;
pub mod ride;
pub mod tracking;

pub use driver::*;
pub use ride::*;
pub use tracking::*;
