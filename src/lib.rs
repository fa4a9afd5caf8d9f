//! Column auto-detection, reusable mapping profiles and batch script
//! generation for heterogeneous spreadsheet exports.

pub mod algo;
pub mod config;
pub mod error;
pub mod ops;

pub use error::{MappingError, Result};
