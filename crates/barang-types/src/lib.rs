//! Shared domain types for the Management Barang scanner.

pub mod config;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod lookup;
pub mod scan;

mod errors;

pub use errors::{BarangError, CameraFault, CameraFaultKind, ErrorCategory, Result};
