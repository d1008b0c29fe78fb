//! Rigid alignment of Flange and Tread laser profiles.
//!
//! A flange scan is registered onto a tread scan by point-to-point ICP,
//! optionally preceded by a line-based coarse rotation. The aligned pair is
//! served over a framed TCP exchange.

pub mod algorithms;
pub mod analysis;
pub mod config;
pub mod data;
pub mod logging;
pub mod pipeline;
pub mod service;
pub mod transport;
pub mod visualization;

pub use algorithms::*;
pub use analysis::*;
pub use data::*;
pub use pipeline::*;
pub use service::*;

pub type Result<T> = anyhow::Result<T>;
