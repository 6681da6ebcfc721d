// src/lib.rs

pub mod config;
pub mod core;
pub mod error;
pub mod persistence;

pub use crate::config::{SolverConfig, SweepConfig};
pub use crate::core::engine::{SolveReport, SolverEngine};
pub use crate::core::mapping::MappingStore;
pub use crate::core::vocabulary::{ReferenceIndex, Vocabulary};
pub use crate::error::{MappingConflict, Result, SolverError};
