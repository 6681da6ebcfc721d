// File: src/core/mod.rs
pub mod engine;
pub mod grouper;
pub mod hooks;
pub mod mapping;
pub mod report;
pub mod scheduler;
pub mod sweep;
pub mod types;
pub mod vocabulary;
