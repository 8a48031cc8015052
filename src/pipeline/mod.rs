//! The document pipeline: detect sections, render them, assemble and convert.

pub mod detection;
pub mod render;
pub mod audit;
pub mod orchestrator;

pub use audit::{AuditAction, AuditEvent, AuditQueue, AuditSink, AuditStats, MemoryAuditSink, TracingAuditSink};
pub use orchestrator::*;
