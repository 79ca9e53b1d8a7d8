//! Immutable audit logging with SIEM export
//!
//! Provides tamper-evident audit trails using BLAKE3 hash chaining, with
//! export to Syslog (RFC 5424) and optionally OpenTelemetry Logs. Backs the
//! Retention Engine's `RetentionLog`: every sweep decision is
//! sealed into the same hash chain so the trail can't be edited after the
//! fact without breaking verification.
//!
//! # Architecture
//!
//! An acton-reactive actor (`AuditAgent`) processes all audit events sequentially,
//! guaranteeing correct hash chain ordering. Callers send events via
//! fire-and-forget message passing, so audit logging never blocks the caller.
//!
//! # Feature Interactions
//!
//! - `audit` alone: in-memory audit chain + syslog export
//! - `audit` + `database`: persistent append-only storage
//! - `audit` + `observability`: OTLP log export

pub mod agent;
pub mod archive;
pub mod chain;
pub mod config;
pub mod event;
pub mod logger;
pub mod storage;
pub mod syslog;

#[cfg(feature = "observability")]
pub mod otlp;

pub use agent::AuditAgent;
pub use chain::{verify_chain, AuditChain, ChainVerificationError};
pub use config::{AuditConfig, SyslogConfig};
pub use event::{AuditEvent, AuditEventKind, AuditSeverity, AuditSource};
pub use logger::AuditLogger;
pub use storage::AuditStorage;
