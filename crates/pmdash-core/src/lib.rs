//! pmdash Core - Shared domain types for process dashboard monitoring
//!
//! This crate provides the types shared between the daemon (pmdashd) and
//! the wire protocol:
//! - `process` - the raw process entry as reported by the process manager
//! - `view` - the derived per-process view pushed to dashboard clients
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod process;
pub mod view;

// Re-exports for convenience
pub use process::{ProcessEntry, ProcessId};
pub use view::{format_memory, ProcessView};
