//! Cached AI actions.
//!
//! One `CachedAction<T>` per feature. It hydrates the last stored result,
//! runs the prompt through the shared `AiService`, parses a typed payload,
//! and substitutes a fallback table entry when anything in that chain fails.

pub mod cache;
pub mod diagnostics;
pub mod errors;
pub mod fallback;
pub mod orchestrator;
pub mod tools;

pub use cache::{CacheEntry, CacheStore, MemoryCacheStore, SqliteCacheStore};
pub use diagnostics::{DiagnosticRecord, DiagnosticsSink, MemoryDiagnostics, TracingDiagnostics};
pub use errors::ActionError;
pub use fallback::FallbackTable;
pub use orchestrator::{ActionDeps, ActionSpec, ActionState, CachedAction};
