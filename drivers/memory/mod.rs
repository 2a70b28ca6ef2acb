//! In-memory object storage backend / 内存对象存储后端
//!
//! Keeps objects and container metadata in process memory and lists them
//! with the same prefix / delimiter / path semantics as the Swift API.
//! Used for tests and local development.

mod driver;

pub use driver::{MemoryBackend, MemoryBackendFactory};
