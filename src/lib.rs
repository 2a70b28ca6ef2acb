pub mod config;
pub mod credential;
pub mod error;
pub mod storage;
pub mod utils;

// Backend modules (point to project root drivers via path attribute) / 后端模块
#[path = "../drivers/mod.rs"]
pub mod drivers;

pub use config::{DriverConfig, RoutingMode};
pub use credential::Credential;
pub use error::{DriverError, Result};
pub use storage::{AdapterRegistry, ObjectStorageFileSystem, Timeouts};

/// Registry backed by a built-in backend, e.g. `"swift"` / 使用内置后端创建注册表
pub fn registry_for(backend_type: &str, timeouts: Timeouts) -> Result<AdapterRegistry> {
    let factory = drivers::factory(backend_type).ok_or_else(|| {
        DriverError::InvalidConfiguration(format!("unknown backend type: {}", backend_type))
    })?;
    tracing::info!("Object storage registry created (backend: {})", factory.backend_type());
    AdapterRegistry::with_timeouts(factory, timeouts)
}
