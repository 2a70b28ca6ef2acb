// Backend package / 后端驱动包
pub mod memory;
pub mod swift;

use std::sync::Arc;

use crate::storage::BackendFactory;

/// All built-in backend factories / 所有内置后端工厂
pub fn builtin_factories() -> Vec<Arc<dyn BackendFactory>> {
    let mut factories: Vec<Arc<dyn BackendFactory>> = Vec::new();
    // OpenStack Swift over Keystone v3 / Swift对象存储
    factories.push(Arc::new(swift::SwiftBackendFactory));
    // In-process store / 内存存储
    factories.push(Arc::new(memory::MemoryBackendFactory));
    factories
}

/// Look up a built-in factory by backend type / 按类型查找后端工厂
pub fn factory(backend_type: &str) -> Option<Arc<dyn BackendFactory>> {
    builtin_factories()
        .into_iter()
        .find(|f| f.backend_type().eq_ignore_ascii_case(backend_type.trim()))
}
