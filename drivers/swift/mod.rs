//! OpenStack Swift object storage driver / OpenStack Swift 对象存储驱动
//!
//! Authenticates against Keystone v3 with the decoded connection string and
//! talks to the public object-store endpoint of the configured region.

mod auth;
mod driver;
mod types;

pub use auth::{AuthSession, KeystoneAuth};
pub use driver::{SwiftBackend, SwiftBackendFactory};
