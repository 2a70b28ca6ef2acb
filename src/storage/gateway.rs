//! Blocking gateway over the async backend / 异步后端的阻塞网关
//!
//! The gateway owns a dedicated multi-thread runtime. Each call spawns the
//! backend future on that runtime and blocks the calling thread until the
//! future completes or the budget of its timeout class runs out.
//!
//! Expiry abandons the call, it does not cancel it: the spawned task keeps
//! running (and holding its connection) until the backend answers or the
//! gateway is dropped. The caller only gets its thread back.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{CONTROL_PLANE_TIMEOUT, DATA_PLANE_TIMEOUT};
use crate::error::{DriverError, Result};

/// Which budget bounds a call / 超时类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeoutClass {
    /// Existence checks, metadata, listings, deletes / 控制面
    ControlPlane,
    /// Full object reads and writes / 数据面
    DataPlane,
}

impl fmt::Display for TimeoutClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutClass::ControlPlane => write!(f, "control-plane"),
            TimeoutClass::DataPlane => write!(f, "data-plane"),
        }
    }
}

/// Wait budgets / 等待预算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    pub control_plane: Duration,
    pub data_plane: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            control_plane: CONTROL_PLANE_TIMEOUT,
            data_plane: DATA_PLANE_TIMEOUT,
        }
    }
}

impl Timeouts {
    pub fn budget(&self, class: TimeoutClass) -> Duration {
        match class {
            TimeoutClass::ControlPlane => self.control_plane,
            TimeoutClass::DataPlane => self.data_plane,
        }
    }
}

/// Call-with-deadline facade / 带截止时间的同步调用
///
/// Dropping the gateway shuts its runtime down in the background, so the last
/// `Arc` may be released from any thread, async contexts included.
pub struct BlockingGateway {
    runtime: Option<tokio::runtime::Runtime>,
    timeouts: Timeouts,
}

impl BlockingGateway {
    /// Create a gateway with its own runtime (4 worker threads)
    pub fn new(timeouts: Timeouts) -> Result<Self> {
        Self::with_worker_threads(timeouts, 4)
    }

    pub fn with_worker_threads(timeouts: Timeouts, worker_threads: usize) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("objstore-gateway")
            .enable_all()
            .build()
            .map_err(|e| DriverError::Runtime(format!("failed to create gateway runtime: {}", e)))?;

        Ok(Self {
            runtime: Some(runtime),
            timeouts,
        })
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Run `future` and block until it finishes or the class budget expires.
    ///
    /// Must be called from a plain thread: calling it from inside an async
    /// context returns [`DriverError::Runtime`]. On expiry the backend call is
    /// left running in the background and [`DriverError::Timeout`] is returned.
    pub fn call<F, T>(&self, class: TimeoutClass, future: F) -> Result<T>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(DriverError::Runtime(
                "blocking gateway called from inside an async runtime".to_string(),
            ));
        }

        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| DriverError::Runtime("gateway runtime is shut down".to_string()))?;

        let budget = self.timeouts.budget(class);
        let task = runtime.spawn(future);

        // Dropping the JoinHandle on expiry detaches the task.
        let outcome = runtime.block_on(async move { tokio::time::timeout(budget, task).await });

        match outcome {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(DriverError::Backend(e)),
            Ok(Err(join_error)) => Err(DriverError::Runtime(format!(
                "backend task failed: {}",
                join_error
            ))),
            Err(_) => {
                tracing::warn!("{} call abandoned after {:?}", class, budget);
                Err(DriverError::Timeout { class, budget })
            }
        }
    }

    /// Shorthand for [`TimeoutClass::ControlPlane`]
    pub fn control<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.call(TimeoutClass::ControlPlane, future)
    }

    /// Shorthand for [`TimeoutClass::DataPlane`]
    pub fn data<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.call(TimeoutClass::DataPlane, future)
    }
}

// `Runtime::drop` blocks and panics inside an async context.
impl Drop for BlockingGateway {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for BlockingGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingGateway")
            .field("timeouts", &self.timeouts)
            .finish()
    }
}
