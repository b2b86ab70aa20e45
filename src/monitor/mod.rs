//! The polling scheduler: targets, the registry that holds them, the checker
//! that probes them, and the supervisor that runs one task per target.

pub mod checker;
pub mod registry;
pub mod sink;
pub mod supervisor;
pub mod target;
mod task;

#[cfg(test)]
pub(crate) mod test_support;

pub use checker::{CheckResult, Checker, Compliance, HttpChecker, ProbeFailure};
pub use registry::{RegistryError, TargetRegistry};
pub use sink::{ResultSink, StorageError};
pub use supervisor::{MonitorSupervisor, ReconcileSummary};
pub use target::{NewTarget, Target, TargetError, TargetUpdate, ValidationPattern};
