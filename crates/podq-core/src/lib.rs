//! podq core: queue parsing, per-host download scheduling, storage, and
//! queue reconciliation.

pub mod logging;

pub mod error;
pub mod fetch;
pub mod queue;
pub mod reconcile;
pub mod scheduler;
pub mod storage;
