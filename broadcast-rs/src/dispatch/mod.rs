//! Batched bulk-operation execution engine
//!
//! This module executes one bulk operation with:
//! - Order-preserving batches of a fixed size, dispatched sequentially
//! - Bounded concurrency within a batch (settle-all, never fail-fast)
//! - Partial-failure tolerance: a destination failure is recorded, counted,
//!   and never aborts sibling sends
//! - Monotone progress reporting at bounded notification frequency
//! - Cooperative cancellation, polled only at batch boundaries
//!
//! Terminal operations stay queryable in an in-memory index for a retention
//! window, then are evicted; the permanent record lives in the ledger.

pub mod clock;
pub mod dispatcher;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::BatchDispatcher;
pub use types::{
    BulkOperation, BulkOperationSpec, DestinationRef, DispatchLimits, OperationKind,
    OperationResults, OperationStatus,
};
