//! Order lifecycle: registration, reconciliation and timeout sweeps

mod lifecycle;

pub use lifecycle::{ActiveOrder, OrderLifecycleManager, SweepOutcome};
