//! Component Lifecycle
//!
//! Every component instance moves through a fixed set of phases:
//!
//! ```text
//! Initializing -> Mounting -> Mounted <-> Updating
//!                                |            |
//!                                v            v
//!                            Unmounting -> Unmounted
//! ```
//!
//! Any non-terminal phase may fall into `Error`, from which the instance can
//! still be unmounted. The [`LifecycleManager`] enforces the table, assigns
//! instance ids and keeps a phase record for each mounted instance until it
//! unmounts.

mod id;
mod manager;
mod phase;

pub use id::{InstanceId, InstanceIdGenerator, SequentialIds};
pub use manager::LifecycleManager;
pub use phase::{LifecycleOperation, LifecyclePhase};
