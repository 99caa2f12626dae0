//! Host Runtime Contracts
//!
//! The bridge sits inside a host agent runtime that owns an in-process
//! publish/subscribe bus and a type-keyed instance container. This module
//! defines those two contracts and ships a small in-process implementation
//! of each, used by the binary and the tests.

mod bus;
mod event;
mod registry;

pub use bus::{EventBus, EventHandler, LocalEventBus};
pub use event::{Event, Profile};
pub use registry::{Registry, RegistryError};
