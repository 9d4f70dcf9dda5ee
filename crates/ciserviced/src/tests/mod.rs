//! Crate-level tests exercising the daemon through its internal seams.

mod process_behaviour;
pub(crate) mod support;
