//! Types that are used across multiple components of the crate.
//!
//! Types specific to a single component can be found next to that component, e.g.,
//! [`crate::paxos::execution_state`].

pub mod data_types;
