//! Heartbeat-driven knowledge about the other nodes on the medium, and about this node itself.
//!
//! - [`peer_registry`] remembers when a heartbeat was last received from each address. The set of known
//!   addresses is the "alive" set that quorum computations are made against.
//! - [`self_address`] recognizes this node's own heartbeats when the medium echoes them back, and thereby
//!   learns the address that this node's broadcasts appear to come from.

pub mod peer_registry;

pub mod self_address;
