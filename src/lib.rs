/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Basic Paxos among a dynamically discovered set of peers on a shared broadcast medium.
//!
//! Every node is proposer, acceptor, and learner at once, and runs any number of independent consensus
//! instances ("executions"). Peers are discovered through periodic heartbeats, and the set of peers that
//! have ever sent a heartbeat is the set that quorums are computed against.
//!
//! ## Layout
//!
//! - [`messages`] and [`codec`]: what nodes say to each other, and how it looks on the wire.
//! - [`networking`]: the [`Transport`](networking::transport::Transport) trait, and an in-memory and a
//!   packet-based implementation of it.
//! - [`liveness`]: the peer registry and self-address discovery.
//! - [`paxos`]: the protocol itself.
//! - [`runtime`]: threads that run a node in the background.
//! - [`events`] and [`logging`]: observing what nodes do.

pub mod types;

pub mod messages;

pub mod codec;

pub mod networking;

pub mod liveness;

pub mod paxos;

pub mod events;

pub mod logging;

pub(crate) mod event_bus;

pub mod runtime;
