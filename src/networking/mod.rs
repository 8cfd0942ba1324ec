/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable broadcast networking.
//!
//! Nodes interact with the broadcast medium through implementations of the [`Transport`](transport::Transport)
//! trait. Two implementations ship with the crate:
//! 1. [`InMemoryTransport`](in_memory::InMemoryTransport), driven deterministically by an
//!    [`InMemoryInterconnect`](in_memory::InMemoryInterconnect), for tests and simulation.
//! 2. [`PacketTransport`](packet::PacketTransport), which adapts any datagram-style
//!    [`PacketChannel`](packet::PacketChannel) (e.g., a UDP multicast socket) using the [codec](crate::codec).

pub mod transport;

pub mod in_memory;

pub mod packet;

pub(crate) mod receiving;

pub(crate) mod sending;
