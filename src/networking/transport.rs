/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Transport`] trait and its error type.

use std::io;

use crate::messages::Message;
use crate::types::data_types::PeerAddress;

/// A handle to a broadcast medium.
///
/// Implementations must:
/// 1. Deliver every message sent through any handle to every node on the medium, **including the
///    sender itself**. Nodes rely on receiving their own broadcasts to play the acceptor and learner
///    roles for their own proposals, and to discover their own address.
/// 2. Stamp each delivered message with the [`PeerAddress`] it was received from.
pub trait Transport: Clone + Send {
    /// Enqueue `message` for broadcast without blocking.
    fn send(&mut self, message: Message) -> Result<(), TransportError>;

    /// Receive a message from any peer. Returns immediately with a `None` if no message is available now.
    fn recv(&mut self) -> Option<(PeerAddress, Message)>;
}

#[derive(Debug)]
pub enum TransportError {
    /// The underlying channel failed.
    Io(io::Error),
}

impl From<io::Error> for TransportError {
    fn from(value: io::Error) -> Self {
        TransportError::Io(value)
    }
}
