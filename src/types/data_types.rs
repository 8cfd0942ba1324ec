/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store integers or addresses, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    hash::Hash,
};

/// Number that identifies one independent instance ("execution") of the consensus protocol.
///
/// Execution ids are minted locally by a node as `max(known ids) + 1`. Two nodes that start a "new"
/// execution at the same time may therefore pick the same id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ExecutionId(i64);

impl ExecutionId {
    /// Create a new `ExecutionId` with an `int` value.
    pub const fn new(int: i64) -> Self {
        Self(int)
    }

    /// Get the `i64` value of this `ExecutionId`.
    pub const fn int(&self) -> i64 {
        self.0
    }

    /// `self + rhs`, or `None` on overflow. Execution ids arrive from peers, so any `i64` is possible.
    pub const fn checked_add(self, rhs: i64) -> Option<ExecutionId> {
        match self.0.checked_add(rhs) {
            Some(int) => Some(ExecutionId(int)),
            None => None,
        }
    }
}

impl Display for ExecutionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Proposal number ("N") chosen by a proposer for one attempt at consensus within an execution.
///
/// Proposal numbers start at 1. An acceptor that has promised nothing yet for an execution has a prior
/// prepare number of [`ProposalNumber::ZERO`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ProposalNumber(i64);

impl ProposalNumber {
    /// The prior prepare number of an execution that has not promised anything.
    pub const ZERO: ProposalNumber = ProposalNumber(0);

    /// Create a new `ProposalNumber` with an `int` value.
    pub const fn new(int: i64) -> Self {
        Self(int)
    }

    /// Get the `i64` value of this `ProposalNumber`.
    pub const fn int(&self) -> i64 {
        self.0
    }

    /// `self + rhs`, or `None` on overflow.
    pub const fn checked_add(self, rhs: i64) -> Option<ProposalNumber> {
        match self.0.checked_add(rhs) {
            Some(int) => Some(ProposalNumber(int)),
            None => None,
        }
    }
}

impl Display for ProposalNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The value that an execution decides on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Value(i64);

impl Value {
    /// Create a new `Value` with an `int` value.
    pub const fn new(int: i64) -> Self {
        Self(int)
    }

    /// Get the `i64` value of this `Value`.
    pub const fn int(&self) -> i64 {
        self.0
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Random identifier attached to each heartbeat, used to recognize a node's own heartbeats when they are
/// echoed back by the broadcast medium.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct HeartbeatId(i64);

impl HeartbeatId {
    /// Create a new `HeartbeatId` with an `int` value.
    pub const fn new(int: i64) -> Self {
        Self(int)
    }

    /// Get the `i64` value of this `HeartbeatId`.
    pub const fn int(&self) -> i64 {
        self.0
    }
}

impl Display for HeartbeatId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Address that a message appears to originate from, as observed by the receiving transport.
///
/// The address is never put on the wire by the sender. It is stamped on every delivered message by the
/// [`Transport`](crate::networking::transport::Transport) from the origin of the underlying packet (or,
/// in the [in-memory interconnect](crate::networking::in_memory), from the sending node's id).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Create a new `PeerAddress` wrapping `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Get the inner address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PeerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for PeerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl From<&str> for PeerAddress {
    fn from(value: &str) -> Self {
        PeerAddress::new(value)
    }
}

impl From<String> for PeerAddress {
    fn from(value: String) -> Self {
        PeerAddress(value)
    }
}

/// A proposal that an acceptor has accepted: the proposal number it was accepted under, and the value.
///
/// Carried by [`Promise`](crate::messages::Promise) and
/// [`NegativePromise`](crate::messages::NegativePromise) messages to report the highest-numbered
/// proposal the sending acceptor has accepted so far. Absence is represented with `Option::None`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct AcceptedProposal {
    pub number: ProposalNumber,
    pub value: Value,
}

impl AcceptedProposal {
    pub const fn new(number: ProposalNumber, value: Value) -> Self {
        Self { number, value }
    }
}
