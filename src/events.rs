/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events that a node emits as it runs the protocol.
//!
//! An event for a given action indicates that the action has been completed. Every event carries the
//! time it was emitted.
//!
//! Events are the intended way for an observer to decide whether consensus has been reached in an
//! execution: the node itself never declares a decision. An observer that sees [`ReceiveAcceptedEvent`]s
//! for the same `(execution_id, n, value)` from a majority of peers knows that `value` was chosen.
//!
//! Handlers for these events can be registered through the [`RuntimeSpec`](crate::runtime::RuntimeSpec)
//! builder, and are invoked on the event bus thread.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::messages::{Accepted, Heartbeat, NegativePromise, PleaseAccept, Prepare, Promise};
use crate::types::data_types::{ExecutionId, PeerAddress, ProposalNumber};

pub enum Event {
    // Events that involve receiving a Heartbeat.
    ReceiveHeartbeat(ReceiveHeartbeatEvent),
    DiscoverSelfAddress(DiscoverSelfAddressEvent),
    // Proposer events.
    Prepare(PrepareEvent),
    ReceivePromise(ReceivePromiseEvent),
    CollectPromises(CollectPromisesEvent),
    PleaseAccept(PleaseAcceptEvent),
    // Acceptor events.
    ReceivePrepare(ReceivePrepareEvent),
    Promise(PromiseEvent),
    RejectPrepare(RejectPrepareEvent),
    ReceivePleaseAccept(ReceivePleaseAcceptEvent),
    Accept(AcceptEvent),
    // Learner events.
    ReceiveAccepted(ReceiveAcceptedEvent),
}

impl Event {
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            // The event bus may already have shut down.
            let _ = event_publisher.send(event);
        }
    }
}

/// A heartbeat was received from `origin`, and the peer registry updated.
pub struct ReceiveHeartbeatEvent {
    pub timestamp: SystemTime,
    pub origin: PeerAddress,
    pub heartbeat: Heartbeat,
}

/// Enough of this node's own heartbeats were echoed back from `address` for it to be adopted as this
/// node's id.
pub struct DiscoverSelfAddressEvent {
    pub timestamp: SystemTime,
    pub address: PeerAddress,
}

/// This node broadcast a prepare.
pub struct PrepareEvent {
    pub timestamp: SystemTime,
    pub prepare: Prepare,
}

pub struct ReceivePrepareEvent {
    pub timestamp: SystemTime,
    pub origin: PeerAddress,
    pub prepare: Prepare,
}

/// This node, as an acceptor, broadcast a promise.
pub struct PromiseEvent {
    pub timestamp: SystemTime,
    pub promise: Promise,
}

/// This node, as an acceptor, refused a prepare from `origin`. The negative promise is not transmitted.
pub struct RejectPrepareEvent {
    pub timestamp: SystemTime,
    pub origin: PeerAddress,
    pub negative_promise: NegativePromise,
}

pub struct ReceivePromiseEvent {
    pub timestamp: SystemTime,
    pub origin: PeerAddress,
    pub promise: Promise,
}

/// This node holds promises from a majority of the peers it knows, for execution `execution_id`. `n` is
/// the proposal number of the promise that completed the majority.
pub struct CollectPromisesEvent {
    pub timestamp: SystemTime,
    pub execution_id: ExecutionId,
    pub n: ProposalNumber,
    pub promisers: usize,
    pub peers_alive: usize,
}

/// This node, as a proposer, broadcast a request to accept a value.
pub struct PleaseAcceptEvent {
    pub timestamp: SystemTime,
    pub please_accept: PleaseAccept,
}

pub struct ReceivePleaseAcceptEvent {
    pub timestamp: SystemTime,
    pub origin: PeerAddress,
    pub please_accept: PleaseAccept,
}

/// This node, as an acceptor, accepted a value and broadcast that it did.
pub struct AcceptEvent {
    pub timestamp: SystemTime,
    pub accepted: Accepted,
}

/// This node, as a learner, recorded that `origin` accepted a value.
pub struct ReceiveAcceptedEvent {
    pub timestamp: SystemTime,
    pub origin: PeerAddress,
    pub accepted: Accepted,
}
