/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A deterministic, in-memory broadcast medium.
//!
//! Each [`InMemoryTransport`] owns an outbound and an inbound queue. An [`InMemoryInterconnect`] links the
//! transports of a fixed set of nodes together: every call to [`exchange_once`](InMemoryInterconnect::exchange_once)
//! moves at most one message out of each node's outbound queue and delivers a copy of it to every node's
//! inbound queue, including the sender's own.
//!
//! Nothing moves between queues unless the interconnect is driven, so tests can interleave message
//! exchange and message processing in any order they like. The interconnect is meant to be driven from a
//! single thread: [`drain_queues`](InMemoryInterconnect::drain_queues) assumes nobody enqueues new
//! outbound messages while it runs.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{messages::Message, types::data_types::PeerAddress};

use super::transport::{Transport, TransportError};

#[derive(Default)]
struct Queues {
    outbound: VecDeque<Message>,
    inbound: VecDeque<(PeerAddress, Message)>,
}

/// One node's handle to an [`InMemoryInterconnect`].
///
/// Clones share the same queues.
#[derive(Clone)]
pub struct InMemoryTransport {
    node_id: PeerAddress,
    queues: Arc<Mutex<Queues>>,
}

impl InMemoryTransport {
    fn new(node_id: PeerAddress) -> Self {
        Self {
            node_id,
            queues: Arc::new(Mutex::new(Queues::default())),
        }
    }

    /// The address that messages sent through this transport are stamped with on delivery.
    pub fn node_id(&self) -> &PeerAddress {
        &self.node_id
    }

    /// Number of messages waiting to be picked up by the interconnect.
    pub fn outbound_len(&self) -> usize {
        self.queues().outbound.len()
    }

    /// Number of delivered messages waiting to be received.
    pub fn inbound_len(&self) -> usize {
        self.queues().inbound.len()
    }

    /// Reorder the pending inbound queue so that messages are grouped by source, with the groups appearing
    /// in the order given by `order`. Messages from a single source keep their relative order. Messages
    /// from sources not listed in `order` are dropped.
    pub fn reorder_inbound_by_source(&self, order: &[PeerAddress]) {
        let mut queues = self.queues();
        let mut by_source: HashMap<PeerAddress, VecDeque<Message>> = HashMap::new();
        for (source, msg) in queues.inbound.drain(..) {
            by_source.entry(source).or_default().push_back(msg);
        }

        for source in order {
            if let Some(msgs) = by_source.remove(source) {
                queues
                    .inbound
                    .extend(msgs.into_iter().map(|msg| (source.clone(), msg)));
            }
        }

        let dropped: usize = by_source.values().map(VecDeque::len).sum();
        if dropped > 0 {
            log::debug!("{} dropped {} inbound messages while reordering", self.node_id, dropped);
        }
    }

    fn pop_outbound(&self) -> Option<Message> {
        self.queues().outbound.pop_front()
    }

    fn deliver(&self, source: PeerAddress, msg: Message) {
        self.queues().inbound.push_back((source, msg));
    }

    fn queues(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for InMemoryTransport {
    fn send(&mut self, message: Message) -> Result<(), TransportError> {
        self.queues().outbound.push_back(message);
        Ok(())
    }

    fn recv(&mut self) -> Option<(PeerAddress, Message)> {
        self.queues().inbound.pop_front()
    }
}

/// Record of one message delivered by an [`InMemoryInterconnect`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct HistoryEntry {
    pub src: PeerAddress,
    pub dst: PeerAddress,
    pub message: Message,
}

/// Links the [`InMemoryTransport`]s of a fixed set of nodes into a simulated broadcast medium.
#[derive(Default)]
pub struct InMemoryInterconnect {
    nodes: Vec<InMemoryTransport>,
    history: Vec<HistoryEntry>,
}

impl InMemoryInterconnect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new node with the given id and return its transport. Nodes are serviced in registration
    /// order.
    pub fn add_node(&mut self, node_id: impl Into<PeerAddress>) -> InMemoryTransport {
        let transport = InMemoryTransport::new(node_id.into());
        self.nodes.push(transport.clone());
        transport
    }

    /// For each node in registration order, pop at most one message from its outbound queue and deliver a
    /// copy, stamped with the node's id, to every registered node (including the sender).
    ///
    /// Returns the number of messages that were popped.
    pub fn exchange_once(&mut self) -> usize {
        let mut popped = 0;
        for sender in &self.nodes {
            let msg = match sender.pop_outbound() {
                Some(msg) => msg,
                None => continue,
            };
            popped += 1;
            log::debug!("{} broadcasts {}", sender.node_id, msg);

            for receiver in &self.nodes {
                receiver.deliver(sender.node_id.clone(), msg.clone());
                self.history.push(HistoryEntry {
                    src: sender.node_id.clone(),
                    dst: receiver.node_id.clone(),
                    message: msg.clone(),
                });
            }
        }
        popped
    }

    /// Call [`exchange_once`](Self::exchange_once) until every node's outbound queue is observed empty after
    /// the same pass.
    pub fn drain_queues(&mut self) {
        loop {
            self.exchange_once();
            if self.nodes.iter().all(|node| node.outbound_len() == 0) {
                return;
            }
        }
    }

    /// Every delivery made so far, in delivery order.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Transports of every registered node, in registration order.
    pub fn nodes(&self) -> &[InMemoryTransport] {
        &self.nodes
    }
}
