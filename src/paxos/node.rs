/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Event-driven implementation of a Basic Paxos participant.
//!
//! Main type: [`PaxosNode`].

use std::{collections::BTreeMap, sync::mpsc::Sender, time::SystemTime};

use crate::{
    events::{
        AcceptEvent, CollectPromisesEvent, Event, PleaseAcceptEvent, PrepareEvent, PromiseEvent,
        ReceiveAcceptedEvent, ReceiveHeartbeatEvent, ReceivePleaseAcceptEvent, ReceivePrepareEvent,
        ReceivePromiseEvent, RejectPrepareEvent,
    },
    liveness::peer_registry::PeerRegistry,
    messages::{Accepted, Heartbeat, Message, NegativePromise, PleaseAccept, Prepare, Promise},
    networking::{
        sending::SenderHandle,
        transport::{Transport, TransportError},
    },
    types::data_types::{ExecutionId, PeerAddress, Value},
};

use super::{
    execution_state::{ExecutionState, ValueSource},
    quorum::have_majority,
};

/// One participant in Basic Paxos, acting as proposer, acceptor, and learner in every execution.
///
/// # Usage
///
/// `PaxosNode` is meant to be used in an "event-oriented" fashion. Its two most significant methods are:
/// 1. [`send_prepare`](Self::send_prepare) (or [`send_prepare_for`](Self::send_prepare_for)): called when
///    this node wants to propose a value.
/// 2. [`on_receive_msg`](Self::on_receive_msg): called whenever a message is received from the transport.
///    [`receive_messages`](Self::receive_messages) calls it for every message currently available.
///
/// The node never acts on its own. In particular, it relies on receiving its own broadcasts through the
/// transport to play the acceptor role for its own prepares.
pub struct PaxosNode<T: Transport> {
    node_id: PeerAddress,
    transport: T,
    sender_handle: SenderHandle<T>,
    peer_registry: PeerRegistry,
    execution_states: BTreeMap<ExecutionId, ExecutionState>,
    event_publisher: Option<Sender<Event>>,
}

impl<T: Transport> PaxosNode<T> {
    pub fn new(node_id: impl Into<PeerAddress>, transport: T) -> Self {
        Self {
            node_id: node_id.into(),
            sender_handle: SenderHandle::new(transport.clone()),
            transport,
            peer_registry: PeerRegistry::new(),
            execution_states: BTreeMap::new(),
            event_publisher: None,
        }
    }

    /// Publish an [`Event`] on `event_publisher` for every protocol step this node takes.
    pub fn with_event_publisher(mut self, event_publisher: Option<Sender<Event>>) -> Self {
        self.event_publisher = event_publisher;
        self
    }

    pub fn node_id(&self) -> &PeerAddress {
        &self.node_id
    }

    /// Replace the label this node uses for itself, e.g., with a discovered self address.
    pub fn set_node_id(&mut self, node_id: PeerAddress) {
        if node_id != self.node_id {
            log::info!("[{}] node id is now {}", self.node_id, node_id);
            self.node_id = node_id;
        }
    }

    pub fn peer_registry(&self) -> &PeerRegistry {
        &self.peer_registry
    }

    pub fn execution_state(&self, execution_id: ExecutionId) -> Option<&ExecutionState> {
        self.execution_states.get(&execution_id)
    }

    /// Ids of every execution this node has state for, in increasing order.
    pub fn execution_ids(&self) -> impl Iterator<Item = ExecutionId> + '_ {
        self.execution_states.keys().copied()
    }

    /// One more than the highest execution id this node has state for, or 1 if it has none.
    ///
    /// The id is only unique among the executions this node knows about: two nodes that start new
    /// executions at the same time may choose the same id. Fails if a peer has already used
    /// `i64::MAX`.
    pub fn next_execution_id(&self) -> Result<ExecutionId, PaxosError> {
        match self.execution_states.keys().next_back() {
            Some(highest) => highest
                .checked_add(1)
                .ok_or(PaxosError::ExecutionIdsExhausted),
            None => Ok(ExecutionId::new(1)),
        }
    }

    /// Start a new execution, proposing the value produced by `source`. Returns the id of the execution.
    pub fn send_prepare<F>(&mut self, source: F) -> Result<ExecutionId, PaxosError>
    where
        F: FnOnce() -> Value + Send + 'static,
    {
        let execution_id = self.next_execution_id()?;
        self.send_prepare_for(execution_id, source)?;
        Ok(execution_id)
    }

    /// Propose the value produced by `source` in execution `execution_id`, with a proposal number one
    /// higher than the highest this node has promised in the execution.
    ///
    /// `source` is called at most once, and only if a majority of promises arrives without any of them
    /// carrying a previously accepted value. It replaces any source given earlier for the execution.
    ///
    /// Fails without sending anything if the execution has already promised `i64::MAX`.
    pub fn send_prepare_for<F>(&mut self, execution_id: ExecutionId, source: F) -> Result<(), PaxosError>
    where
        F: FnOnce() -> Value + Send + 'static,
    {
        let state = self.execution_states.entry(execution_id).or_default();
        let n = state
            .prior_prepare_n()
            .checked_add(1)
            .ok_or(PaxosError::ProposalNumbersExhausted(execution_id))?;
        state.set_value_source(Box::new(source) as ValueSource);

        // `prior_prepare_n` is updated when this node receives its own prepare.
        let prepare = Prepare { execution_id, n };
        self.sender_handle.broadcast(prepare)?;
        log::debug!("[{}] sent {}", self.node_id, Message::from(prepare));

        Event::publish(
            &self.event_publisher,
            Event::Prepare(PrepareEvent {
                timestamp: SystemTime::now(),
                prepare,
            }),
        );
        Ok(())
    }

    /// Broadcast an arbitrary message, e.g., a heartbeat.
    pub fn send_message<M: Into<Message>>(&mut self, msg: M) -> Result<(), PaxosError> {
        let msg = msg.into();
        self.sender_handle.broadcast(msg.clone())?;
        log::debug!("[{}] sent {}", self.node_id, msg);
        Ok(())
    }

    /// Call [`on_receive_msg`](Self::on_receive_msg) on every message the transport has available right
    /// now. Errors are logged, and do not stop the remaining messages from being processed.
    ///
    /// Returns the number of messages processed.
    pub fn receive_messages(&mut self) -> usize {
        let mut processed = 0;
        while let Some((origin, msg)) = self.transport.recv() {
            processed += 1;
            if let Err(err) = self.on_receive_msg(origin, msg) {
                log::error!("[{}] error receiving message: {:?}", self.node_id, err);
            }
        }
        processed
    }

    /// Process a message received from `origin`.
    pub fn on_receive_msg(&mut self, origin: PeerAddress, msg: Message) -> Result<(), PaxosError> {
        log::debug!("[{}] received {} from {}", self.node_id, msg, origin);
        match msg {
            Message::Heartbeat(heartbeat) => {
                self.on_receive_heartbeat(heartbeat, origin);
                Ok(())
            }
            Message::Prepare(prepare) => self.on_receive_prepare(prepare, origin),
            Message::Promise(promise) => self.on_receive_promise(promise, origin),
            Message::NegativePromise(negative_promise) => {
                // Proposers are not pre-empted.
                log::debug!(
                    "[{}] ignoring {} from {}",
                    self.node_id,
                    Message::from(negative_promise),
                    origin
                );
                Ok(())
            }
            Message::PleaseAccept(please_accept) => self.on_receive_please_accept(please_accept, origin),
            Message::Accepted(accepted) => {
                self.on_receive_accepted(accepted, origin);
                Ok(())
            }
        }
    }

    fn on_receive_heartbeat(&mut self, heartbeat: Heartbeat, origin: PeerAddress) {
        let timestamp = SystemTime::now();
        self.peer_registry.update_peer_heartbeat(origin.clone(), timestamp);

        Event::publish(
            &self.event_publisher,
            Event::ReceiveHeartbeat(ReceiveHeartbeatEvent {
                timestamp,
                origin,
                heartbeat,
            }),
        );
    }

    /// Acceptor: promise `prepare.n` if it is higher than anything promised so far in the execution.
    fn on_receive_prepare(&mut self, prepare: Prepare, origin: PeerAddress) -> Result<(), PaxosError> {
        Event::publish(
            &self.event_publisher,
            Event::ReceivePrepare(ReceivePrepareEvent {
                timestamp: SystemTime::now(),
                origin: origin.clone(),
                prepare,
            }),
        );

        let state = self.execution_states.entry(prepare.execution_id).or_default();
        let prior_n = state.prior_prepare_n();
        let prior_accepted = state.highest_accepted();

        if prepare.n > prior_n {
            state.set_prior_prepare_n(prepare.n);

            let promise = Promise {
                execution_id: prepare.execution_id,
                promised_n: prepare.n,
                prior_accepted,
            };
            self.sender_handle.broadcast(promise)?;
            log::debug!("[{}] sent {}", self.node_id, Message::from(promise));

            Event::publish(
                &self.event_publisher,
                Event::Promise(PromiseEvent {
                    timestamp: SystemTime::now(),
                    promise,
                }),
            );
        } else {
            // TODO: broadcast negative promises once proposers handle them.
            let negative_promise = NegativePromise {
                execution_id: prepare.execution_id,
                n: prepare.n,
                prior_promised_n: prior_n,
                prior_accepted,
            };
            log::debug!(
                "[{}] not promising {} from {}, already promised {}",
                self.node_id,
                prepare.n,
                origin,
                prior_n
            );

            Event::publish(
                &self.event_publisher,
                Event::RejectPrepare(RejectPrepareEvent {
                    timestamp: SystemTime::now(),
                    origin,
                    negative_promise,
                }),
            );
        }

        Ok(())
    }

    /// Proposer: once promises from a majority of alive peers are held, ask acceptors to accept a value.
    fn on_receive_promise(&mut self, promise: Promise, origin: PeerAddress) -> Result<(), PaxosError> {
        Event::publish(
            &self.event_publisher,
            Event::ReceivePromise(ReceivePromiseEvent {
                timestamp: SystemTime::now(),
                origin: origin.clone(),
                promise,
            }),
        );

        let execution_id = promise.execution_id;
        let state = self.execution_states.entry(execution_id).or_default();
        state.insert_promise(origin, promise);

        let peers_alive = self.peer_registry.peers_alive();
        if !have_majority(&peers_alive, state.promises().keys()) {
            log::debug!(
                "[{}] {} of {} alive peers have promised in execution {}, no majority yet",
                self.node_id,
                state.promises().len(),
                peers_alive.len(),
                execution_id
            );
            return Ok(());
        }

        Event::publish(
            &self.event_publisher,
            Event::CollectPromises(CollectPromisesEvent {
                timestamp: SystemTime::now(),
                execution_id,
                n: promise.promised_n,
                promisers: state.promises().len(),
                peers_alive: peers_alive.len(),
            }),
        );

        let value = match state.highest_prior_accepted() {
            Some(prior) => {
                log::debug!(
                    "[{}] forced to propose {}, accepted under {}",
                    self.node_id,
                    prior.value,
                    prior.number
                );
                prior.value
            }
            None => match state.pick_proposed_value() {
                Some(value) => value,
                None => {
                    log::debug!(
                        "[{}] no value to propose in execution {}",
                        self.node_id,
                        execution_id
                    );
                    return Ok(());
                }
            },
        };

        let please_accept = PleaseAccept {
            execution_id,
            n: promise.promised_n,
            value,
        };
        if state.prior_sent_please_accept().contains(&please_accept) {
            log::debug!("[{}] not sending duplicate {}", self.node_id, Message::from(please_accept));
            return Ok(());
        }

        self.sender_handle.broadcast(please_accept)?;
        state.record_sent_please_accept(please_accept);
        log::debug!("[{}] sent {}", self.node_id, Message::from(please_accept));

        Event::publish(
            &self.event_publisher,
            Event::PleaseAccept(PleaseAcceptEvent {
                timestamp: SystemTime::now(),
                please_accept,
            }),
        );
        Ok(())
    }

    /// Acceptor: accept `please_accept` unless it is already decided for its `n`, or a higher proposal has
    /// been promised.
    fn on_receive_please_accept(
        &mut self,
        please_accept: PleaseAccept,
        origin: PeerAddress,
    ) -> Result<(), PaxosError> {
        Event::publish(
            &self.event_publisher,
            Event::ReceivePleaseAccept(ReceivePleaseAcceptEvent {
                timestamp: SystemTime::now(),
                origin,
                please_accept,
            }),
        );

        let PleaseAccept {
            execution_id,
            n,
            value,
        } = please_accept;
        let state = self.execution_states.entry(execution_id).or_default();

        // Only ever accept a single value per proposal number.
        if state.accepts().contains_key(&n) {
            return Ok(());
        }

        // Promises for a number equal to `n` do not conflict.
        if let Some((promiser, conflict)) = state.conflicting_promise(n) {
            log::debug!(
                "[{}] not accepting {}, {} promised {}",
                self.node_id,
                Message::from(please_accept),
                promiser,
                conflict.promised_n
            );
            return Ok(());
        }
        if n < state.prior_prepare_n() {
            log::debug!(
                "[{}] not accepting {}, promised {}",
                self.node_id,
                Message::from(please_accept),
                state.prior_prepare_n()
            );
            return Ok(());
        }

        state.insert_accept(n, value);
        let accepted = Accepted {
            execution_id,
            n,
            value,
        };
        self.sender_handle.broadcast(accepted)?;
        log::debug!("[{}] sent {}", self.node_id, Message::from(accepted));

        Event::publish(
            &self.event_publisher,
            Event::Accept(AcceptEvent {
                timestamp: SystemTime::now(),
                accepted,
            }),
        );
        Ok(())
    }

    /// Learner: record the acceptance.
    fn on_receive_accepted(&mut self, accepted: Accepted, origin: PeerAddress) {
        self.execution_states
            .entry(accepted.execution_id)
            .or_default()
            .insert_accepted_message(origin.clone(), accepted);

        Event::publish(
            &self.event_publisher,
            Event::ReceiveAccepted(ReceiveAcceptedEvent {
                timestamp: SystemTime::now(),
                origin,
                accepted,
            }),
        );
    }
}

#[derive(Debug)]
pub enum PaxosError {
    Transport(TransportError),

    /// Some execution already has id `i64::MAX`, so no new id can be allocated.
    ExecutionIdsExhausted,

    /// The execution has promised `i64::MAX`, so no higher proposal number exists.
    ProposalNumbersExhausted(ExecutionId),
}

impl From<TransportError> for PaxosError {
    fn from(value: TransportError) -> Self {
        PaxosError::Transport(value)
    }
}
