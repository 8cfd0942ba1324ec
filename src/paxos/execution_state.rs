/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The state one node keeps for one execution.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::{self, Debug, Formatter},
};

use crate::{
    messages::{Accepted, PleaseAccept, Promise},
    types::data_types::{AcceptedProposal, PeerAddress, ProposalNumber, Value},
};

/// Produces the value a node would like an execution to decide on. Called at most once, and only if the
/// node gets to choose the value.
pub type ValueSource = Box<dyn FnOnce() -> Value + Send>;

/// State for one node, for one execution. An execution may take several rounds of
/// prepare, promise, please-accept and accepted before the cluster reaches consensus.
pub struct ExecutionState {
    /// Highest proposal number this node has promised, as an acceptor.
    prior_prepare_n: ProposalNumber,
    /// Latest promise received from each peer.
    promises: HashMap<PeerAddress, Promise>,
    prior_sent_please_accept: HashSet<PleaseAccept>,
    /// Accepted proposals, as an acceptor.
    accepts: BTreeMap<ProposalNumber, Value>,
    /// Every `Accepted` received, as a learner.
    accepted_messages: HashSet<(PeerAddress, Accepted)>,
    desired_value: Option<Value>,
    desired_value_source: Option<ValueSource>,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionState {
    pub fn new() -> Self {
        Self {
            prior_prepare_n: ProposalNumber::ZERO,
            promises: HashMap::new(),
            prior_sent_please_accept: HashSet::new(),
            accepts: BTreeMap::new(),
            accepted_messages: HashSet::new(),
            desired_value: None,
            desired_value_source: None,
        }
    }

    pub fn prior_prepare_n(&self) -> ProposalNumber {
        self.prior_prepare_n
    }

    pub fn promises(&self) -> &HashMap<PeerAddress, Promise> {
        &self.promises
    }

    pub fn prior_sent_please_accept(&self) -> &HashSet<PleaseAccept> {
        &self.prior_sent_please_accept
    }

    pub fn accepts(&self) -> &BTreeMap<ProposalNumber, Value> {
        &self.accepts
    }

    pub fn accepted_messages(&self) -> &HashSet<(PeerAddress, Accepted)> {
        &self.accepted_messages
    }

    /// The value this node chose for itself, if its value source has been called.
    pub fn desired_value(&self) -> Option<Value> {
        self.desired_value
    }

    pub fn has_value_source(&self) -> bool {
        self.desired_value_source.is_some()
    }

    /// The highest-numbered proposal this node has accepted.
    pub fn highest_accepted(&self) -> Option<AcceptedProposal> {
        self.accepts
            .iter()
            .next_back()
            .map(|(n, value)| AcceptedProposal::new(*n, *value))
    }

    /// Among the stored promises, the prior accepted proposal with the highest number.
    pub fn highest_prior_accepted(&self) -> Option<AcceptedProposal> {
        self.promises
            .values()
            .filter_map(|promise| promise.prior_accepted)
            .max_by_key(|prior| prior.number)
    }

    /// A stored promise that forbids accepting a proposal numbered `n`, if there is one.
    pub fn conflicting_promise(&self, n: ProposalNumber) -> Option<(&PeerAddress, &Promise)> {
        self.promises
            .iter()
            .find(|(_, promise)| promise.promised_n > n)
    }

    /// The value this node wants, calling the value source the first time if needed. `None` if the node
    /// has no value source, i.e., does not care which value is chosen.
    pub fn pick_proposed_value(&mut self) -> Option<Value> {
        if let Some(value) = self.desired_value {
            return Some(value);
        }
        let source = self.desired_value_source.take()?;
        let value = source();
        self.desired_value = Some(value);
        Some(value)
    }

    pub(crate) fn set_prior_prepare_n(&mut self, n: ProposalNumber) {
        self.prior_prepare_n = n;
    }

    pub(crate) fn set_value_source(&mut self, source: ValueSource) {
        self.desired_value_source = Some(source);
    }

    pub(crate) fn insert_promise(&mut self, origin: PeerAddress, promise: Promise) {
        self.promises.insert(origin, promise);
    }

    pub(crate) fn record_sent_please_accept(&mut self, please_accept: PleaseAccept) {
        self.prior_sent_please_accept.insert(please_accept);
    }

    pub(crate) fn insert_accept(&mut self, n: ProposalNumber, value: Value) {
        self.accepts.insert(n, value);
    }

    pub(crate) fn insert_accepted_message(&mut self, origin: PeerAddress, accepted: Accepted) {
        self.accepted_messages.insert((origin, accepted));
    }
}

impl Debug for ExecutionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionState")
            .field("prior_prepare_n", &self.prior_prepare_n)
            .field("promises", &self.promises)
            .field("prior_sent_please_accept", &self.prior_sent_please_accept)
            .field("accepts", &self.accepts)
            .field("accepted_messages", &self.accepted_messages)
            .field("desired_value", &self.desired_value)
            .field("has_value_source", &self.desired_value_source.is_some())
            .finish()
    }
}
