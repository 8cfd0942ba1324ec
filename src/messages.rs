/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Exhaustive enumeration of every message variant exchanged between nodes.
//!
//! Messages are immutable values. The address a message was received from is not part of the message:
//! transports deliver it alongside the message as a `(PeerAddress, Message)` pair.

use std::fmt::{self, Display, Formatter};

use crate::types::data_types::{
    AcceptedProposal, ExecutionId, HeartbeatId, ProposalNumber, Value,
};

/// All message variants used by a [`PaxosNode`](crate::paxos::node::PaxosNode).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Message {
    /// See: [`Heartbeat`].
    Heartbeat(Heartbeat),

    /// See: [`Prepare`].
    Prepare(Prepare),

    /// See: [`Promise`].
    Promise(Promise),

    /// See: [`NegativePromise`].
    NegativePromise(NegativePromise),

    /// See: [`PleaseAccept`].
    PleaseAccept(PleaseAccept),

    /// See: [`Accepted`].
    Accepted(Accepted),
}

impl Message {
    pub fn heartbeat(uuid: HeartbeatId) -> Message {
        Message::Heartbeat(Heartbeat { uuid })
    }

    pub fn prepare(execution_id: ExecutionId, n: ProposalNumber) -> Message {
        Message::Prepare(Prepare { execution_id, n })
    }

    pub fn promise(
        execution_id: ExecutionId,
        promised_n: ProposalNumber,
        prior_accepted: Option<AcceptedProposal>,
    ) -> Message {
        Message::Promise(Promise {
            execution_id,
            promised_n,
            prior_accepted,
        })
    }

    pub fn please_accept(execution_id: ExecutionId, n: ProposalNumber, value: Value) -> Message {
        Message::PleaseAccept(PleaseAccept {
            execution_id,
            n,
            value,
        })
    }

    pub fn accepted(execution_id: ExecutionId, n: ProposalNumber, value: Value) -> Message {
        Message::Accepted(Accepted {
            execution_id,
            n,
            value,
        })
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Message::Heartbeat(msg) => write!(f, "<Heartbeat uuid={} />", msg.uuid),
            Message::Prepare(msg) => {
                write!(f, "<Prepare executionId={} N={} />", msg.execution_id, msg.n)
            }
            Message::Promise(msg) => write!(
                f,
                "<Promise executionId={} promiseN={} priorAccepted={} />",
                msg.execution_id,
                msg.promised_n,
                DisplayPrior(&msg.prior_accepted)
            ),
            Message::NegativePromise(msg) => write!(
                f,
                "<NegativePromise executionId={} N={} priorPromisedN={} priorAccepted={} />",
                msg.execution_id,
                msg.n,
                msg.prior_promised_n,
                DisplayPrior(&msg.prior_accepted)
            ),
            Message::PleaseAccept(msg) => write!(
                f,
                "<PleaseAccept executionId={} N={} V={} />",
                msg.execution_id, msg.n, msg.value
            ),
            Message::Accepted(msg) => write!(
                f,
                "<Accepted executionId={} N={} V={} />",
                msg.execution_id, msg.n, msg.value
            ),
        }
    }
}

struct DisplayPrior<'a>(&'a Option<AcceptedProposal>);

impl Display for DisplayPrior<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(AcceptedProposal { number, value }) => write!(f, "(N={}, V={})", number, value),
            None => f.write_str("none"),
        }
    }
}

/// Liveness signal, periodically broadcast by every node.
///
/// Receiving a heartbeat registers its source in the receiver's
/// [`PeerRegistry`](crate::liveness::peer_registry::PeerRegistry). A node that receives its own
/// heartbeat back (recognized by `uuid`) learns which address its broadcasts appear to come from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Heartbeat {
    pub uuid: HeartbeatId,
}

/// A proposer's phase-1 request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Prepare {
    pub execution_id: ExecutionId,
    pub n: ProposalNumber,
}

/// An acceptor's phase-1 reply: it will not accept proposals numbered below `promised_n`.
///
/// `prior_accepted` is the highest-numbered proposal the acceptor has accepted in this execution, if any.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Promise {
    pub execution_id: ExecutionId,
    pub promised_n: ProposalNumber,
    pub prior_accepted: Option<AcceptedProposal>,
}

/// An acceptor's refusal of a [`Prepare`] whose `n` does not exceed the acceptor's prior promise.
///
/// Acceptors compute this message but never transmit it, and the [codec](crate::codec) cannot
/// serialize it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NegativePromise {
    pub execution_id: ExecutionId,
    pub n: ProposalNumber,
    pub prior_promised_n: ProposalNumber,
    pub prior_accepted: Option<AcceptedProposal>,
}

/// A proposer's phase-2 request that acceptors commit `value` under `n`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PleaseAccept {
    pub execution_id: ExecutionId,
    pub n: ProposalNumber,
    pub value: Value,
}

/// An acceptor's confirmation that it committed `value` under `n`. Also consumed by learners.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Accepted {
    pub execution_id: ExecutionId,
    pub n: ProposalNumber,
    pub value: Value,
}

impl From<Heartbeat> for Message {
    fn from(value: Heartbeat) -> Self {
        Message::Heartbeat(value)
    }
}

impl From<Prepare> for Message {
    fn from(value: Prepare) -> Self {
        Message::Prepare(value)
    }
}

impl From<Promise> for Message {
    fn from(value: Promise) -> Self {
        Message::Promise(value)
    }
}

impl From<NegativePromise> for Message {
    fn from(value: NegativePromise) -> Self {
        Message::NegativePromise(value)
    }
}

impl From<PleaseAccept> for Message {
    fn from(value: PleaseAccept) -> Self {
        Message::PleaseAccept(value)
    }
}

impl From<Accepted> for Message {
    fn from(value: Accepted) -> Self {
        Message::Accepted(value)
    }
}
