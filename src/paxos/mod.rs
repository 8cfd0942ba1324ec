//! The Basic Paxos state machine.
//!
//! Every [`PaxosNode`](node::PaxosNode) plays all three Paxos roles (proposer, acceptor, and learner)
//! for every execution, keeping the state of each execution in an
//! [`ExecutionState`](execution_state::ExecutionState).
//!
//! ## Flow of an execution
//!
//! 1. A proposer broadcasts `Prepare{n}`, where `n` is one more than the highest proposal number it has
//!    promised for the execution.
//! 2. Each acceptor (including the proposer itself) that has not yet promised `n` or more broadcasts a
//!    `Promise{n}`, carrying the highest-numbered proposal it has accepted so far (if any).
//! 3. Once a node holds promises from a [majority](quorum::have_majority) of the peers it knows, it picks a
//!    value (the value of the highest-numbered prior accepted proposal among the promises, or else its own)
//!    and broadcasts `PleaseAccept{n, value}`.
//! 4. Each acceptor that has not promised anything higher accepts, and broadcasts `Accepted{n, value}`.
//! 5. Every node records every `Accepted` it receives. Whether a majority has accepted the same proposal is
//!    for an observer to decide, through [events](crate::events).

pub mod execution_state;

pub mod quorum;

pub mod node;
