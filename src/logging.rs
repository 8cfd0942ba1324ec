/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the runtime's
//! [config](crate::runtime::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [ReceiveAccepted](crate::events::ReceiveAcceptedEvent) is printed:
//!
//! ```text
//! ReceiveAccepted, 1701329264, 10.0.0.7, 3, 2, 42
//! ```
//!
//! In the snippet:
//! - The third value is the address of the node that accepted.
//! - The fourth value is the execution id.
//! - The fifth value is the proposal number the value was accepted under.
//! - The sixth value is the accepted value.

use std::time::SystemTime;

use crate::events::*;
use crate::types::data_types::AcceptedProposal;

// Names of each event in PascalCase for printing:
pub const RECEIVE_HEARTBEAT: &str = "ReceiveHeartbeat";
pub const DISCOVER_SELF_ADDRESS: &str = "DiscoverSelfAddress";

pub const PREPARE: &str = "Prepare";
pub const RECEIVE_PROMISE: &str = "ReceivePromise";
pub const COLLECT_PROMISES: &str = "CollectPromises";
pub const PLEASE_ACCEPT: &str = "PleaseAccept";

pub const RECEIVE_PREPARE: &str = "ReceivePrepare";
pub const PROMISE: &str = "Promise";
pub const REJECT_PREPARE: &str = "RejectPrepare";
pub const RECEIVE_PLEASE_ACCEPT: &str = "ReceivePleaseAccept";
pub const ACCEPT: &str = "Accept";

pub const RECEIVE_ACCEPTED: &str = "ReceiveAccepted";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for ReceiveHeartbeatEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_heartbeat_event: &ReceiveHeartbeatEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_HEARTBEAT,
                secs_since_unix_epoch(receive_heartbeat_event.timestamp),
                receive_heartbeat_event.origin,
                receive_heartbeat_event.heartbeat.uuid
            )
        };
        Box::new(logger)
    }
}

impl Logger for DiscoverSelfAddressEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |discover_self_address_event: &DiscoverSelfAddressEvent| {
            log::info!(
                "{}, {}, {}",
                DISCOVER_SELF_ADDRESS,
                secs_since_unix_epoch(discover_self_address_event.timestamp),
                discover_self_address_event.address
            )
        };
        Box::new(logger)
    }
}

impl Logger for PrepareEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |prepare_event: &PrepareEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PREPARE,
                secs_since_unix_epoch(prepare_event.timestamp),
                prepare_event.prepare.execution_id,
                prepare_event.prepare.n
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceivePromiseEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_promise_event: &ReceivePromiseEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                RECEIVE_PROMISE,
                secs_since_unix_epoch(receive_promise_event.timestamp),
                receive_promise_event.origin,
                receive_promise_event.promise.execution_id,
                receive_promise_event.promise.promised_n,
                prior_accepted_info(&receive_promise_event.promise.prior_accepted)
            )
        };
        Box::new(logger)
    }
}

impl Logger for CollectPromisesEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |collect_promises_event: &CollectPromisesEvent| {
            log::info!(
                "{}, {}, {}, {}, {}/{}",
                COLLECT_PROMISES,
                secs_since_unix_epoch(collect_promises_event.timestamp),
                collect_promises_event.execution_id,
                collect_promises_event.n,
                collect_promises_event.promisers,
                collect_promises_event.peers_alive
            )
        };
        Box::new(logger)
    }
}

impl Logger for PleaseAcceptEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |please_accept_event: &PleaseAcceptEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                PLEASE_ACCEPT,
                secs_since_unix_epoch(please_accept_event.timestamp),
                please_accept_event.please_accept.execution_id,
                please_accept_event.please_accept.n,
                please_accept_event.please_accept.value
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceivePrepareEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_prepare_event: &ReceivePrepareEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_PREPARE,
                secs_since_unix_epoch(receive_prepare_event.timestamp),
                receive_prepare_event.origin,
                receive_prepare_event.prepare.execution_id,
                receive_prepare_event.prepare.n
            )
        };
        Box::new(logger)
    }
}

impl Logger for PromiseEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |promise_event: &PromiseEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                PROMISE,
                secs_since_unix_epoch(promise_event.timestamp),
                promise_event.promise.execution_id,
                promise_event.promise.promised_n,
                prior_accepted_info(&promise_event.promise.prior_accepted)
            )
        };
        Box::new(logger)
    }
}

impl Logger for RejectPrepareEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reject_prepare_event: &RejectPrepareEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                REJECT_PREPARE,
                secs_since_unix_epoch(reject_prepare_event.timestamp),
                reject_prepare_event.origin,
                reject_prepare_event.negative_promise.execution_id,
                reject_prepare_event.negative_promise.n,
                reject_prepare_event.negative_promise.prior_promised_n
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceivePleaseAcceptEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_please_accept_event: &ReceivePleaseAcceptEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                RECEIVE_PLEASE_ACCEPT,
                secs_since_unix_epoch(receive_please_accept_event.timestamp),
                receive_please_accept_event.origin,
                receive_please_accept_event.please_accept.execution_id,
                receive_please_accept_event.please_accept.n,
                receive_please_accept_event.please_accept.value
            )
        };
        Box::new(logger)
    }
}

impl Logger for AcceptEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |accept_event: &AcceptEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                ACCEPT,
                secs_since_unix_epoch(accept_event.timestamp),
                accept_event.accepted.execution_id,
                accept_event.accepted.n,
                accept_event.accepted.value
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveAcceptedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_accepted_event: &ReceiveAcceptedEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                RECEIVE_ACCEPTED,
                secs_since_unix_epoch(receive_accepted_event.timestamp),
                receive_accepted_event.origin,
                receive_accepted_event.accepted.execution_id,
                receive_accepted_event.accepted.n,
                receive_accepted_event.accepted.value
            )
        };
        Box::new(logger)
    }
}

// Prints as "N:V", or "none".
fn prior_accepted_info(prior_accepted: &Option<AcceptedProposal>) -> String {
    match prior_accepted {
        Some(AcceptedProposal { number, value }) => format!("{}:{}", number, value),
        None => String::from("none"),
    }
}

// Timestamps before the Unix Epoch are printed as 0.
fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
