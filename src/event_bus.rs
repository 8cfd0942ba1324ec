/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The event bus thread, which receives [events](crate::events) and invokes the handlers registered for
//! them.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// How long the event bus waits for an event before checking for a shutdown signal again.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
pub(crate) struct EventHandlers {
    pub(crate) receive_heartbeat_handlers: Vec<HandlerPtr<ReceiveHeartbeatEvent>>,
    pub(crate) discover_self_address_handlers: Vec<HandlerPtr<DiscoverSelfAddressEvent>>,
    pub(crate) prepare_handlers: Vec<HandlerPtr<PrepareEvent>>,
    pub(crate) receive_promise_handlers: Vec<HandlerPtr<ReceivePromiseEvent>>,
    pub(crate) collect_promises_handlers: Vec<HandlerPtr<CollectPromisesEvent>>,
    pub(crate) please_accept_handlers: Vec<HandlerPtr<PleaseAcceptEvent>>,
    pub(crate) receive_prepare_handlers: Vec<HandlerPtr<ReceivePrepareEvent>>,
    pub(crate) promise_handlers: Vec<HandlerPtr<PromiseEvent>>,
    pub(crate) reject_prepare_handlers: Vec<HandlerPtr<RejectPrepareEvent>>,
    pub(crate) receive_please_accept_handlers: Vec<HandlerPtr<ReceivePleaseAcceptEvent>>,
    pub(crate) accept_handlers: Vec<HandlerPtr<AcceptEvent>>,
    pub(crate) receive_accepted_handlers: Vec<HandlerPtr<ReceiveAcceptedEvent>>,
}

/// Push the default logger for `T` (if `log_events`) and then the user-defined handler (if any).
fn handlers<T: Logger>(log_events: bool, user_handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
    let mut handlers = Vec::new();
    if log_events {
        handlers.push(T::get_logger());
    }
    if let Some(handler) = user_handler {
        handlers.push(handler);
    }
    handlers
}

impl EventHandlers {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        receive_heartbeat_handler: Option<HandlerPtr<ReceiveHeartbeatEvent>>,
        discover_self_address_handler: Option<HandlerPtr<DiscoverSelfAddressEvent>>,
        prepare_handler: Option<HandlerPtr<PrepareEvent>>,
        receive_promise_handler: Option<HandlerPtr<ReceivePromiseEvent>>,
        collect_promises_handler: Option<HandlerPtr<CollectPromisesEvent>>,
        please_accept_handler: Option<HandlerPtr<PleaseAcceptEvent>>,
        receive_prepare_handler: Option<HandlerPtr<ReceivePrepareEvent>>,
        promise_handler: Option<HandlerPtr<PromiseEvent>>,
        reject_prepare_handler: Option<HandlerPtr<RejectPrepareEvent>>,
        receive_please_accept_handler: Option<HandlerPtr<ReceivePleaseAcceptEvent>>,
        accept_handler: Option<HandlerPtr<AcceptEvent>>,
        receive_accepted_handler: Option<HandlerPtr<ReceiveAcceptedEvent>>,
    ) -> EventHandlers {
        EventHandlers {
            receive_heartbeat_handlers: handlers(log_events, receive_heartbeat_handler),
            discover_self_address_handlers: handlers(log_events, discover_self_address_handler),
            prepare_handlers: handlers(log_events, prepare_handler),
            receive_promise_handlers: handlers(log_events, receive_promise_handler),
            collect_promises_handlers: handlers(log_events, collect_promises_handler),
            please_accept_handlers: handlers(log_events, please_accept_handler),
            receive_prepare_handlers: handlers(log_events, receive_prepare_handler),
            promise_handlers: handlers(log_events, promise_handler),
            reject_prepare_handlers: handlers(log_events, reject_prepare_handler),
            receive_please_accept_handlers: handlers(log_events, receive_please_accept_handler),
            accept_handlers: handlers(log_events, accept_handler),
            receive_accepted_handlers: handlers(log_events, receive_accepted_handler),
        }
    }

    /// Whether no handler at all is registered, in which case no event bus thread needs to run.
    pub(crate) fn is_empty(&self) -> bool {
        self.receive_heartbeat_handlers.is_empty()
            && self.discover_self_address_handlers.is_empty()
            && self.prepare_handlers.is_empty()
            && self.receive_promise_handlers.is_empty()
            && self.collect_promises_handlers.is_empty()
            && self.please_accept_handlers.is_empty()
            && self.receive_prepare_handlers.is_empty()
            && self.promise_handlers.is_empty()
            && self.reject_prepare_handlers.is_empty()
            && self.receive_please_accept_handlers.is_empty()
            && self.accept_handlers.is_empty()
            && self.receive_accepted_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::ReceiveHeartbeat(receive_heartbeat_event) => self
                .receive_heartbeat_handlers
                .iter()
                .for_each(|handler| handler(&receive_heartbeat_event)),

            Event::DiscoverSelfAddress(discover_self_address_event) => self
                .discover_self_address_handlers
                .iter()
                .for_each(|handler| handler(&discover_self_address_event)),

            Event::Prepare(prepare_event) => self
                .prepare_handlers
                .iter()
                .for_each(|handler| handler(&prepare_event)),

            Event::ReceivePromise(receive_promise_event) => self
                .receive_promise_handlers
                .iter()
                .for_each(|handler| handler(&receive_promise_event)),

            Event::CollectPromises(collect_promises_event) => self
                .collect_promises_handlers
                .iter()
                .for_each(|handler| handler(&collect_promises_event)),

            Event::PleaseAccept(please_accept_event) => self
                .please_accept_handlers
                .iter()
                .for_each(|handler| handler(&please_accept_event)),

            Event::ReceivePrepare(receive_prepare_event) => self
                .receive_prepare_handlers
                .iter()
                .for_each(|handler| handler(&receive_prepare_event)),

            Event::Promise(promise_event) => self
                .promise_handlers
                .iter()
                .for_each(|handler| handler(&promise_event)),

            Event::RejectPrepare(reject_prepare_event) => self
                .reject_prepare_handlers
                .iter()
                .for_each(|handler| handler(&reject_prepare_event)),

            Event::ReceivePleaseAccept(receive_please_accept_event) => self
                .receive_please_accept_handlers
                .iter()
                .for_each(|handler| handler(&receive_please_accept_event)),

            Event::Accept(accept_event) => self
                .accept_handlers
                .iter()
                .for_each(|handler| handler(&accept_event)),

            Event::ReceiveAccepted(receive_accepted_event) => self
                .receive_accepted_handlers
                .iter()
                .for_each(|handler| handler(&receive_accepted_event)),
        }
    }
}

/// Spawn the event bus thread. It fires the handlers for each event published on `event_subscriber`, until
/// it receives a shutdown signal.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("event_bus thread disconnected from main thread")
            }
        }

        match event_subscriber.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            // Every publisher is gone. Wait for the shutdown signal.
            Err(RecvTimeoutError::Disconnected) => thread::sleep(EVENT_POLL_INTERVAL),
        }
    })
}
