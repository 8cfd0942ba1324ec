/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run a node in the background.
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the runtime](RuntimeSpec) with:
//!   1. `RuntimeSpec::builder` to construct a `RuntimeSpecBuilder`,
//!   2. The setters of the `RuntimeSpecBuilder`, and
//!   3. The `RuntimeSpecBuilder::build` method to construct a [RuntimeSpec],
//! - The function to [start](RuntimeSpec::start) a [Runtime] given its specification,
//! - [The type](Runtime) which keeps the node alive and lets the caller propose values.
//!
//! ## Threads
//!
//! A running node consists of the following threads:
//! 1. The poller, which moves messages from the [`Transport`] into a channel.
//! 2. The heartbeat thread, which broadcasts a [`Heartbeat`] with a fresh random id every
//!    [`heartbeat_interval`](Configuration::heartbeat_interval).
//! 3. The dispatch thread, which owns the [`PaxosNode`]. It feeds the node every received message, and
//!    serves the requests made through the [`Runtime`] handle. It is the only thread that touches
//!    consensus state.
//! 4. The event bus, if any event handler is registered or [`log_events`](Configuration::log_events) is
//!    set.
//!
//! The heartbeat and dispatch threads share a [`SelfAddressTracker`]. When the tracker recognizes this
//! node's own address, the dispatch thread adopts it as the node's id.
//!
//! ## Starting a node
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .node_id("node-a")
//!     .heartbeat_interval(Duration::from_secs(1))
//!     .dispatch_timeout(Duration::from_millis(100))
//!     .log_events(true)
//!     .build();
//!
//! let runtime =
//!     RuntimeSpec::builder()
//!     .transport(transport)
//!     .configuration(configuration)
//!     .on_receive_accepted(receive_accepted_handler)
//!     .build()
//!     .start();
//!
//! let execution_id = runtime.propose(|| Value::new(42))?;
//! ```

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use rand_core::{OsRng, RngCore};
use typed_builder::TypedBuilder;

use crate::event_bus::*;
use crate::events::*;
use crate::liveness::self_address::SelfAddressTracker;
use crate::messages::{Heartbeat, Message};
use crate::networking::receiving::start_polling;
use crate::networking::sending::SenderHandle;
use crate::networking::transport::Transport;
use crate::paxos::execution_state::ValueSource;
use crate::paxos::node::{PaxosError, PaxosNode};
use crate::types::data_types::{ExecutionId, HeartbeatId, PeerAddress, Value};

/// Stores the user-defined parameters required to start a node, that is:
/// 1. The initial id of the node, used in logs until its own address is discovered.
/// 2. The interval between heartbeats.
/// 3. The dispatch timeout, i.e., how long the dispatch thread waits for a message before checking for
///    requests and shutdown signals again.
/// 4. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Log Events
///
/// This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(TypedBuilder, Clone, Debug)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.node_id(...)`
    - `.heartbeat_interval(...)`
    - `.dispatch_timeout(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(setter(into, doc = "Set the initial id of the node. Required."))]
    pub node_id: PeerAddress,
    #[builder(setter(doc = "Set the interval between heartbeats. Required."))]
    pub heartbeat_interval: Duration,
    #[builder(setter(doc = "Set how long the dispatch thread blocks waiting for a message. Required."))]
    pub dispatch_timeout: Duration,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

/// Stores all necessary parameters and trait implementations required to run a [Runtime].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [RuntimeSpec]. On the builder call the following methods to construct a valid [RuntimeSpec].

    Required:
    - `.transport(...)`
    - `.configuration(...)`

    Optional:
    - `.on_receive_heartbeat(...)`
    - `.on_discover_self_address(...)`
    - `.on_prepare(...)`
    - `.on_receive_promise(...)`
    - `.on_collect_promises(...)`
    - `.on_please_accept(...)`
    - `.on_receive_prepare(...)`
    - `.on_promise(...)`
    - `.on_reject_prepare(...)`
    - `.on_receive_please_accept(...)`
    - `.on_accept(...)`
    - `.on_receive_accepted(...)`
"))]
pub struct RuntimeSpec<T: Transport + 'static> {
    // Required parameters
    #[builder(setter(doc = "Set the broadcast medium. The argument must implement the [Transport](crate::networking::transport::Transport) trait. Required."))]
    transport: T,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a node. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveHeartbeatEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveHeartbeatEvent>),
    doc = "Register a handler closure to be invoked after the node receives a heartbeat. Optional."))]
    on_receive_heartbeat: Option<HandlerPtr<ReceiveHeartbeatEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DiscoverSelfAddressEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DiscoverSelfAddressEvent>),
    doc = "Register a handler closure to be invoked after the node adopts a newly discovered own address. Optional."))]
    on_discover_self_address: Option<HandlerPtr<DiscoverSelfAddressEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PrepareEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PrepareEvent>),
    doc = "Register a handler closure to be invoked after the node broadcasts a prepare. Optional."))]
    on_prepare: Option<HandlerPtr<PrepareEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceivePromiseEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceivePromiseEvent>),
    doc = "Register a handler closure to be invoked after the node receives a promise. Optional."))]
    on_receive_promise: Option<HandlerPtr<ReceivePromiseEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CollectPromisesEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CollectPromisesEvent>),
    doc = "Register a handler closure to be invoked after the node holds promises from a majority. Optional."))]
    on_collect_promises: Option<HandlerPtr<CollectPromisesEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PleaseAcceptEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PleaseAcceptEvent>),
    doc = "Register a handler closure to be invoked after the node asks acceptors to accept a value. Optional."))]
    on_please_accept: Option<HandlerPtr<PleaseAcceptEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceivePrepareEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceivePrepareEvent>),
    doc = "Register a handler closure to be invoked after the node receives a prepare. Optional."))]
    on_receive_prepare: Option<HandlerPtr<ReceivePrepareEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PromiseEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PromiseEvent>),
    doc = "Register a handler closure to be invoked after the node broadcasts a promise. Optional."))]
    on_promise: Option<HandlerPtr<PromiseEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RejectPrepareEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RejectPrepareEvent>),
    doc = "Register a handler closure to be invoked after the node refuses to promise. Optional."))]
    on_reject_prepare: Option<HandlerPtr<RejectPrepareEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceivePleaseAcceptEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceivePleaseAcceptEvent>),
    doc = "Register a handler closure to be invoked after the node receives a request to accept a value. Optional."))]
    on_receive_please_accept: Option<HandlerPtr<ReceivePleaseAcceptEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AcceptEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AcceptEvent>),
    doc = "Register a handler closure to be invoked after the node accepts a value. Optional."))]
    on_accept: Option<HandlerPtr<AcceptEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveAcceptedEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveAcceptedEvent>),
    doc = "Register a handler closure to be invoked after the node learns that a peer accepted a value. Optional."))]
    on_receive_accepted: Option<HandlerPtr<ReceiveAcceptedEvent>>,
}

impl<T: Transport + 'static> RuntimeSpec<T> {
    /// Starts all threads and channels associated with running a node, and returns the handles to them in
    /// a [Runtime] struct.
    pub fn start(self) -> Runtime {
        let Configuration {
            node_id,
            heartbeat_interval,
            dispatch_timeout,
            log_events,
        } = self.configuration;

        let (poller_shutdown, poller_shutdown_receiver) = mpsc::channel();
        let (poller, messages) = start_polling(self.transport.clone(), poller_shutdown_receiver);

        let event_handlers = EventHandlers::new(
            log_events,
            self.on_receive_heartbeat,
            self.on_discover_self_address,
            self.on_prepare,
            self.on_receive_promise,
            self.on_collect_promises,
            self.on_please_accept,
            self.on_receive_prepare,
            self.on_promise,
            self.on_reject_prepare,
            self.on_receive_please_accept,
            self.on_accept,
            self.on_receive_accepted,
        );

        let (event_bus, event_bus_shutdown, event_publisher) = if !event_handlers.is_empty() {
            let (event_publisher, event_subscriber) = mpsc::channel();
            let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
            let event_bus =
                start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);
            (Some(event_bus), Some(event_bus_shutdown), Some(event_publisher))
        } else {
            (None, None, None)
        };

        let tracker = Arc::new(SelfAddressTracker::new());

        let (heartbeat_shutdown, heartbeat_shutdown_receiver) = mpsc::channel();
        let heartbeat = start_heartbeat(
            SenderHandle::new(self.transport.clone()),
            Arc::clone(&tracker),
            heartbeat_interval,
            heartbeat_shutdown_receiver,
        );

        let node =
            PaxosNode::new(node_id, self.transport).with_event_publisher(event_publisher.clone());
        let (commands, command_receiver) = mpsc::channel();
        let (dispatch_shutdown, dispatch_shutdown_receiver) = mpsc::channel();
        let dispatch = Dispatcher {
            node,
            tracker,
            messages,
            commands: command_receiver,
            dispatch_timeout,
            event_publisher,
            shutdown_signal: dispatch_shutdown_receiver,
        }
        .start();

        Runtime {
            commands,
            poller: Some(poller),
            poller_shutdown,
            heartbeat: Some(heartbeat),
            heartbeat_shutdown,
            dispatch: Some(dispatch),
            dispatch_shutdown,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// Spawn the heartbeat thread. Each id is recorded in `tracker` before its heartbeat is broadcast.
fn start_heartbeat<T: Transport + 'static>(
    mut sender: SenderHandle<T>,
    tracker: Arc<SelfAddressTracker>,
    interval: Duration,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        let uuid = HeartbeatId::new(OsRng.next_u64() as i64);
        tracker.about_to_send(uuid);
        if let Err(err) = sender.broadcast(Heartbeat { uuid }) {
            log::error!("error sending heartbeat: {:?}", err);
        }

        match shutdown_signal.recv_timeout(interval) {
            Ok(()) => return,
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => {
                panic!("heartbeat thread disconnected from main thread")
            }
        }
    })
}

/// Requests from a [`Runtime`] handle to its dispatch thread.
enum Command {
    Propose {
        source: ValueSource,
        reply: Sender<Result<ExecutionId, PaxosError>>,
    },
    ProposeFor {
        execution_id: ExecutionId,
        source: ValueSource,
        reply: Sender<Result<(), PaxosError>>,
    },
    Peers {
        reply: Sender<Vec<(PeerAddress, SystemTime)>>,
    },
    NodeId {
        reply: Sender<PeerAddress>,
    },
}

struct Dispatcher<T: Transport> {
    node: PaxosNode<T>,
    tracker: Arc<SelfAddressTracker>,
    messages: Receiver<(PeerAddress, Message)>,
    commands: Receiver<Command>,
    dispatch_timeout: Duration,
    event_publisher: Option<Sender<Event>>,
    shutdown_signal: Receiver<()>,
}

impl<T: Transport + 'static> Dispatcher<T> {
    fn start(mut self) -> JoinHandle<()> {
        thread::spawn(move || loop {
            match self.shutdown_signal.try_recv() {
                Ok(()) => return,
                Err(TryRecvError::Empty) => (),
                Err(TryRecvError::Disconnected) => {
                    panic!("dispatch thread disconnected from main thread")
                }
            }

            while let Ok(command) = self.commands.try_recv() {
                self.on_command(command);
            }

            match self.messages.recv_timeout(self.dispatch_timeout) {
                Ok((origin, msg)) => self.on_receive_msg(origin, msg),
                Err(RecvTimeoutError::Timeout) => (),
                // The poller outlives this thread, see `Runtime::drop`.
                Err(RecvTimeoutError::Disconnected) => {
                    panic!("dispatch thread disconnected from poller")
                }
            }
        })
    }

    fn on_receive_msg(&mut self, origin: PeerAddress, msg: Message) {
        if let Message::Heartbeat(heartbeat) = &msg {
            if let Some(address) = self.tracker.received_heartbeat(heartbeat.uuid, &origin) {
                if address != *self.node.node_id() {
                    self.node.set_node_id(address.clone());
                    Event::publish(
                        &self.event_publisher,
                        Event::DiscoverSelfAddress(DiscoverSelfAddressEvent {
                            timestamp: SystemTime::now(),
                            address,
                        }),
                    );
                }
            }
        }

        if let Err(err) = self.node.on_receive_msg(origin, msg) {
            log::error!("[{}] error receiving message: {:?}", self.node.node_id(), err);
        }
    }

    fn on_command(&mut self, command: Command) {
        // A caller that stopped waiting for the reply is not an error.
        match command {
            Command::Propose { source, reply } => {
                let _ = reply.send(self.node.send_prepare(source));
            }
            Command::ProposeFor {
                execution_id,
                source,
                reply,
            } => {
                let _ = reply.send(self.node.send_prepare_for(execution_id, source));
            }
            Command::Peers { reply } => {
                let _ = reply.send(self.node.peer_registry().peers());
            }
            Command::NodeId { reply } => {
                let _ = reply.send(self.node.node_id().clone());
            }
        }
    }
}

/// A handle to the background threads of a node. When this value is dropped, all background threads are
/// gracefully shut down.
pub struct Runtime {
    commands: Sender<Command>,
    poller: Option<JoinHandle<()>>,
    poller_shutdown: Sender<()>,
    heartbeat: Option<JoinHandle<()>>,
    heartbeat_shutdown: Sender<()>,
    dispatch: Option<JoinHandle<()>>,
    dispatch_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl Runtime {
    /// Start a new execution, proposing the value produced by `source`. Returns the id of the new
    /// execution.
    ///
    /// See [`PaxosNode::send_prepare`].
    pub fn propose<F>(&self, source: F) -> Result<ExecutionId, RuntimeError>
    where
        F: FnOnce() -> Value + Send + 'static,
    {
        let (reply, response) = mpsc::channel();
        self.request(Command::Propose {
            source: Box::new(source),
            reply,
        })?;
        Ok(response.recv().map_err(|_| RuntimeError::Disconnected)??)
    }

    /// Propose the value produced by `source` in execution `execution_id`.
    ///
    /// See [`PaxosNode::send_prepare_for`].
    pub fn propose_for<F>(&self, execution_id: ExecutionId, source: F) -> Result<(), RuntimeError>
    where
        F: FnOnce() -> Value + Send + 'static,
    {
        let (reply, response) = mpsc::channel();
        self.request(Command::ProposeFor {
            execution_id,
            source: Box::new(source),
            reply,
        })?;
        Ok(response.recv().map_err(|_| RuntimeError::Disconnected)??)
    }

    /// Every peer a heartbeat has been received from, with the time of its latest heartbeat.
    pub fn peers(&self) -> Result<Vec<(PeerAddress, SystemTime)>, RuntimeError> {
        let (reply, response) = mpsc::channel();
        self.request(Command::Peers { reply })?;
        response.recv().map_err(|_| RuntimeError::Disconnected)
    }

    /// The node's current id: the configured one, or the discovered own address.
    pub fn node_id(&self) -> Result<PeerAddress, RuntimeError> {
        let (reply, response) = mpsc::channel();
        self.request(Command::NodeId { reply })?;
        response.recv().map_err(|_| RuntimeError::Disconnected)
    }

    fn request(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands
            .send(command)
            .map_err(|_| RuntimeError::Disconnected)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // The order matters: the dispatch thread receives messages from the poller, and publishes events to
        // the event bus, so it must stop before either of them.
        let _ = self.heartbeat_shutdown.send(());
        join("heartbeat", self.heartbeat.take());

        let _ = self.dispatch_shutdown.send(());
        join("dispatch", self.dispatch.take());

        if let Some(event_bus_shutdown) = &self.event_bus_shutdown {
            let _ = event_bus_shutdown.send(());
        }
        join("event bus", self.event_bus.take());

        let _ = self.poller_shutdown.send(());
        join("poller", self.poller.take());
    }
}

fn join(name: &str, thread: Option<JoinHandle<()>>) {
    if let Some(thread) = thread {
        if thread.join().is_err() {
            log::error!("{} thread panicked", name);
        }
    }
}

#[derive(Debug)]
pub enum RuntimeError {
    /// The dispatch thread is no longer running.
    Disconnected,
    Paxos(PaxosError),
}

impl From<PaxosError> for RuntimeError {
    fn from(value: PaxosError) -> Self {
        RuntimeError::Paxos(value)
    }
}
