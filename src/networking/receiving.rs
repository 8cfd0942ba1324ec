//! Functions for receiving messages from the broadcast medium.

use std::{
    sync::mpsc::{self, Receiver, TryRecvError},
    thread::{self, JoinHandle},
};

use crate::{messages::Message, types::data_types::PeerAddress};

use super::transport::Transport;

/// Spawn the poller thread, which polls the [`Transport`] for messages and forwards them, in the order
/// they were received, into the returned receiver.
pub(crate) fn start_polling<T: Transport + 'static>(
    mut transport: T,
    shutdown_signal: Receiver<()>,
) -> (JoinHandle<()>, Receiver<(PeerAddress, Message)>) {
    let (to_msg_receiver, msg_receiver) = mpsc::channel();

    let poller_thread = thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Poller thread disconnected from main thread")
            }
        }

        if let Some((origin, msg)) = transport.recv() {
            let _ = to_msg_receiver.send((origin, msg));
        } else {
            thread::yield_now()
        }
    });

    (poller_thread, msg_receiver)
}
