//! Functions and types for sending messages to the broadcast medium.

use crate::messages::Message;

use super::transport::{Transport, TransportError};

/// Handle for broadcasting messages through a [`Transport`].
///
/// It can be used to broadcast instances of any type that implement the [`Into<Message>`] trait.
#[derive(Clone)]
pub(crate) struct SenderHandle<T: Transport> {
    transport: T,
}

impl<T: Transport> SenderHandle<T> {
    pub(crate) fn new(transport: T) -> Self {
        Self { transport }
    }

    pub(crate) fn broadcast<S: Into<Message>>(&mut self, msg: S) -> Result<(), TransportError> {
        self.transport.send(msg.into())
    }
}
