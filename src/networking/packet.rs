/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A [`Transport`] over any datagram-style channel.
//!
//! Implement [`PacketChannel`] for a socket (for example, a UDP socket joined to a multicast group) and wrap
//! it in a [`PacketTransport`] to get a transport that nodes can use. The channel is responsible for
//! looping a node's own packets back to it, and for reporting the origin address of every packet.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::{codec, messages::Message, types::data_types::PeerAddress};

use super::transport::{Transport, TransportError};

/// A byte-level broadcast channel.
pub trait PacketChannel: Send {
    /// Broadcast one packet to every member of the channel, including this one.
    fn send_packet(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Receive one packet and the address it originated from. Returns `Ok(None)` immediately if no packet
    /// is available now.
    fn recv_packet(&mut self) -> io::Result<Option<(Vec<u8>, PeerAddress)>>;
}

/// Serializes outgoing messages into packets, and validates and deserializes incoming packets.
pub struct PacketTransport<C: PacketChannel> {
    channel: Arc<Mutex<C>>,
    inbound: Arc<Mutex<VecDeque<(PeerAddress, Message)>>>,
}

impl<C: PacketChannel> Clone for PacketTransport<C> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            inbound: Arc::clone(&self.inbound),
        }
    }
}

impl<C: PacketChannel> PacketTransport<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel: Arc::new(Mutex::new(channel)),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Handle one received packet: if it is a valid encoding of a message, stamp it with `origin` and
    /// enqueue it for [`recv`](Transport::recv). Invalid packets are logged and dropped.
    ///
    /// Returns whether the packet was enqueued.
    pub fn on_packet(&self, bytes: &[u8], origin: PeerAddress) -> bool {
        let msg = if codec::validate(bytes) {
            codec::deserialize(bytes)
        } else {
            None
        };

        match msg {
            Some(msg) => {
                log::debug!("received {} from {}", msg, origin);
                self.inbound().push_back((origin, msg));
                true
            }
            None => {
                log::warn!(
                    "invalid packet from {}: {}",
                    origin,
                    STANDARD_NO_PAD.encode(bytes)
                );
                false
            }
        }
    }

    /// Number of decoded messages waiting to be received.
    pub fn inbound_len(&self) -> usize {
        self.inbound().len()
    }

    fn poll_channel(&self) -> Result<(), TransportError> {
        loop {
            let packet = self.channel().recv_packet()?;
            match packet {
                Some((bytes, origin)) => {
                    self.on_packet(&bytes, origin);
                }
                None => return Ok(()),
            }
        }
    }

    fn channel(&self) -> MutexGuard<'_, C> {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inbound(&self) -> MutexGuard<'_, VecDeque<(PeerAddress, Message)>> {
        self.inbound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: PacketChannel> Transport for PacketTransport<C> {
    fn send(&mut self, message: Message) -> Result<(), TransportError> {
        let bytes = codec::serialize(&message);
        self.channel().send_packet(&bytes)?;
        Ok(())
    }

    fn recv(&mut self) -> Option<(PeerAddress, Message)> {
        if let Some(msg) = self.inbound().pop_front() {
            return Some(msg);
        }

        if let Err(err) = self.poll_channel() {
            log::error!("error receiving: {:?}", err);
        }
        self.inbound().pop_front()
    }
}
