/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Binary encoding of [`Message`]s for transmission in a single datagram.
//!
//! ## Wire format
//!
//! ```text
//! MAGIC (6 bytes) | VERSION (1 byte) | MESSAGE TYPE (1 byte) | payload
//! ```
//!
//! All integers in the payload are 8-byte big-endian signed integers. The payload layout depends on the
//! message type:
//!
//! | Type | Id | Payload |
//! |---|---|---|
//! | Heartbeat | 0 | `uuid` |
//! | Prepare | 1 | `execution_id, n` |
//! | Promise | 2 | `execution_id, promised_n, prior_accepted_n, prior_accepted_value` |
//! | PleaseAccept | 3 | `execution_id, n, value` |
//! | Accepted | 4 | `execution_id, n, value` |
//! | NegativePromise | 5 | (no encoding) |
//!
//! A [`Promise`] without a prior accepted proposal is encoded with [`NO_PRIOR_ACCEPTED`] in both prior
//! fields. On decoding, any negative `prior_accepted_n` means "none": proposal numbers start at 1, so the
//! marker cannot collide with a real accepted proposal, whatever its value.
//!
//! The address of the sender is never encoded. Receiving transports stamp it from the packet origin.

use crate::messages::{Accepted, Heartbeat, Message, PleaseAccept, Prepare, Promise};
use crate::types::data_types::{AcceptedProposal, ExecutionId, HeartbeatId, ProposalNumber, Value};

pub const MAGIC: [u8; 6] = [0x0c, 0x00, 0x01, 0x01, 0x0a, 0x0b];

pub const VERSION: u8 = 0;

/// Length of `MAGIC`, `VERSION` and the message type byte.
pub const HEADER_LENGTH: usize = MAGIC.len() + 2;

/// The largest message the codec produces (a [`Promise`]) fits comfortably within this many bytes.
/// Packet channels may use it to size their receive buffers.
pub const MAX_PACKET_SIZE: usize = 256;

/// Placeholder written in both prior fields of a [`Promise`] that carries no prior accepted proposal.
pub const NO_PRIOR_ACCEPTED: i64 = -1;

/// Identifies the variant of a message on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MessageType {
    Heartbeat,
    Prepare,
    Promise,
    PleaseAccept,
    Accepted,
    NegativePromise,
}

impl MessageType {
    pub const fn id(&self) -> u8 {
        match self {
            MessageType::Heartbeat => 0,
            MessageType::Prepare => 1,
            MessageType::Promise => 2,
            MessageType::PleaseAccept => 3,
            MessageType::Accepted => 4,
            MessageType::NegativePromise => 5,
        }
    }

    pub fn from_id(id: u8) -> Option<MessageType> {
        match id {
            0 => Some(MessageType::Heartbeat),
            1 => Some(MessageType::Prepare),
            2 => Some(MessageType::Promise),
            3 => Some(MessageType::PleaseAccept),
            4 => Some(MessageType::Accepted),
            5 => Some(MessageType::NegativePromise),
            _ => None,
        }
    }

    pub fn of(message: &Message) -> MessageType {
        match message {
            Message::Heartbeat(_) => MessageType::Heartbeat,
            Message::Prepare(_) => MessageType::Prepare,
            Message::Promise(_) => MessageType::Promise,
            Message::NegativePromise(_) => MessageType::NegativePromise,
            Message::PleaseAccept(_) => MessageType::PleaseAccept,
            Message::Accepted(_) => MessageType::Accepted,
        }
    }
}

/// Encode `message` into its wire representation.
///
/// # Panics
///
/// `message` must not be a [`NegativePromise`](crate::messages::NegativePromise): no wire encoding is
/// defined for it, and nothing in this crate ever sends one. This function panics otherwise.
pub fn serialize(message: &Message) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LENGTH + 4 * 8);
    bytes.extend_from_slice(&MAGIC);
    bytes.push(VERSION);
    bytes.push(MessageType::of(message).id());

    match message {
        Message::Heartbeat(Heartbeat { uuid }) => {
            put_i64(&mut bytes, uuid.int());
        }
        Message::Prepare(Prepare { execution_id, n }) => {
            put_i64(&mut bytes, execution_id.int());
            put_i64(&mut bytes, n.int());
        }
        Message::Promise(Promise {
            execution_id,
            promised_n,
            prior_accepted,
        }) => {
            put_i64(&mut bytes, execution_id.int());
            put_i64(&mut bytes, promised_n.int());
            match prior_accepted {
                Some(AcceptedProposal { number, value }) => {
                    put_i64(&mut bytes, number.int());
                    put_i64(&mut bytes, value.int());
                }
                None => {
                    put_i64(&mut bytes, NO_PRIOR_ACCEPTED);
                    put_i64(&mut bytes, NO_PRIOR_ACCEPTED);
                }
            }
        }
        Message::PleaseAccept(PleaseAccept {
            execution_id,
            n,
            value,
        })
        | Message::Accepted(Accepted {
            execution_id,
            n,
            value,
        }) => {
            put_i64(&mut bytes, execution_id.int());
            put_i64(&mut bytes, n.int());
            put_i64(&mut bytes, value.int());
        }
        Message::NegativePromise(_) => {
            panic!("serialize called for a message type with no wire encoding: {}", message)
        }
    }

    bytes
}

/// Check whether `bytes` is long enough to hold a header and starts with [`MAGIC`].
pub fn validate(bytes: &[u8]) -> bool {
    bytes.len() >= HEADER_LENGTH && bytes[..MAGIC.len()] == MAGIC
}

/// Decode a message from its wire representation.
///
/// Returns `None` if `bytes` fails [`validate`], if the message type byte is unknown or has no decoder
/// (NegativePromise), or if the payload is truncated. The version byte is not checked.
pub fn deserialize(bytes: &[u8]) -> Option<Message> {
    if !validate(bytes) {
        return None;
    }

    let message_type = match MessageType::from_id(bytes[MAGIC.len() + 1]) {
        Some(message_type) => message_type,
        None => {
            log::debug!("unknown message type {}", bytes[MAGIC.len() + 1]);
            return None;
        }
    };

    let mut reader = &bytes[HEADER_LENGTH..];
    let message = match message_type {
        MessageType::Heartbeat => Message::Heartbeat(Heartbeat {
            uuid: HeartbeatId::new(read_i64(&mut reader)?),
        }),
        MessageType::Prepare => Message::Prepare(Prepare {
            execution_id: ExecutionId::new(read_i64(&mut reader)?),
            n: ProposalNumber::new(read_i64(&mut reader)?),
        }),
        MessageType::Promise => {
            let execution_id = ExecutionId::new(read_i64(&mut reader)?);
            let promised_n = ProposalNumber::new(read_i64(&mut reader)?);
            let prior_accepted_n = read_i64(&mut reader)?;
            let prior_accepted_value = read_i64(&mut reader)?;
            let prior_accepted = if prior_accepted_n < 0 {
                None
            } else {
                Some(AcceptedProposal::new(
                    ProposalNumber::new(prior_accepted_n),
                    Value::new(prior_accepted_value),
                ))
            };
            Message::Promise(Promise {
                execution_id,
                promised_n,
                prior_accepted,
            })
        }
        MessageType::PleaseAccept => Message::PleaseAccept(PleaseAccept {
            execution_id: ExecutionId::new(read_i64(&mut reader)?),
            n: ProposalNumber::new(read_i64(&mut reader)?),
            value: Value::new(read_i64(&mut reader)?),
        }),
        MessageType::Accepted => Message::Accepted(Accepted {
            execution_id: ExecutionId::new(read_i64(&mut reader)?),
            n: ProposalNumber::new(read_i64(&mut reader)?),
            value: Value::new(read_i64(&mut reader)?),
        }),
        MessageType::NegativePromise => return None,
    };

    Some(message)
}

fn put_i64(bytes: &mut Vec<u8>, int: i64) {
    bytes.extend_from_slice(&int.to_be_bytes());
}

fn read_i64(reader: &mut &[u8]) -> Option<i64> {
    if reader.len() < 8 {
        return None;
    }
    let (int_bytes, rest) = reader.split_at(8);
    *reader = rest;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(int_bytes);
    Some(i64::from_be_bytes(buf))
}
