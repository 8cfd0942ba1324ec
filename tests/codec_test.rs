//! Tests for the wire encoding of messages.

use broadcast_paxos::{
    codec::{self, MessageType, HEADER_LENGTH, MAGIC, MAX_PACKET_SIZE, VERSION},
    messages::{Message, NegativePromise},
    types::data_types::{AcceptedProposal, ExecutionId, HeartbeatId, ProposalNumber, Value},
};

fn e(int: i64) -> ExecutionId {
    ExecutionId::new(int)
}

fn n(int: i64) -> ProposalNumber {
    ProposalNumber::new(int)
}

fn v(int: i64) -> Value {
    Value::new(int)
}

#[test]
fn heartbeat_wire_layout_test() {
    let bytes = codec::serialize(&Message::heartbeat(HeartbeatId::new(1)));
    assert_eq!(
        bytes,
        vec![
            0x0c, 0x00, 0x01, 0x01, 0x0a, 0x0b, // magic
            0x00, // version
            0x00, // message type
            0, 0, 0, 0, 0, 0, 0, 1, // uuid
        ]
    );
}

#[test]
fn promise_wire_layout_test() {
    let bytes = codec::serialize(&Message::promise(
        e(3),
        n(2),
        Some(AcceptedProposal::new(n(1), v(258))),
    ));
    assert_eq!(bytes.len(), HEADER_LENGTH + 4 * 8);
    assert_eq!(&bytes[..6], &MAGIC);
    assert_eq!(bytes[6], VERSION);
    assert_eq!(bytes[7], MessageType::Promise.id());
    assert_eq!(&bytes[8..16], &3i64.to_be_bytes());
    assert_eq!(&bytes[16..24], &2i64.to_be_bytes());
    assert_eq!(&bytes[24..32], &1i64.to_be_bytes());
    assert_eq!(&bytes[32..40], &[0, 0, 0, 0, 0, 0, 1, 2]);
}

#[test]
fn promise_without_prior_accepted_is_written_as_minus_one_test() {
    let bytes = codec::serialize(&Message::promise(e(1), n(1), None));
    assert_eq!(&bytes[24..32], &(-1i64).to_be_bytes());
    assert_eq!(&bytes[32..40], &(-1i64).to_be_bytes());
    assert_eq!(
        codec::deserialize(&bytes),
        Some(Message::promise(e(1), n(1), None))
    );
}

#[test]
fn round_trip_test() {
    let messages = vec![
        Message::heartbeat(HeartbeatId::new(-7_243_116_000_123)),
        Message::prepare(e(1), n(1)),
        Message::prepare(e(i64::MAX), n(i64::MAX)),
        Message::promise(e(2), n(5), None),
        Message::promise(e(2), n(5), Some(AcceptedProposal::new(n(4), v(42)))),
        // A prior accepted value of -1 is a real value, not "none".
        Message::promise(e(2), n(5), Some(AcceptedProposal::new(n(3), v(-1)))),
        Message::please_accept(e(9), n(3), v(-100)),
        Message::accepted(e(9), n(3), v(i64::MIN)),
    ];

    for msg in messages {
        let bytes = codec::serialize(&msg);
        assert!(codec::validate(&bytes));
        assert!(bytes.len() <= MAX_PACKET_SIZE);
        assert_eq!(codec::deserialize(&bytes), Some(msg));
    }
}

#[test]
fn negative_prior_accepted_n_decodes_as_none_test() {
    let mut bytes = codec::serialize(&Message::promise(
        e(1),
        n(2),
        Some(AcceptedProposal::new(n(1), v(5))),
    ));
    bytes[24..32].copy_from_slice(&(-3i64).to_be_bytes());
    assert_eq!(
        codec::deserialize(&bytes),
        Some(Message::promise(e(1), n(2), None))
    );
}

#[test]
fn validate_test() {
    let bytes = codec::serialize(&Message::prepare(e(1), n(1)));
    assert!(codec::validate(&bytes));

    // A bare header is valid.
    assert!(codec::validate(&bytes[..HEADER_LENGTH]));
    assert!(!codec::validate(&bytes[..HEADER_LENGTH - 1]));
    assert!(!codec::validate(&[]));

    let mut bad_magic = bytes.clone();
    bad_magic[0] = 0x0d;
    assert!(!codec::validate(&bad_magic));
    assert_eq!(codec::deserialize(&bad_magic), None);
}

#[test]
fn deserialize_rejects_truncated_payload_test() {
    let bytes = codec::serialize(&Message::accepted(e(1), n(2), v(3)));
    for len in HEADER_LENGTH..bytes.len() {
        assert_eq!(codec::deserialize(&bytes[..len]), None, "length {}", len);
    }
}

#[test]
fn deserialize_rejects_unknown_and_undecodable_types_test() {
    let mut bytes = codec::serialize(&Message::accepted(e(1), n(2), v(3)));

    bytes[7] = 6;
    assert_eq!(codec::deserialize(&bytes), None);

    bytes[7] = 0xff;
    assert_eq!(codec::deserialize(&bytes), None);

    // Negative promises have a type id but no decoder.
    bytes[7] = MessageType::NegativePromise.id();
    assert_eq!(codec::deserialize(&bytes), None);
}

#[test]
fn version_byte_is_not_checked_test() {
    let mut bytes = codec::serialize(&Message::prepare(e(1), n(1)));
    bytes[6] = 7;
    assert_eq!(
        codec::deserialize(&bytes),
        Some(Message::prepare(e(1), n(1)))
    );
}

#[test]
fn message_type_ids_test() {
    for id in 0..=5 {
        assert_eq!(MessageType::from_id(id).map(|t| t.id()), Some(id));
    }
    assert_eq!(MessageType::from_id(6), None);
}

#[test]
#[should_panic]
fn serializing_negative_promise_panics_test() {
    codec::serialize(&Message::NegativePromise(NegativePromise {
        execution_id: e(1),
        n: n(1),
        prior_promised_n: n(2),
        prior_accepted: None,
    }));
}
