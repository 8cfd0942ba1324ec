//! Tests for the packet transport, over an in-process loopback channel.

mod common;

use broadcast_paxos::{
    codec::{self, MAGIC, VERSION},
    messages::Message,
    networking::{
        packet::PacketTransport,
        transport::{Transport, TransportError},
    },
    paxos::node::{PaxosError, PaxosNode},
    types::data_types::{ExecutionId, HeartbeatId, PeerAddress, ProposalNumber, Value},
};

use common::{
    logging::setup_logger,
    loopback::{loopback_group, LoopbackChannel},
};

fn addr(address: &str) -> PeerAddress {
    PeerAddress::new(address)
}

fn bad_magic_packet() -> Vec<u8> {
    let mut bytes = codec::serialize(&Message::heartbeat(HeartbeatId::new(1)));
    bytes[0] = 0xff;
    bytes
}

#[test]
fn packet_with_bad_magic_is_dropped_test() {
    setup_logger(log::LevelFilter::Debug);

    let channel = loopback_group(&["10.0.0.1"]).pop().unwrap();
    let transport = PacketTransport::new(channel);

    assert!(!transport.on_packet(&bad_magic_packet(), addr("10.0.0.2")));
    assert_eq!(transport.inbound_len(), 0);

    let mut negative_promise = MAGIC.to_vec();
    negative_promise.extend_from_slice(&[VERSION, 5]);
    negative_promise.extend_from_slice(&[0; 32]);
    assert!(!transport.on_packet(&negative_promise, addr("10.0.0.2")));
    assert!(!transport.on_packet(&[], addr("10.0.0.2")));
    assert_eq!(transport.inbound_len(), 0);

    let heartbeat = Message::heartbeat(HeartbeatId::new(5));
    assert!(transport.on_packet(&codec::serialize(&heartbeat), addr("10.0.0.2")));
    assert_eq!(transport.inbound_len(), 1);
}

#[test]
fn received_packets_are_stamped_with_origin_test() {
    let channel = loopback_group(&["10.0.0.1"]).pop().unwrap();
    channel.inject(bad_magic_packet(), addr("10.0.0.3"));
    let prepare = Message::prepare(ExecutionId::new(4), ProposalNumber::new(2));
    channel.inject(codec::serialize(&prepare), addr("10.0.0.2"));
    assert_eq!(channel.pending(), 2);

    let mut transport = PacketTransport::new(channel);
    assert_eq!(transport.recv(), Some((addr("10.0.0.2"), prepare)));
    assert_eq!(transport.recv(), None);
}

#[test]
fn broadcasts_loop_back_to_sender_test() {
    let mut channels = loopback_group(&["10.0.0.1", "10.0.0.2"]).into_iter();
    let mut a = PacketTransport::new(channels.next().unwrap());
    let mut b = PacketTransport::new(channels.next().unwrap());

    let accepted = Message::accepted(ExecutionId::new(1), ProposalNumber::new(3), Value::new(-7));
    a.send(accepted.clone()).unwrap();

    assert_eq!(a.recv(), Some((addr("10.0.0.1"), accepted.clone())));
    assert_eq!(b.recv(), Some((addr("10.0.0.1"), accepted)));
    assert_eq!(a.recv(), None);
}

#[test]
fn send_failure_is_reported_test() {
    let mut channel: LoopbackChannel = loopback_group(&["10.0.0.1"]).pop().unwrap();
    channel.fail_sends = true;
    let transport = PacketTransport::new(channel);

    let mut node = PaxosNode::new("10.0.0.1", transport.clone());
    match node.send_message(Message::heartbeat(HeartbeatId::new(1))) {
        Err(PaxosError::Transport(TransportError::Io(_))) => (),
        other => panic!("expected an io error, got {:?}", other),
    }
    assert!(matches!(
        node.send_prepare(|| Value::new(1)),
        Err(PaxosError::Transport(TransportError::Io(_)))
    ));
}

#[test]
fn nodes_reach_consensus_over_packets_test() {
    let names = ["10.0.0.1", "10.0.0.2", "10.0.0.3"];
    let mut nodes: Vec<PaxosNode<PacketTransport<LoopbackChannel>>> = loopback_group(&names)
        .into_iter()
        .zip(names)
        .map(|(channel, name)| PaxosNode::new(name, PacketTransport::new(channel)))
        .collect();

    for (i, node) in nodes.iter_mut().enumerate() {
        node.send_message(Message::heartbeat(HeartbeatId::new(i as i64)))
            .unwrap();
    }
    for node in nodes.iter_mut() {
        node.receive_messages();
    }

    let execution_id = nodes[1].send_prepare(|| Value::new(7)).unwrap();
    assert_eq!(execution_id, ExecutionId::new(1));

    let mut rounds = 0;
    while nodes.iter_mut().map(|node| node.receive_messages()).sum::<usize>() > 0 {
        rounds += 1;
        assert!(rounds < 20, "nodes did not quiesce");
    }

    for node in &nodes {
        assert_eq!(node.peer_registry().len(), 3);
        let state = node.execution_state(execution_id).unwrap();
        assert_eq!(state.accepts().get(&ProposalNumber::new(1)), Some(&Value::new(7)));
        assert_eq!(state.accepted_messages().len(), 3);
    }
}
