//! Tests for nodes running in the background, connected by a channel-based mock network.

mod common;

use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use broadcast_paxos::{
    messages::{Accepted, Message},
    networking::transport::Transport,
    paxos::node::PaxosError,
    runtime::{Configuration, Runtime, RuntimeError, RuntimeSpec},
    types::data_types::{ExecutionId, HeartbeatId, PeerAddress, ProposalNumber, Value},
};

use common::{logging::setup_logger, network::mock_network};

const ADDRESSES: [&str; 3] = ["10.0.0.1", "10.0.0.2", "10.0.0.3"];

type Learned = Arc<Mutex<Vec<(PeerAddress, Accepted)>>>;

struct TestNode {
    runtime: Runtime,
    learned: Learned,
    discovered: Arc<Mutex<Vec<PeerAddress>>>,
}

fn start_nodes() -> Vec<TestNode> {
    let peers = ADDRESSES.iter().map(|address| PeerAddress::new(*address));
    mock_network(peers)
        .into_iter()
        .enumerate()
        .map(|(i, transport)| {
            let learned: Learned = Arc::new(Mutex::new(Vec::new()));
            let discovered = Arc::new(Mutex::new(Vec::new()));

            let configuration = Configuration::builder()
                .node_id(format!("node-{}", i))
                .heartbeat_interval(Duration::from_millis(20))
                .dispatch_timeout(Duration::from_millis(5))
                .log_events(true)
                .build();

            let runtime = {
                let learned = Arc::clone(&learned);
                let discovered = Arc::clone(&discovered);
                RuntimeSpec::builder()
                    .transport(transport)
                    .configuration(configuration)
                    .on_receive_accepted(move |event| {
                        learned
                            .lock()
                            .unwrap()
                            .push((event.origin.clone(), event.accepted))
                    })
                    .on_discover_self_address(move |event| {
                        discovered.lock().unwrap().push(event.address.clone())
                    })
                    .build()
                    .start()
            };

            TestNode {
                runtime,
                learned,
                discovered,
            }
        })
        .collect()
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting until {}", what);
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn runtimes_discover_peers_and_own_address_test() {
    setup_logger(log::LevelFilter::Info);
    let nodes = start_nodes();

    wait_until("every node knows every peer", || {
        nodes
            .iter()
            .all(|node| node.runtime.peers().unwrap().len() == ADDRESSES.len())
    });

    for (node, address) in nodes.iter().zip(ADDRESSES) {
        let peers: Vec<PeerAddress> = node
            .runtime
            .peers()
            .unwrap()
            .into_iter()
            .map(|(peer, _)| peer)
            .collect();
        assert_eq!(
            peers,
            ADDRESSES.iter().map(|a| PeerAddress::new(*a)).collect::<Vec<_>>()
        );

        wait_until("the node adopts its own address", || {
            node.runtime.node_id().unwrap() == PeerAddress::new(address)
        });
    }

    wait_until("self address discovery is published", || {
        nodes.iter().all(|node| !node.discovered.lock().unwrap().is_empty())
    });
    for (node, address) in nodes.iter().zip(ADDRESSES) {
        // Published once, when the id first changes.
        assert_eq!(
            *node.discovered.lock().unwrap(),
            vec![PeerAddress::new(address)]
        );
    }
}

#[test]
fn runtimes_agree_on_proposed_value_test() {
    setup_logger(log::LevelFilter::Info);
    let nodes = start_nodes();

    wait_until("every node knows every peer", || {
        nodes
            .iter()
            .all(|node| node.runtime.peers().unwrap().len() == ADDRESSES.len())
    });

    let execution_id = nodes[0].runtime.propose(|| Value::new(42)).unwrap();

    wait_until("every node learns every acceptance", || {
        nodes
            .iter()
            .all(|node| node.learned.lock().unwrap().len() == ADDRESSES.len())
    });

    for node in &nodes {
        let learned = node.learned.lock().unwrap();
        let mut origins: Vec<&PeerAddress> = learned.iter().map(|(origin, _)| origin).collect();
        origins.sort();
        assert_eq!(origins.len(), ADDRESSES.len());
        origins.dedup();
        assert_eq!(origins.len(), ADDRESSES.len());
        assert!(learned
            .iter()
            .all(|(_, accepted)| accepted.execution_id == execution_id
                && accepted.value == Value::new(42)));
    }

    drop(nodes);
}

#[test]
fn extreme_ids_from_peers_do_not_stop_dispatch_test() {
    setup_logger(log::LevelFilter::Info);
    let peers = ["10.0.0.1", "10.0.0.9"].iter().map(|address| PeerAddress::new(*address));
    let mut transports = mock_network(peers).into_iter();
    let transport = transports.next().unwrap();
    let mut peer = transports.next().unwrap();

    let configuration = Configuration::builder()
        .node_id("10.0.0.1")
        .heartbeat_interval(Duration::from_millis(20))
        .dispatch_timeout(Duration::from_millis(5))
        .log_events(false)
        .build();
    let runtime = RuntimeSpec::builder()
        .transport(transport)
        .configuration(configuration)
        .build()
        .start();

    let e1 = ExecutionId::new(1);
    let last = ExecutionId::new(i64::MAX);
    peer.send(Message::prepare(last, ProposalNumber::new(1)))
        .unwrap();
    peer.send(Message::prepare(e1, ProposalNumber::new(i64::MAX)))
        .unwrap();
    // Delivered after both prepares.
    peer.send(Message::heartbeat(HeartbeatId::new(0))).unwrap();

    wait_until("the peer's heartbeat is processed", || {
        runtime
            .peers()
            .unwrap()
            .iter()
            .any(|(address, _)| *address == PeerAddress::new("10.0.0.9"))
    });

    assert!(matches!(
        runtime.propose(|| Value::new(1)),
        Err(RuntimeError::Paxos(PaxosError::ExecutionIdsExhausted))
    ));
    assert!(matches!(
        runtime.propose_for(e1, || Value::new(1)),
        Err(RuntimeError::Paxos(PaxosError::ProposalNumbersExhausted(_)))
    ));

    runtime.propose_for(ExecutionId::new(5), || Value::new(1)).unwrap();
    assert_eq!(runtime.node_id().unwrap(), PeerAddress::new("10.0.0.1"));
}
