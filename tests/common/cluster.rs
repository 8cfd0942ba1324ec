use std::collections::{BTreeSet, HashMap, HashSet};

use broadcast_paxos::{
    messages::Heartbeat,
    networking::in_memory::{InMemoryInterconnect, InMemoryTransport},
    paxos::node::PaxosNode,
    types::data_types::{ExecutionId, HeartbeatId, PeerAddress, ProposalNumber, Value},
};

/// A set of nodes connected by an [`InMemoryInterconnect`], driven step by step from the test thread.
pub(crate) struct Cluster {
    pub(crate) interconnect: InMemoryInterconnect,
    pub(crate) nodes: Vec<PaxosNode<InMemoryTransport>>,
}

impl Cluster {
    pub(crate) fn new(names: &[&str]) -> Cluster {
        let mut interconnect = InMemoryInterconnect::new();
        let nodes = names
            .iter()
            .map(|name| PaxosNode::new(*name, interconnect.add_node(*name)))
            .collect();
        Cluster {
            interconnect,
            nodes,
        }
    }

    pub(crate) fn node(&self, name: &str) -> &PaxosNode<InMemoryTransport> {
        self.nodes
            .iter()
            .find(|node| node.node_id().as_str() == name)
            .unwrap()
    }

    pub(crate) fn node_mut(&mut self, name: &str) -> &mut PaxosNode<InMemoryTransport> {
        self.nodes
            .iter_mut()
            .find(|node| node.node_id().as_str() == name)
            .unwrap()
    }

    pub(crate) fn transport(&self, name: &str) -> &InMemoryTransport {
        self.interconnect
            .nodes()
            .iter()
            .find(|transport| transport.node_id().as_str() == name)
            .unwrap()
    }

    /// Let the named nodes process everything in their inbound queues, in the given order.
    pub(crate) fn receive(&mut self, names: &[&str]) {
        for name in names {
            self.node_mut(name).receive_messages();
        }
    }

    pub(crate) fn receive_all(&mut self) {
        for node in &mut self.nodes {
            node.receive_messages();
        }
    }

    pub(crate) fn drain(&mut self) {
        self.interconnect.drain_queues();
    }

    /// Every node broadcasts one heartbeat, and every node processes every heartbeat.
    pub(crate) fn exchange_heartbeats(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.send_message(Heartbeat {
                uuid: HeartbeatId::new(i as i64),
            })
            .unwrap();
        }
        self.drain();
        self.receive_all();
    }

    pub(crate) fn all_inbound_empty(&self) -> bool {
        self.interconnect
            .nodes()
            .iter()
            .all(|transport| transport.inbound_len() == 0)
    }

    /// Alternate between draining the outbound queues and letting every node process its inbound queue,
    /// until no node has anything left to process. Returns the number of rounds taken.
    pub(crate) fn run_until_quiet(&mut self, max_rounds: usize) -> usize {
        self.drain();
        for round in 0..max_rounds {
            self.receive_all();
            self.drain();
            if self.all_inbound_empty() {
                return round + 1;
            }
        }
        panic!("cluster did not quiesce within {} rounds", max_rounds)
    }

    /// Values that were accepted under the same proposal number by a majority of the cluster, according
    /// to the union of every node's learned `Accepted` messages.
    pub(crate) fn majority_values(&self, execution_id: ExecutionId) -> BTreeSet<Value> {
        let mut acceptors: HashMap<(ProposalNumber, Value), HashSet<PeerAddress>> = HashMap::new();
        for node in &self.nodes {
            if let Some(state) = node.execution_state(execution_id) {
                for (origin, accepted) in state.accepted_messages() {
                    acceptors
                        .entry((accepted.n, accepted.value))
                        .or_default()
                        .insert(origin.clone());
                }
            }
        }

        acceptors
            .into_iter()
            .filter(|(_, origins)| origins.len() * 2 > self.nodes.len())
            .map(|((_, value), _)| value)
            .collect()
    }
}
