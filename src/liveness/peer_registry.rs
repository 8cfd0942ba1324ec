/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Registry of every peer a heartbeat has ever been received from.

use std::{
    collections::{HashMap, HashSet},
    time::SystemTime,
};

use crate::types::data_types::PeerAddress;

/// Map from peer address to the time a heartbeat from it was last received.
///
/// Entries never expire: a peer is "alive" once any heartbeat from it has been observed. Note that this
/// includes the local node itself, since nodes receive their own heartbeats.
#[derive(Clone, Debug, Default)]
pub struct PeerRegistry {
    last_heartbeats: HashMap<PeerAddress, SystemTime>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a heartbeat from `peer` was received at `now`, overwriting any earlier record.
    pub fn update_peer_heartbeat(&mut self, peer: PeerAddress, now: SystemTime) {
        if self.last_heartbeats.insert(peer.clone(), now).is_none() {
            log::info!("discovered peer {}", peer);
        }
    }

    pub fn last_heartbeat(&self, peer: &PeerAddress) -> Option<SystemTime> {
        self.last_heartbeats.get(peer).copied()
    }

    /// Every known peer and the time of its last heartbeat, ordered by address.
    pub fn peers(&self) -> Vec<(PeerAddress, SystemTime)> {
        let mut peers: Vec<(PeerAddress, SystemTime)> = self
            .last_heartbeats
            .iter()
            .map(|(peer, time)| (peer.clone(), *time))
            .collect();
        peers.sort_by(|(a, _), (b, _)| a.cmp(b));
        peers
    }

    /// Every known peer.
    pub fn peers_alive(&self) -> HashSet<PeerAddress> {
        self.last_heartbeats.keys().cloned().collect()
    }

    pub fn contains(&self, peer: &PeerAddress) -> bool {
        self.last_heartbeats.contains_key(peer)
    }

    pub fn len(&self) -> usize {
        self.last_heartbeats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_heartbeats.is_empty()
    }
}
