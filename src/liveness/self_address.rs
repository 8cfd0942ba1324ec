/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Discovery of the address this node's broadcasts appear to come from.
//!
//! A node cannot reliably tell which of its network addresses other nodes will see as the origin of its
//! packets. But every broadcast is delivered back to the sender, stamped with that origin. So before each
//! heartbeat is sent, its random id is recorded with [`about_to_send`](SelfAddressTracker::about_to_send).
//! When a heartbeat carrying one of the recently sent ids is received,
//! [`received_heartbeat`](SelfAddressTracker::received_heartbeat) records the address it arrived from.
//!
//! Once more than [`MATCH_THRESHOLD`] of the recorded matches (among those whose ids are still within the
//! last [`WINDOW_SIZE`] sent) agree on one address, that address is taken to be this node's own.
//!
//! The tracker is shared between the thread that sends heartbeats and the thread that receives them, so
//! its state lives behind a single mutex.

use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    sync::{Mutex, PoisonError},
};

use crate::types::data_types::{HeartbeatId, PeerAddress};

/// Number of sent heartbeat ids, and of matching received heartbeats, that are remembered.
pub const WINDOW_SIZE: usize = 10;

/// An address is accepted once it accounts for strictly more than this many matches.
pub const MATCH_THRESHOLD: usize = 3;

pub type DiscoveryCallback = Box<dyn Fn(&PeerAddress) + Send + Sync>;

#[derive(Default)]
struct Windows {
    sent_uuids: VecDeque<HeartbeatId>,
    matching_received: VecDeque<(HeartbeatId, PeerAddress)>,
}

fn push_bounded<T>(window: &mut VecDeque<T>, item: T) {
    if window.len() == WINDOW_SIZE {
        window.pop_front();
    }
    window.push_back(item);
}

#[derive(Default)]
pub struct SelfAddressTracker {
    windows: Mutex<Windows>,
    on_discover: Option<DiscoveryCallback>,
}

impl SelfAddressTracker {
    /// Create a tracker with no discovery callback. Discoveries are still returned from
    /// [`received_heartbeat`](Self::received_heartbeat).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker that calls `on_discover` every time an address is accepted.
    pub fn with_callback(on_discover: impl Fn(&PeerAddress) + Send + Sync + 'static) -> Self {
        Self {
            windows: Mutex::new(Windows::default()),
            on_discover: Some(Box::new(on_discover)),
        }
    }

    /// Record the id of a heartbeat that is about to be broadcast.
    pub fn about_to_send(&self, uuid: HeartbeatId) {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        push_bounded(&mut windows.sent_uuids, uuid);
    }

    /// Record a received heartbeat.
    ///
    /// Heartbeats whose ids were not recently sent by this node are ignored. Otherwise, the per-address
    /// counts are recomputed, and if the highest count exceeds [`MATCH_THRESHOLD`], the callback (if any) is
    /// called with that address and the address is returned. This happens on every match once the
    /// threshold is exceeded, not just the first.
    pub fn received_heartbeat(&self, uuid: HeartbeatId, source: &PeerAddress) -> Option<PeerAddress> {
        let discovered = {
            let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
            if !windows.sent_uuids.contains(&uuid) {
                return None;
            }
            push_bounded(&mut windows.matching_received, (uuid, source.clone()));
            Self::most_matched_address(&windows)
        };

        let (address, count) = discovered?;
        if count <= MATCH_THRESHOLD {
            return None;
        }

        log::info!("self address {} confidence {}/{}", address, count, WINDOW_SIZE);
        if let Some(on_discover) = &self.on_discover {
            on_discover(&address);
        }
        Some(address)
    }

    // Ties are broken in favour of the lowest address.
    fn most_matched_address(windows: &Windows) -> Option<(PeerAddress, usize)> {
        let sent: HashSet<&HeartbeatId> = windows.sent_uuids.iter().collect();
        let mut counts: BTreeMap<&PeerAddress, usize> = BTreeMap::new();
        for (uuid, address) in &windows.matching_received {
            if sent.contains(uuid) {
                *counts.entry(address).or_insert(0) += 1;
            }
        }

        counts
            .into_iter()
            .fold(None, |best: Option<(&PeerAddress, usize)>, (address, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((address, count)),
            })
            .map(|(address, count)| (address.clone(), count))
    }
}
