/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Quorum arithmetic.

use std::collections::HashSet;

use crate::types::data_types::PeerAddress;

/// Whether the distinct peers in `received` outnumber the `alive` peers that are not in `received`.
///
/// Peers in `received` that are not `alive` still count towards the majority. When every received peer is
/// alive this is equivalent to `2 * |received| > |alive|`.
pub fn have_majority<'a, I>(alive: &HashSet<PeerAddress>, received: I) -> bool
where
    I: IntoIterator<Item = &'a PeerAddress>,
{
    let received: HashSet<&PeerAddress> = received.into_iter().collect();
    let missing = alive.iter().filter(|peer| !received.contains(peer)).count();
    received.len() > missing
}
