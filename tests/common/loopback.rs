use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
};

use broadcast_paxos::{networking::packet::PacketChannel, types::data_types::PeerAddress};

type Inbox = Arc<Mutex<VecDeque<(Vec<u8>, PeerAddress)>>>;

/// An in-process stand-in for a multicast group: every packet sent by a member is queued at every member,
/// including the sender, tagged with the sender's address.
pub(crate) struct LoopbackChannel {
    my_address: PeerAddress,
    members: Vec<Inbox>,
    inbox: Inbox,
    pub(crate) fail_sends: bool,
}

impl LoopbackChannel {
    /// Queue a raw packet at this member as if it had arrived from `origin`.
    pub(crate) fn inject(&self, bytes: Vec<u8>, origin: PeerAddress) {
        self.inbox.lock().unwrap().push_back((bytes, origin));
    }

    pub(crate) fn pending(&self) -> usize {
        self.inbox.lock().unwrap().len()
    }
}

impl PacketChannel for LoopbackChannel {
    fn send_packet(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.fail_sends {
            return Err(io::Error::new(io::ErrorKind::Other, "send failed"));
        }
        for member in &self.members {
            member
                .lock()
                .unwrap()
                .push_back((bytes.to_vec(), self.my_address.clone()));
        }
        Ok(())
    }

    fn recv_packet(&mut self) -> io::Result<Option<(Vec<u8>, PeerAddress)>> {
        Ok(self.inbox.lock().unwrap().pop_front())
    }
}

pub(crate) fn loopback_group(addresses: &[&str]) -> Vec<LoopbackChannel> {
    let inboxes: Vec<Inbox> = addresses
        .iter()
        .map(|_| Arc::new(Mutex::new(VecDeque::new())))
        .collect();

    addresses
        .iter()
        .zip(inboxes.iter())
        .map(|(address, inbox)| LoopbackChannel {
            my_address: PeerAddress::new(*address),
            members: inboxes.clone(),
            inbox: Arc::clone(inbox),
            fail_sends: false,
        })
        .collect()
}
