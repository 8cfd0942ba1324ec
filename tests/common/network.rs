use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
};

use broadcast_paxos::{
    messages::Message,
    networking::transport::{Transport, TransportError},
    types::data_types::PeerAddress,
};

/// A mock transport which passes messages from and to threads using channels. Every broadcast is
/// delivered to every peer, including the sender.
#[derive(Clone)]
pub(crate) struct TransportStub {
    my_address: PeerAddress,
    all_peers: HashMap<PeerAddress, Sender<(PeerAddress, Message)>>,
    inbox: Arc<Mutex<Receiver<(PeerAddress, Message)>>>,
}

impl Transport for TransportStub {
    fn send(&mut self, message: Message) -> Result<(), TransportError> {
        for peer in self.all_peers.values() {
            let _ = peer.send((self.my_address.clone(), message.clone()));
        }
        Ok(())
    }

    fn recv(&mut self) -> Option<(PeerAddress, Message)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok(o_m) => Some(o_m),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!(),
        }
    }
}

pub(crate) fn mock_network(peers: impl Iterator<Item = PeerAddress>) -> Vec<TransportStub> {
    let mut all_peers = HashMap::new();
    let peer_and_inboxes: Vec<(PeerAddress, Receiver<(PeerAddress, Message)>)> = peers
        .map(|peer| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(peer.clone(), sender);

            (peer, receiver)
        })
        .collect();

    peer_and_inboxes
        .into_iter()
        .map(|(my_address, inbox)| TransportStub {
            my_address,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
        })
        .collect()
}
