//! Rank-addressed messaging
//!
//! The worker set is a fixed mesh of endpoints built once at launch. Every
//! ordered pair of ranks gets its own unbounded channel, so:
//!
//! - "send to rank i" is a send on the channel owned by (self, i)
//! - "receive from rank i" blocks on the (i, self) channel only, independent of
//!   traffic from any other rank
//! - messages between two ranks arrive in the order they were sent
//!
//! There are no timeouts. A receive blocks until the peer sends, or fails with
//! [`CommError::Disconnected`] once the peer's endpoint is gone and nothing is
//! left in the channel. Either way a missing message is fatal to the run.

pub mod protocol;

pub use protocol::{Message, Tag};

use crossbeam::channel::{self, Receiver, Sender};
use thiserror::Error;

/// Worker identity within the worker set
pub type Rank = usize;

/// Rank that validates configuration and produces the final result
pub const COORDINATOR: Rank = 0;

/// Messaging failures
#[derive(Debug, Error)]
pub enum CommError {
    #[error("rank {rank} is outside a worker set of size {size}")]
    NoSuchRank { rank: Rank, size: usize },

    #[error("rank {rank} cannot message itself")]
    SelfMessage { rank: Rank },

    #[error("rank {peer} went away before sending {expected}")]
    Disconnected { peer: Rank, expected: Tag },

    #[error("rank {peer} went away; {kind} was not delivered")]
    Undeliverable { peer: Rank, kind: &'static str },

    #[error("expected {expected} from rank {peer}, got {got}")]
    UnexpectedMessage {
        peer: Rank,
        expected: Tag,
        got: &'static str,
    },
}

/// One rank's view of the mesh
///
/// Holds a sender to every other rank and a receiver from every other rank.
/// Dropping an endpoint disconnects all of its outgoing channels.
#[derive(Debug)]
pub struct Endpoint {
    rank: Rank,
    outboxes: Vec<Option<Sender<Message>>>,
    inboxes: Vec<Option<Receiver<Message>>>,
}

impl Endpoint {
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Number of ranks in the worker set
    pub fn size(&self) -> usize {
        self.outboxes.len()
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR
    }

    /// All other ranks, ascending
    pub fn peers(&self) -> impl Iterator<Item = Rank> + '_ {
        let me = self.rank;
        (0..self.size()).filter(move |&r| r != me)
    }

    /// Send `msg` to `dest`
    ///
    /// Never blocks; channels are unbounded.
    pub fn send(&self, dest: Rank, msg: Message) -> Result<(), CommError> {
        let kind = msg.kind();
        let outbox = self.outbox(dest)?;
        log::trace!("rank {} -> rank {}: {}", self.rank, dest, kind);
        outbox
            .send(msg)
            .map_err(|_| CommError::Undeliverable { peer: dest, kind })
    }

    /// Block until the next message from `source` arrives
    ///
    /// The message must carry `expected`; anything else means the peers
    /// disagree about the protocol phase.
    pub fn recv(&self, source: Rank, expected: Tag) -> Result<Message, CommError> {
        let inbox = self.inbox(source)?;
        let msg = inbox.recv().map_err(|_| CommError::Disconnected {
            peer: source,
            expected,
        })?;
        log::trace!("rank {} <- rank {}: {}", self.rank, source, msg.kind());

        if msg.tag() != expected {
            return Err(CommError::UnexpectedMessage {
                peer: source,
                expected,
                got: msg.kind(),
            });
        }
        Ok(msg)
    }

    fn outbox(&self, dest: Rank) -> Result<&Sender<Message>, CommError> {
        self.check_peer(dest)?;
        self.outboxes[dest]
            .as_ref()
            .ok_or(CommError::SelfMessage { rank: self.rank })
    }

    fn inbox(&self, source: Rank) -> Result<&Receiver<Message>, CommError> {
        self.check_peer(source)?;
        self.inboxes[source]
            .as_ref()
            .ok_or(CommError::SelfMessage { rank: self.rank })
    }

    fn check_peer(&self, peer: Rank) -> Result<(), CommError> {
        if peer >= self.size() {
            return Err(CommError::NoSuchRank {
                rank: peer,
                size: self.size(),
            });
        }
        if peer == self.rank {
            return Err(CommError::SelfMessage { rank: self.rank });
        }
        Ok(())
    }
}

/// Build the fully connected mesh for `size` ranks
///
/// Returns one endpoint per rank, indexed by rank.
pub fn mesh(size: usize) -> Vec<Endpoint> {
    let mut outboxes: Vec<Vec<Option<Sender<Message>>>> =
        (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
    let mut inboxes: Vec<Vec<Option<Receiver<Message>>>> =
        (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

    for src in 0..size {
        for dst in 0..size {
            if src == dst {
                continue;
            }
            let (tx, rx) = channel::unbounded();
            outboxes[src][dst] = Some(tx);
            inboxes[dst][src] = Some(rx);
        }
    }

    outboxes
        .into_iter()
        .zip(inboxes)
        .enumerate()
        .map(|(rank, (outboxes, inboxes))| Endpoint {
            rank,
            outboxes,
            inboxes,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Real;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_mesh_shape() {
        let endpoints = mesh(4);
        assert_eq!(endpoints.len(), 4);
        for (rank, ep) in endpoints.iter().enumerate() {
            assert_eq!(ep.rank(), rank);
            assert_eq!(ep.size(), 4);
            assert_eq!(ep.peers().count(), 3);
            assert!(!ep.peers().any(|p| p == rank));
        }
        assert!(endpoints[0].is_coordinator());
    }

    #[test]
    fn test_fifo_per_pair() {
        let endpoints = mesh(2);
        for n in 0..10 {
            endpoints[0].send(1, Message::Config { total_terms: n }).unwrap();
        }
        for n in 0..10 {
            match endpoints[1].recv(0, Tag::Config).unwrap() {
                Message::Config { total_terms } => assert_eq!(total_terms, n),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_recv_is_per_source() {
        let mut endpoints = mesh(3);
        let coordinator = endpoints.remove(0);

        // Rank 2 sends first; receiving from rank 1 must still wait for rank 1
        endpoints[1]
            .send(0, Message::Partial { owner: 2, value: Real::from(2.0) })
            .unwrap();
        let slow = endpoints.remove(0);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            slow.send(0, Message::Partial { owner: 1, value: Real::from(1.0) })
                .unwrap();
            slow
        });

        match coordinator.recv(1, Tag::Partial).unwrap() {
            Message::Partial { owner, .. } => assert_eq!(owner, 1),
            other => panic!("unexpected {:?}", other),
        }
        match coordinator.recv(2, Tag::Partial).unwrap() {
            Message::Partial { owner, .. } => assert_eq!(owner, 2),
            other => panic!("unexpected {:?}", other),
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_wrong_tag_is_rejected() {
        let endpoints = mesh(2);
        endpoints[1].send(0, Message::Final { value: Real::from(3.0) }).unwrap();
        let err = endpoints[0].recv(1, Tag::Partial).unwrap_err();
        assert!(matches!(
            err,
            CommError::UnexpectedMessage { peer: 1, expected: Tag::Partial, got: "FINAL" }
        ));
    }

    #[test]
    fn test_buffered_message_survives_sender_drop() {
        let mut endpoints = mesh(2);
        let receiver = endpoints.remove(1);
        let sender = endpoints.remove(0);
        sender.send(1, Message::Config { total_terms: 42 }).unwrap();
        drop(sender);

        assert!(receiver.recv(0, Tag::Config).is_ok());
        assert!(matches!(
            receiver.recv(0, Tag::Config),
            Err(CommError::Disconnected { peer: 0, expected: Tag::Config })
        ));
    }

    #[test]
    fn test_invalid_peers() {
        let endpoints = mesh(2);
        assert!(matches!(
            endpoints[0].send(0, Message::Config { total_terms: 1 }),
            Err(CommError::SelfMessage { rank: 0 })
        ));
        assert!(matches!(
            endpoints[0].recv(5, Tag::Config),
            Err(CommError::NoSuchRank { rank: 5, size: 2 })
        ));
    }
}
