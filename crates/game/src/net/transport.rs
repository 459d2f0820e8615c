//! Transport seams between the host and its clients, plus an in-process
//! loopback implementation over channels. Payloads cross by value only.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

pub trait HostTransport: Send {
    fn broadcast(&mut self, payload: &[u8]);
    /// Every payload received since the last poll, tagged with its sender.
    fn poll(&mut self) -> Vec<(EntityId, Vec<u8>)>;
}

pub trait ClientTransport: Send {
    fn send(&mut self, payload: &[u8]);
    fn poll(&mut self) -> Vec<Vec<u8>>;
}

/// Simulated packet loss and latency applied on the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkSimulation {
    pub enabled: bool,
    /// 0 to 100.
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

impl LinkSimulation {
    pub fn lossy(loss_percent: f32, min_latency_ms: u32, max_latency_ms: u32) -> Self {
        Self {
            enabled: true,
            loss_percent,
            min_latency_ms,
            max_latency_ms,
            jitter_ms: 0,
        }
    }

    pub fn should_drop(&self) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rand_unit() * 100.0 < self.loss_percent
    }

    pub fn delay_ms(&self) -> u32 {
        if !self.enabled || self.max_latency_ms == 0 {
            return 0;
        }
        let range = self.max_latency_ms.saturating_sub(self.min_latency_ms);
        let jitter = if self.jitter_ms > 0 {
            (rand_unit() * self.jitter_ms as f32) as u32
        } else {
            0
        };
        self.min_latency_ms + (rand_unit() * range as f32) as u32 + jitter
    }
}

fn rand_unit() -> f32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since| since.as_nanos())
        .unwrap_or_default();
    hasher.write_u128(nanos);
    (hasher.finish() % 10_000) as f32 / 10_000.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub payloads_sent: u64,
    pub payloads_received: u64,
    pub payloads_dropped: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug)]
struct Delayed<T> {
    release_at: Instant,
    sequence: u64,
    payload: T,
}

impl<T> PartialEq for Delayed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.release_at == other.release_at && self.sequence == other.sequence
    }
}

impl<T> Eq for Delayed<T> {}

impl<T> PartialOrd for Delayed<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Delayed<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed for a min-heap
        other
            .release_at
            .cmp(&self.release_at)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug)]
struct LinkQueue<T> {
    link: LinkSimulation,
    pending: BinaryHeap<Delayed<T>>,
    sequence: u64,
    stats: LinkStats,
}

impl<T> LinkQueue<T> {
    fn new(link: LinkSimulation) -> Self {
        Self {
            link,
            pending: BinaryHeap::new(),
            sequence: 0,
            stats: LinkStats::default(),
        }
    }

    fn admit(&mut self, payload: T, len: usize) {
        if self.link.should_drop() {
            self.stats.payloads_dropped += 1;
            return;
        }
        self.stats.payloads_received += 1;
        self.stats.bytes_received += len as u64;

        let delay = Duration::from_millis(self.link.delay_ms() as u64);
        self.sequence += 1;
        self.pending.push(Delayed {
            release_at: Instant::now() + delay,
            sequence: self.sequence,
            payload,
        });
    }

    fn release(&mut self) -> Vec<T> {
        let now = Instant::now();
        let mut ready = Vec::new();
        while self.pending.peek().is_some_and(|next| next.release_at <= now) {
            if let Some(delayed) = self.pending.pop() {
                ready.push(delayed.payload);
            }
        }
        ready
    }

    fn record_sent(&mut self, len: usize) {
        self.stats.payloads_sent += 1;
        self.stats.bytes_sent += len as u64;
    }
}

pub struct LoopbackHost {
    clients: Vec<(EntityId, Sender<Vec<u8>>)>,
    inbound: Receiver<(EntityId, Vec<u8>)>,
    queue: LinkQueue<(EntityId, Vec<u8>)>,
}

impl LoopbackHost {
    pub fn stats(&self) -> LinkStats {
        self.queue.stats
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

impl HostTransport for LoopbackHost {
    fn broadcast(&mut self, payload: &[u8]) {
        self.clients.retain(|(id, sender)| {
            let alive = sender.send(payload.to_vec()).is_ok();
            if !alive {
                debug!("client {id} hung up");
            }
            alive
        });
        for _ in 0..self.clients.len() {
            self.queue.record_sent(payload.len());
        }
    }

    fn poll(&mut self) -> Vec<(EntityId, Vec<u8>)> {
        while let Ok((id, payload)) = self.inbound.try_recv() {
            let len = payload.len();
            self.queue.admit((id, payload), len);
        }
        self.queue.release()
    }
}

pub struct LoopbackClient {
    id: EntityId,
    outbound: Sender<(EntityId, Vec<u8>)>,
    inbound: Receiver<Vec<u8>>,
    queue: LinkQueue<Vec<u8>>,
}

impl LoopbackClient {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn stats(&self) -> LinkStats {
        self.queue.stats
    }
}

impl ClientTransport for LoopbackClient {
    fn send(&mut self, payload: &[u8]) {
        if self.outbound.send((self.id, payload.to_vec())).is_err() {
            debug!("host hung up, dropping payload from {}", self.id);
            return;
        }
        self.queue.record_sent(payload.len());
    }

    fn poll(&mut self) -> Vec<Vec<u8>> {
        while let Ok(payload) = self.inbound.try_recv() {
            let len = payload.len();
            self.queue.admit(payload, len);
        }
        self.queue.release()
    }
}

/// One host end and one client end per player, connected by channels.
/// Both directions pass through `link`.
pub fn loopback(players: &[EntityId], link: LinkSimulation) -> (LoopbackHost, Vec<LoopbackClient>) {
    let (to_host, inbound) = mpsc::channel();

    let mut clients = Vec::with_capacity(players.len());
    let mut senders = Vec::with_capacity(players.len());
    for &id in players {
        let (to_client, client_inbound) = mpsc::channel();
        senders.push((id, to_client));
        clients.push(LoopbackClient {
            id,
            outbound: to_host.clone(),
            inbound: client_inbound,
            queue: LinkQueue::new(link),
        });
    }

    let host = LoopbackHost {
        clients: senders,
        inbound,
        queue: LinkQueue::new(link),
    };
    (host, clients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_both_directions() {
        let (mut host, mut clients) = loopback(&[EntityId(0), EntityId(1)], LinkSimulation::default());

        clients[1].send(&[1, 2, 3]);
        clients[0].send(&[4]);
        let mut received = host.poll();
        received.sort_by_key(|(id, _)| *id);
        assert_eq!(received, vec![(EntityId(0), vec![4]), (EntityId(1), vec![1, 2, 3])]);

        host.broadcast(&[9, 9]);
        for client in &mut clients {
            assert_eq!(client.poll(), vec![vec![9, 9]]);
        }
        assert_eq!(host.stats().payloads_sent, 2);
        assert_eq!(host.stats().bytes_received, 4);
    }

    #[test]
    fn full_loss_drops_everything() {
        let (mut host, mut clients) = loopback(&[EntityId(0)], LinkSimulation::lossy(100.0, 0, 0));

        for _ in 0..10 {
            clients[0].send(&[0; 8]);
        }
        assert!(host.poll().is_empty());
        assert_eq!(host.stats().payloads_dropped, 10);
    }

    #[test]
    fn latency_holds_payloads_back() {
        let link = LinkSimulation::lossy(0.0, 5_000, 5_000);
        assert_eq!(link.delay_ms(), 5_000);

        let (mut host, mut clients) = loopback(&[EntityId(0)], link);
        clients[0].send(&[1]);
        assert!(host.poll().is_empty());
        assert_eq!(host.stats().payloads_received, 1);
    }

    #[test]
    fn hung_up_clients_are_forgotten() {
        let (mut host, mut clients) = loopback(&[EntityId(0), EntityId(1)], LinkSimulation::default());
        drop(clients.pop());

        host.broadcast(&[1]);
        assert_eq!(host.client_count(), 1);
        assert_eq!(clients[0].poll(), vec![vec![1]]);
    }

    #[test]
    fn disabled_link_is_transparent() {
        let link = LinkSimulation {
            enabled: false,
            loss_percent: 100.0,
            min_latency_ms: 100,
            max_latency_ms: 200,
            jitter_ms: 50,
        };
        assert!(!link.should_drop());
        assert_eq!(link.delay_ms(), 0);
    }
}
