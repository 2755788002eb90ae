//! In-process participant group
//!
//! A group is a fixed set of ranks `0..size` wired together with unbounded
//! tokio channels, one inbox per rank. Each rank owns a [`Communicator`] and runs
//! in its own task; the communicator is the only way participants interact.
//!
//! # Liveness
//!
//! Waits inside a collective are bounded by the heartbeat timeout. Every
//! participant emits a heartbeat at the heartbeat interval while it waits or
//! while it runs local work through [`Communicator::while_busy`]:
//!
//! - Workers beat to the coordinator, the coordinator beats to every member.
//! - The coordinator evicts a rank that stays silent for the timeout during a
//!   fan-in. The shrunk membership travels in that collective's RELEASE, so all
//!   survivors continue with the same group size.
//! - A worker that hears nothing from the coordinator for the timeout fails
//!   with [`CollectiveError::CoordinatorLost`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::error::CollectiveError;
use super::protocol::{decode_payload, encode_payload, CollectiveOp, Envelope, COORDINATOR_RANK};

/// Default time a participant may stay silent before it is considered lost
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default period between heartbeats
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// Heartbeat settings shared by every member of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Silence after which a peer is considered lost
    pub timeout: Duration,
    /// Period between heartbeats (must be non-zero and below `timeout`)
    pub interval: Duration,
}

impl HeartbeatConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL)
    }
}

/// Identity of a participant within its group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantContext {
    /// Unique rank, assigned when the group is created
    pub rank: u32,
    /// Current number of members
    pub group_size: u32,
    /// Whether this participant is the coordinator (rank 0)
    pub is_coordinator: bool,
}

/// Create a group of `size` connected communicators, indexed by rank
pub fn create_group(size: u32, heartbeat: HeartbeatConfig) -> Vec<Communicator> {
    let (senders, receivers): (Vec<_>, Vec<_>) =
        (0..size).map(|_| mpsc::unbounded_channel::<Envelope>()).unzip();
    let members: Vec<u32> = (0..size).collect();

    receivers
        .into_iter()
        .zip(0..size)
        .map(|(inbox, rank)| Communicator {
            rank,
            members: members.clone(),
            peers: senders.clone(),
            inbox,
            pending: VecDeque::new(),
            seq: 0,
            heartbeat,
            evicted: Vec::new(),
        })
        .collect()
}

/// A participant's handle on its group
///
/// All collectives are rooted at the coordinator and must be called by every
/// current member in the same order.
pub struct Communicator {
    rank: u32,
    /// Current members, ascending
    members: Vec<u32>,
    /// Senders to every rank's inbox, indexed by rank
    peers: Vec<mpsc::UnboundedSender<Envelope>>,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    /// Envelopes received ahead of the collective they belong to
    pending: VecDeque<Envelope>,
    /// Number of collectives entered so far
    seq: u64,
    heartbeat: HeartbeatConfig,
    /// Ranks evicted by this coordinator, in eviction order
    evicted: Vec<u32>,
}

impl Communicator {
    pub fn rank(&self) -> u32 {
        self.rank
    }

    /// Current group size
    pub fn size(&self) -> u32 {
        self.members.len() as u32
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR_RANK
    }

    /// Ranks this participant evicted (only ever non-empty on the coordinator)
    pub fn evicted(&self) -> &[u32] {
        &self.evicted
    }

    pub fn context(&self) -> ParticipantContext {
        ParticipantContext {
            rank: self.rank,
            group_size: self.size(),
            is_coordinator: self.is_coordinator(),
        }
    }

    /// Broadcast a value from the coordinator to every member
    ///
    /// The coordinator passes `Some(value)`, workers pass `None`. Every member
    /// returns the coordinator's value.
    pub async fn broadcast<T>(&mut self, value: Option<T>) -> Result<T, CollectiveError>
    where
        T: Serialize + DeserializeOwned,
    {
        let op = CollectiveOp::Broadcast;

        if self.is_coordinator() {
            let value = value.ok_or(CollectiveError::MissingRootValue)?;
            let payload = encode_payload(&value)?;
            let seq = self.begin();
            self.fan_in(seq, op, Vec::new()).await?;
            self.release(seq, op, payload);
            self.complete(seq, op);
            Ok(value)
        } else {
            let seq = self.begin();
            self.arrive(seq, op, Vec::new());
            let payload = self.await_release(seq, op).await?;
            self.complete(seq, op);
            decode_payload(&payload)
        }
    }

    /// Gather one value from every member at the coordinator
    ///
    /// The coordinator receives the values in ascending rank order; workers
    /// receive `None`.
    pub async fn gather<T>(&mut self, value: T) -> Result<Option<Vec<T>>, CollectiveError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.collect(CollectiveOp::Gather, value).await
    }

    /// Combine one value from every member at the coordinator
    ///
    /// Values are folded in ascending rank order. Workers receive `None`.
    pub async fn reduce<T, F>(&mut self, value: T, combine: F) -> Result<Option<T>, CollectiveError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnMut(T, T) -> T,
    {
        let values = self.collect(CollectiveOp::Reduce, value).await?;
        Ok(values.and_then(|values| values.into_iter().reduce(combine)))
    }

    /// Sum a counter across every member at the coordinator
    pub async fn reduce_sum(&mut self, value: u64) -> Result<Option<u64>, CollectiveError> {
        self.reduce(value, |a, b| a + b).await
    }

    /// Block until every member has entered the barrier
    pub async fn barrier(&mut self) -> Result<(), CollectiveError> {
        let op = CollectiveOp::Barrier;
        let seq = self.begin();

        if self.is_coordinator() {
            self.fan_in(seq, op, Vec::new()).await?;
            self.release(seq, op, Vec::new());
        } else {
            self.arrive(seq, op, Vec::new());
            self.await_release(seq, op).await?;
        }

        self.complete(seq, op);
        Ok(())
    }

    /// Run local work while keeping this participant visibly alive
    ///
    /// `work` must not touch the communicator.
    pub async fn while_busy<F: Future>(&mut self, work: F) -> F::Output {
        tokio::pin!(work);
        let mut ticker = self.ticker();

        loop {
            tokio::select! {
                output = &mut work => return output,
                _ = ticker.tick() => self.send_heartbeats(),
            }
        }
    }

    /// Fan-in of one value per member
    ///
    /// Payloads are encoded and decoded on blocking threads while heartbeats
    /// keep flowing, so a large contribution never silences a participant.
    async fn collect<T>(&mut self, op: CollectiveOp, value: T) -> Result<Option<Vec<T>>, CollectiveError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let seq = self.begin();
        let rank = self.rank;

        if !self.is_coordinator() {
            let payload = self
                .while_busy(tokio::task::spawn_blocking(move || encode_payload(&value)))
                .await
                .map_err(|source| CollectiveError::CodecTask { rank, source })??;
            self.arrive(seq, op, payload);
            self.await_release(seq, op).await?;
            self.complete(seq, op);
            return Ok(None);
        }

        let arrived = self.fan_in(seq, op, Vec::new()).await?;
        self.release(seq, op, Vec::new());

        let decoded = self
            .while_busy(tokio::task::spawn_blocking(move || {
                arrived
                    .into_iter()
                    .map(|(src, payload)| {
                        if src == rank {
                            Ok(None)
                        } else {
                            decode_payload(&payload).map(Some)
                        }
                    })
                    .collect::<Result<Vec<Option<T>>, CollectiveError>>()
            }))
            .await
            .map_err(|source| CollectiveError::CodecTask { rank, source })??;

        // The coordinator's own slot is the only `None`
        let mut own = Some(value);
        let values = decoded
            .into_iter()
            .filter_map(|slot| slot.or_else(|| own.take()))
            .collect();

        self.complete(seq, op);
        Ok(Some(values))
    }

    fn begin(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn complete(&self, seq: u64, op: CollectiveOp) {
        tracing::debug!(rank = self.rank, seq, %op, size = self.size(), "collective complete");
    }

    fn ticker(&self) -> Interval {
        let mut ticker = tokio::time::interval(self.heartbeat.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    fn send(&self, to: u32, envelope: Envelope) {
        // A closed inbox means the peer is gone; the liveness check deals with it
        if let Some(peer) = self.peers.get(to as usize) {
            if peer.send(envelope).is_err() {
                tracing::trace!(rank = self.rank, to, "peer inbox closed");
            }
        }
    }

    fn send_heartbeats(&self) {
        let beat = Envelope::Heartbeat { src: self.rank };
        if self.is_coordinator() {
            for &member in self.members.iter().filter(|&&m| m != self.rank) {
                self.send(member, beat.clone());
            }
        } else {
            self.send(COORDINATOR_RANK, beat);
        }
    }

    /// Worker side of the fan-in
    fn arrive(&self, seq: u64, op: CollectiveOp, payload: Vec<u8>) {
        self.send(
            COORDINATOR_RANK,
            Envelope::Arrive {
                seq,
                op,
                src: self.rank,
                payload,
            },
        );
    }

    /// Coordinator side of the fan-out
    fn release(&self, seq: u64, op: CollectiveOp, payload: Vec<u8>) {
        for &member in self.members.iter().filter(|&&m| m != self.rank) {
            self.send(
                member,
                Envelope::Release {
                    seq,
                    op,
                    members: self.members.clone(),
                    payload: payload.clone(),
                },
            );
        }
    }

    /// Coordinator side of the fan-in
    ///
    /// Returns each surviving member's contribution keyed by rank. Members that
    /// stay silent past the heartbeat timeout are evicted.
    async fn fan_in(
        &mut self,
        seq: u64,
        op: CollectiveOp,
        own: Vec<u8>,
    ) -> Result<BTreeMap<u32, Vec<u8>>, CollectiveError> {
        let timeout = self.heartbeat.timeout;
        let mut arrived = BTreeMap::new();
        arrived.insert(self.rank, own);

        let wait_start = Instant::now();
        let mut last_heard: HashMap<u32, Instant> = self
            .members
            .iter()
            .filter(|&&m| m != self.rank)
            .map(|&m| (m, wait_start))
            .collect();

        let backlog: Vec<Envelope> = self.pending.drain(..).collect();
        for envelope in backlog {
            self.accept_arrival(envelope, seq, op, &mut arrived, &mut last_heard)?;
        }

        let mut ticker = self.ticker();
        while arrived.len() < self.members.len() {
            let deadline = last_heard
                .iter()
                .filter(|(rank, _)| !arrived.contains_key(*rank))
                .map(|(_, heard)| *heard + timeout)
                .min()
                .unwrap_or_else(|| Instant::now() + timeout);

            tokio::select! {
                envelope = self.inbox.recv() => {
                    let envelope = envelope.ok_or(CollectiveError::Disconnected { rank: self.rank })?;
                    self.accept_arrival(envelope, seq, op, &mut arrived, &mut last_heard)?;
                }
                _ = ticker.tick() => self.send_heartbeats(),
                _ = tokio::time::sleep_until(deadline) => {
                    self.evict_silent(seq, op, &arrived, &mut last_heard);
                }
            }
        }

        Ok(arrived)
    }

    fn accept_arrival(
        &mut self,
        envelope: Envelope,
        seq: u64,
        op: CollectiveOp,
        arrived: &mut BTreeMap<u32, Vec<u8>>,
        last_heard: &mut HashMap<u32, Instant>,
    ) -> Result<(), CollectiveError> {
        if let Some(heard) = last_heard.get_mut(&envelope.sender()) {
            *heard = Instant::now();
        }

        match envelope {
            Envelope::Heartbeat { .. } => {}
            Envelope::Arrive {
                seq: arrival_seq,
                op: arrival_op,
                src,
                payload,
            } => {
                if arrival_seq > seq {
                    self.pending.push_back(Envelope::Arrive {
                        seq: arrival_seq,
                        op: arrival_op,
                        src,
                        payload,
                    });
                } else if arrival_seq < seq || !self.members.contains(&src) {
                    tracing::debug!(rank = self.rank, src, arrival_seq, "dropping stale arrival");
                } else if arrival_op != op {
                    return Err(CollectiveError::Mismatch {
                        rank: self.rank,
                        seq,
                        expected: op,
                        got: arrival_op,
                    });
                } else {
                    arrived.insert(src, payload);
                }
            }
            Envelope::Release { .. } | Envelope::Evicted { .. } => {
                tracing::debug!(rank = self.rank, "coordinator ignoring coordinator-only envelope");
            }
        }

        Ok(())
    }

    fn evict_silent(
        &mut self,
        seq: u64,
        op: CollectiveOp,
        arrived: &BTreeMap<u32, Vec<u8>>,
        last_heard: &mut HashMap<u32, Instant>,
    ) {
        let now = Instant::now();
        let timeout = self.heartbeat.timeout;
        let silent: Vec<u32> = last_heard
            .iter()
            .filter(|(rank, heard)| !arrived.contains_key(*rank) && now >= **heard + timeout)
            .map(|(rank, _)| *rank)
            .collect();

        for rank in silent {
            tracing::warn!(
                rank,
                seq,
                %op,
                timeout_ms = timeout.as_millis() as u64,
                "evicting unresponsive participant"
            );
            last_heard.remove(&rank);
            self.members.retain(|&m| m != rank);
            self.evicted.push(rank);
            self.send(rank, Envelope::Evicted { seq });
        }
    }

    /// Worker side of the fan-out
    async fn await_release(&mut self, seq: u64, op: CollectiveOp) -> Result<Vec<u8>, CollectiveError> {
        let backlog: Vec<Envelope> = self.pending.drain(..).collect();
        for envelope in backlog {
            if let Some(payload) = self.accept_release(envelope, seq, op)? {
                return Ok(payload);
            }
        }

        let timeout = self.heartbeat.timeout;
        let mut last_heard = Instant::now();
        let mut ticker = self.ticker();

        loop {
            tokio::select! {
                envelope = self.inbox.recv() => {
                    let envelope = envelope.ok_or(CollectiveError::Disconnected { rank: self.rank })?;
                    if envelope.sender() == COORDINATOR_RANK {
                        last_heard = Instant::now();
                    }
                    if let Some(payload) = self.accept_release(envelope, seq, op)? {
                        return Ok(payload);
                    }
                }
                _ = ticker.tick() => self.send_heartbeats(),
                _ = tokio::time::sleep_until(last_heard + timeout) => {
                    return Err(CollectiveError::CoordinatorLost {
                        rank: self.rank,
                        op,
                        timeout_ms: timeout.as_millis(),
                    });
                }
            }
        }
    }

    fn accept_release(
        &mut self,
        envelope: Envelope,
        seq: u64,
        op: CollectiveOp,
    ) -> Result<Option<Vec<u8>>, CollectiveError> {
        match envelope {
            Envelope::Release {
                seq: release_seq,
                op: release_op,
                members,
                payload,
            } => {
                if release_seq > seq {
                    self.pending.push_back(Envelope::Release {
                        seq: release_seq,
                        op: release_op,
                        members,
                        payload,
                    });
                    Ok(None)
                } else if release_seq < seq {
                    Ok(None)
                } else if release_op != op {
                    Err(CollectiveError::Mismatch {
                        rank: self.rank,
                        seq,
                        expected: op,
                        got: release_op,
                    })
                } else {
                    self.members = members;
                    Ok(Some(payload))
                }
            }
            Envelope::Evicted { seq: evicted_at } => {
                tracing::debug!(rank = self.rank, evicted_at, "evicted by coordinator");
                Err(CollectiveError::Evicted { rank: self.rank })
            }
            Envelope::Heartbeat { .. } | Envelope::Arrive { .. } => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn fast_heartbeat() -> HeartbeatConfig {
        HeartbeatConfig::new(Duration::from_millis(300), Duration::from_millis(50))
    }

    #[test]
    fn test_create_group_ranks() {
        let group = create_group(4, HeartbeatConfig::default());
        assert_eq!(group.len(), 4);
        for (i, comm) in group.iter().enumerate() {
            assert_eq!(comm.rank(), i as u32);
            assert_eq!(comm.size(), 4);
            assert_eq!(comm.is_coordinator(), i == 0);
        }
        assert!(group[0].context().is_coordinator);
        assert_eq!(group[3].context().group_size, 4);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_rank() {
        let mut group = create_group(4, fast_heartbeat());
        let mut coordinator = group.remove(0);

        let handles: Vec<_> = group
            .into_iter()
            .map(|mut comm| tokio::spawn(async move { comm.broadcast::<(u8, u64)>(None).await }))
            .collect();

        let sent = coordinator.broadcast(Some((2u8, 1000u64))).await.unwrap();
        assert_eq!(sent, (2, 1000));

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), (2, 1000));
        }
    }

    #[tokio::test]
    async fn test_broadcast_without_value_on_coordinator() {
        let mut group = create_group(1, fast_heartbeat());
        let result = group[0].broadcast::<u64>(None).await;
        assert!(matches!(result, Err(CollectiveError::MissingRootValue)));
    }

    #[tokio::test]
    async fn test_gather_is_rank_ordered() {
        let mut group = create_group(4, fast_heartbeat());
        let mut coordinator = group.remove(0);

        let handles: Vec<_> = group
            .into_iter()
            .map(|mut comm| {
                tokio::spawn(async move {
                    // Later ranks arrive first
                    let delay = 40 * (4 - comm.rank() as u64);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    let rank = comm.rank();
                    comm.gather(vec![rank * 10, rank * 10 + 1]).await
                })
            })
            .collect();

        let gathered = coordinator.gather(vec![0u32, 1]).await.unwrap().unwrap();
        assert_eq!(
            gathered,
            vec![vec![0, 1], vec![10, 11], vec![20, 21], vec![30, 31]]
        );

        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_reduce_sum_only_at_coordinator() {
        let mut group = create_group(3, fast_heartbeat());
        let mut coordinator = group.remove(0);

        let handles: Vec<_> = group
            .into_iter()
            .map(|mut comm| {
                tokio::spawn(async move {
                    let value = 5 * comm.rank() as u64;
                    comm.reduce_sum(value).await
                })
            })
            .collect();

        assert_eq!(coordinator.reduce_sum(7).await.unwrap(), Some(7 + 5 + 10));
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_barrier_waits_for_last_arrival() {
        let mut group = create_group(3, fast_heartbeat());
        let last_arrived = Arc::new(AtomicBool::new(false));

        let mut slow = group.pop().unwrap();
        let handles: Vec<_> = group
            .into_iter()
            .map(|mut comm| {
                let last_arrived = last_arrived.clone();
                tokio::spawn(async move {
                    comm.barrier().await.unwrap();
                    assert!(last_arrived.load(Ordering::SeqCst));
                })
            })
            .collect();

        slow.while_busy(tokio::time::sleep(Duration::from_millis(150))).await;
        last_arrived.store(true, Ordering::SeqCst);
        slow.barrier().await.unwrap();

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_mismatched_collectives_detected() {
        let mut group = create_group(2, fast_heartbeat());
        let mut worker = group.pop().unwrap();
        let mut coordinator = group.pop().unwrap();

        let handle = tokio::spawn(async move { worker.barrier().await });
        let result = coordinator.reduce_sum(1).await;
        assert!(matches!(
            result,
            Err(CollectiveError::Mismatch {
                expected: CollectiveOp::Reduce,
                got: CollectiveOp::Barrier,
                ..
            })
        ));

        drop(coordinator);
        let worker_result = handle.await.unwrap();
        assert!(matches!(worker_result, Err(CollectiveError::CoordinatorLost { .. })));
    }

    #[tokio::test]
    async fn test_silent_worker_is_evicted() {
        let mut group = create_group(3, fast_heartbeat());
        drop(group.pop());
        let mut worker = group.pop().unwrap();
        let mut coordinator = group.pop().unwrap();

        let handle = tokio::spawn(async move {
            let result = worker.gather(11u64).await;
            (result.map(|r| r.is_none()), worker.size())
        });

        let gathered = coordinator.gather(10u64).await.unwrap().unwrap();
        assert_eq!(gathered, vec![10, 11]);
        assert_eq!(coordinator.size(), 2);
        assert_eq!(coordinator.evicted(), &[2]);

        let (worker_result, worker_size) = handle.await.unwrap();
        assert!(worker_result.unwrap());
        assert_eq!(worker_size, 2);
    }

    #[tokio::test]
    async fn test_busy_worker_with_heartbeats_is_kept() {
        let mut group = create_group(2, fast_heartbeat());
        let mut worker = group.pop().unwrap();
        let mut coordinator = group.pop().unwrap();

        let handle = tokio::spawn(async move {
            worker
                .while_busy(tokio::time::sleep(Duration::from_millis(700)))
                .await;
            worker.reduce_sum(1).await
        });

        assert_eq!(coordinator.reduce_sum(1).await.unwrap(), Some(2));
        assert!(coordinator.evicted().is_empty());
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_stalled_worker_learns_it_was_evicted() {
        let mut group = create_group(2, fast_heartbeat());
        let mut worker = group.pop().unwrap();
        let mut coordinator = group.pop().unwrap();

        let handle = tokio::spawn(async move {
            // Stall without heart-beating
            tokio::time::sleep(Duration::from_millis(700)).await;
            worker.barrier().await
        });

        coordinator.barrier().await.unwrap();
        assert_eq!(coordinator.evicted(), &[1]);
        assert_eq!(coordinator.size(), 1);

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(CollectiveError::Evicted { rank: 1 })));
    }

    #[tokio::test]
    async fn test_worker_detects_lost_coordinator() {
        let mut group = create_group(2, fast_heartbeat());
        let mut worker = group.pop().unwrap();
        drop(group);

        let result = worker.broadcast::<u64>(None).await;
        assert!(matches!(
            result,
            Err(CollectiveError::CoordinatorLost {
                rank: 1,
                op: CollectiveOp::Broadcast,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_single_member_group() {
        let mut group = create_group(1, fast_heartbeat());
        let comm = &mut group[0];
        assert_eq!(comm.broadcast(Some(42u64)).await.unwrap(), 42);
        assert_eq!(comm.gather(1u8).await.unwrap(), Some(vec![1]));
        assert_eq!(comm.reduce_sum(9).await.unwrap(), Some(9));
        comm.barrier().await.unwrap();
    }
}
