// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The pending-response map: id → one-shot rendezvous, shared between the
//! caller task that installed it and the channel's read worker.

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::packet::Packet;

/// What a pending slot is ultimately woken with.
pub enum SlotOutcome {
    /// The matching response packet arrived.
    Response(Packet),
    /// The owning channel closed before a response arrived.
    Closed,
}

/// Concurrent id → pending-slot map. Insert-before-send, remove-on-complete.
#[derive(Default)]
pub struct PendingMap {
    slots: DashMap<i64, oneshot::Sender<SlotOutcome>>,
}

impl PendingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a slot for `id` and returns its receiving half. Must be
    /// called before the matching REQUEST packet is enqueued on the wire.
    pub fn install(&self, id: i64) -> oneshot::Receiver<SlotOutcome> {
        let (tx, rx) = oneshot::channel();
        self.slots.insert(id, tx);
        rx
    }

    /// Removes a slot without waking it; used when a timed-out caller gives
    /// up, or when enqueueing the request itself failed.
    pub fn remove(&self, id: i64) {
        self.slots.remove(&id);
    }

    /// Routes a response packet to its slot. Returns `false` if no slot
    /// matched (a late response after the caller already timed out).
    pub fn complete(&self, packet: Packet) -> bool {
        match self.slots.remove(&packet.header.packet_id) {
            Some((_, tx)) => {
                let _ = tx.send(SlotOutcome::Response(packet));
                true
            },
            None => false,
        }
    }

    /// Wakes every still-installed slot with [`SlotOutcome::Closed`].
    pub fn close_all(&self) {
        let ids: Vec<i64> = self.slots.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.slots.remove(&id) {
                let _ = tx.send(SlotOutcome::Closed);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::packet::{Opcode, Status};

    #[test]
    fn complete_wakes_matching_slot_only() {
        let map = PendingMap::new();
        let _rx_unused = map.install(1);
        let rx = map.install(2);

        let matched = map.complete(Packet::response(
            2,
            Opcode::RemoteInvocation,
            Status::Success,
            Bytes::new(),
            false,
        ));
        assert!(matched);
        assert_eq!(map.len(), 1);
        drop(rx);
    }

    #[test]
    fn complete_with_no_slot_returns_false() {
        let map = PendingMap::new();
        let matched = map.complete(Packet::response(
            99,
            Opcode::RemoteInvocation,
            Status::Success,
            Bytes::new(),
            false,
        ));
        assert!(!matched);
    }

    #[tokio::test]
    async fn close_all_drains_every_slot() {
        let map = PendingMap::new();
        let rx1 = map.install(1);
        let rx2 = map.install(2);
        map.close_all();
        assert!(map.is_empty());
        assert!(matches!(rx1.await, Ok(SlotOutcome::Closed)));
        assert!(matches!(rx2.await, Ok(SlotOutcome::Closed)));
    }
}
