// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Sender-local packet id allocation.

use std::sync::atomic::{AtomicI64, Ordering};

/// Hands out monotonically increasing packet ids, one per sender per
/// channel. Wraps on overflow rather than panicking or erroring; the
/// pending-response map detects any resulting collision (see `DESIGN.md`).
pub struct PacketIdGenerator(AtomicI64);

impl PacketIdGenerator {
    pub fn new() -> Self {
        Self(AtomicI64::new(1))
    }

    /// Returns the next id, starting at 1 (id 0 is reserved for
    /// HEARTBEAT/OFFLINE packets).
    pub fn next(&self) -> i64 {
        loop {
            let id = self.0.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }
}

impl Default for PacketIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_skip_zero() {
        let gen = PacketIdGenerator::new();
        let a = gen.next();
        let b = gen.next();
        assert!(b > a);
        assert_ne!(a, 0);
        assert_ne!(b, 0);
    }

    #[test]
    fn wraps_around_without_panicking() {
        let gen = PacketIdGenerator(AtomicI64::new(i64::MAX));
        let a = gen.next();
        assert_eq!(a, i64::MAX);
        let b = gen.next();
        assert_ne!(b, 0);
    }
}
