// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Cross-cutting event callbacks exposed to the host application.
//!
//! These are the only place user code runs inside this crate's worker
//! tasks; implementations must not panic and should treat their own
//! failures as non-fatal (the caller logs and swallows them).

use std::{sync::Arc, time::Duration};

use crate::packet::Packet;

/// Observes traffic on one [`crate::channel::Channel`].
pub trait ChannelListener: Send + Sync {
    /// A non-heartbeat, non-offline packet arrived.
    fn on_receive(&self, host: &str, packet: Packet);

    /// The channel closed. `offline` is true when the peer initiated a
    /// graceful drain rather than the socket failing.
    fn on_closed(&self, host: &str, offline: bool) {
        let _ = (host, offline);
    }
}

/// Observes a single [`crate::client::DirectClient`]'s lifecycle and
/// per-call outcomes.
pub trait DirectClientListener: Send + Sync {
    fn on_created(&self, host: &str) {
        let _ = host;
    }

    fn on_closed(&self, host: &str, offline: bool) {
        let _ = (host, offline);
    }

    fn on_slow_execution(&self, host: &str, method: &str, elapsed: Duration) {
        let _ = (host, method, elapsed);
    }

    fn on_timeout(&self, host: &str, method: &str) {
        let _ = (host, method);
    }

    fn on_too_busy(&self, host: &str, method: &str) {
        let _ = (host, method);
    }

    fn on_invocation_error(&self, host: &str, method: &str, message: &str) {
        let _ = (host, method, message);
    }
}

/// Observes a [`crate::cluster::ClusterClient`]'s membership changes.
pub trait ClusterClientListener: Send + Sync {
    fn on_created(&self, host: &str) {
        let _ = host;
    }

    fn on_recovered(&self, host: &str) {
        let _ = host;
    }

    fn on_closed(&self, host: &str, offline: bool) {
        let _ = (host, offline);
    }
}

/// Observes a [`crate::server::ServerDispatcher`]'s invocation worker pool.
pub trait ExecutorListener: Send + Sync {
    fn on_slow_execution(&self, method: &str, elapsed: Duration) {
        let _ = (method, elapsed);
    }

    fn on_class_not_found(&self, method: &str) {
        let _ = method;
    }

    fn on_method_not_found(&self, method: &str) {
        let _ = method;
    }

    fn on_invocation_error(&self, method: &str, message: &str) {
        let _ = (method, message);
    }

    fn on_too_busy(&self, method: &str) {
        let _ = method;
    }
}

/// A listener that does nothing; the default when the host application
/// doesn't care to observe a given cross-cutting concern.
pub struct NoopListener;

impl ChannelListener for NoopListener {
    fn on_receive(&self, _host: &str, _packet: Packet) {}
}
impl DirectClientListener for NoopListener {}
impl ClusterClientListener for NoopListener {}
impl ExecutorListener for NoopListener {}

pub type SharedChannelListener = Arc<dyn ChannelListener>;
pub type SharedDirectClientListener = Arc<dyn DirectClientListener>;
pub type SharedClusterClientListener = Arc<dyn ClusterClientListener>;
pub type SharedExecutorListener = Arc<dyn ExecutorListener>;
