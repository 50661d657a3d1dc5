// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Crate-wide error taxonomy.
//!
//! Every fallible operation on the public contract (packet framing, channel
//! I/O, direct/cluster/broadcast invocation, server dispatch) returns
//! [`RpcError`]. Call sites outside that contract (config loading, CLI glue,
//! tests) keep using `anyhow::Result`; `RpcError` converts into
//! `anyhow::Error` for free.

use thiserror::Error;

/// Single error currency for the RPC core.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Malformed header/body on the wire. Fatal for the channel that raised
    /// it.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The per-call timeout elapsed before a response arrived.
    #[error("invocation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The server responded `TOO_BUSY`, a broadcast task was rejected by the
    /// worker pool, or a cluster found no live member to dispatch to.
    #[error("too busy: {0}")]
    TooBusy(String),

    /// Server-side failure, missing method, or deserialization failure on
    /// either side.
    #[error("invocation error: {0}")]
    Invocation(String),

    /// The call observed the channel/client was or became closed.
    #[error("channel closed")]
    ChannelClosed,

    /// A cluster client could not reach any configured host at construction
    /// time.
    #[error("no live member among configured hosts")]
    NoLiveMember,

    /// A method name collided with one already present in the registry.
    #[error("duplicate method registration: {0}")]
    DuplicateMethod(String),

    /// Attempted to use a channel that is not in the `Normal` state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("serialization error")]
    Serialize(#[from] bincode::Error),

    #[error("config error")]
    Config(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RpcError>;
