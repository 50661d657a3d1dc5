// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A synchronous-contract RPC framework over persistent TCP connections.
//!
//! The core pipeline is: [`packet`] (wire framing) + [`serializer`]
//! (bodies) + [`compress`]
//! (optional body deflate), carried over one [`channel::Channel`] per
//! socket, invoked through [`client::DirectClient`] /
//! [`cluster::ClusterClient`] / [`cluster::broadcast::BroadcastClient`] on
//! the caller side and dispatched by [`server::ServerDispatcher`] on the
//! provider side.

pub mod cfg;
pub mod channel;
pub mod client;
pub mod cluster;
pub mod codec;
pub mod compress;
pub mod error;
pub mod listener;
pub mod packet;
pub mod reader;
pub mod serializer;
pub mod server;
pub mod utils;
