// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Per-channel wire/timing knobs, shared by client and server channels.
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Direct-client invocation knobs. Absent on server-only deployments.
    #[serde(default)]
    pub client: Option<ClientConfig>,
    /// Cluster membership and failover knobs. Absent on single-host clients.
    #[serde(default)]
    pub cluster: Option<ClusterConfig>,
    /// Listener and worker-pool knobs. Absent on client-only deployments.
    #[serde(default)]
    pub server: Option<ServerConfig>,
    /// Implementation/runtime parameters that live outside the wire protocol.
    pub runtime: RuntimeConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
/// Per-[`crate::channel::Channel`] timing and framing knobs.
pub struct ChannelConfig {
    /// Interval between HEARTBEAT requests sent while the write queue is
    /// idle. Zero or negative disables the heartbeat entirely.
    pub heartbeat_period: i64,
    /// How long to wait after observing an OFFLINE request from the peer
    /// before forcibly closing the socket.
    #[serde(with = "serde_secs")]
    pub offline_grace_period: Duration,
    /// Bodies at or above this size are DEFLATE-compressed before sending.
    pub compression_threshold_bytes: usize,
    /// Byte budget the write loop batches outbound packets against before
    /// flushing to the socket.
    pub send_buffer_size_bytes: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            heartbeat_period: 30,
            offline_grace_period: Duration::from_secs(60),
            compression_threshold_bytes: 4096,
            send_buffer_size_bytes: 64 * 1024,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
/// [`crate::client::DirectClient`] invocation knobs.
pub struct ClientConfig {
    /// Default `invoke` timeout applied when a call doesn't override it.
    #[serde(with = "serde_secs")]
    pub default_timeout: Duration,
    /// Invocations slower than this are reported via `on_slow_execution`
    /// but otherwise treated as a normal success.
    #[serde(with = "serde_secs")]
    pub slow_execution_threshold: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            slow_execution_threshold: Duration::from_secs(1),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
/// [`crate::cluster::ClusterClient`] membership and recovery knobs.
pub struct ClusterConfig {
    /// `host:port` addresses of every member, in round-robin dispatch order.
    pub hosts: Vec<String>,
    /// How often the background recovery task probes dead members.
    #[serde(with = "serde_secs")]
    pub recovery_interval: Duration,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
/// [`crate::server::ServerDispatcher`] listener and worker-pool knobs.
pub struct ServerConfig {
    /// Address the server binds and accepts connections on.
    pub bind_address: String,
    /// Maximum number of concurrently executing invocations; requests
    /// beyond this are rejected with `TOO_BUSY`.
    pub worker_pool_size: usize,
    /// Invocations slower than this are reported via `on_slow_execution`.
    #[serde(with = "serde_secs")]
    pub slow_execution_threshold: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4182".to_string(),
            worker_pool_size: 500,
            slow_execution_threshold: Duration::from_secs(1),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
/// Process-wide settings that don't belong to any single channel/client/
/// server role.
pub struct RuntimeConfig {
    /// Path to the logging config file consumed by [`crate::cfg::logger`].
    pub log_config_path: String,
    /// Timeout for establishing the initial TCP connection.
    #[serde(with = "serde_secs")]
    pub timeout_connection: Duration,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            self.channel.send_buffer_size_bytes > 0,
            "channel.send_buffer_size_bytes must be > 0"
        );

        if let Some(cluster) = &self.cluster {
            ensure!(!cluster.hosts.is_empty(), "cluster.hosts must not be empty");
        }

        if let Some(server) = &self.server {
            ensure!(
                server.worker_pool_size >= 1,
                "server.worker_pool_size must be >= 1"
            );
            ensure!(!server.bind_address.is_empty(), "server.bind_address must not be empty");
        }

        Ok(())
    }
}

mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
channel:
  HeartbeatPeriod: 30
  OfflineGracePeriod: 60
  CompressionThresholdBytes: 4096
  SendBufferSizeBytes: 65536
cluster:
  Hosts: ["127.0.0.1:4182", "127.0.0.1:4183"]
  RecoveryInterval: 5
server:
  BindAddress: "0.0.0.0:4182"
  WorkerPoolSize: 500
  SlowExecutionThreshold: 1
runtime:
  LogConfigPath: "logging.yaml"
  TimeoutConnection: 5
"#
    }

    #[test]
    fn parses_and_validates() {
        let mut cfg: Config = serde_yaml::from_str(sample_yaml()).expect("parse");
        cfg.validate_and_normalize().expect("validate");
        assert_eq!(cfg.channel.heartbeat_period, 30);
        assert_eq!(cfg.cluster.unwrap().hosts.len(), 2);
        assert_eq!(cfg.server.unwrap().worker_pool_size, 500);
    }

    #[test]
    fn empty_cluster_hosts_rejected() {
        let mut cfg: Config = serde_yaml::from_str(sample_yaml()).expect("parse");
        cfg.cluster.as_mut().unwrap().hosts.clear();
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn zero_worker_pool_rejected() {
        let mut cfg: Config = serde_yaml::from_str(sample_yaml()).expect("parse");
        cfg.server.as_mut().unwrap().worker_pool_size = 0;
        assert!(cfg.validate_and_normalize().is_err());
    }
}
