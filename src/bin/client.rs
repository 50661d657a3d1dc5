// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result, bail};
use corerpc::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    cluster::ClusterClient,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = resolve_config_path("config.yaml")
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let _log_guard = init_logger(&cfg.runtime.log_config_path)?;

    let Some(cluster_cfg) = cfg.cluster.clone() else {
        bail!("config.yaml has no `cluster` section");
    };
    let client_cfg = cfg.client.clone().unwrap_or_default();

    let cluster = ClusterClient::new(cluster_cfg, cfg.channel, client_cfg);
    cluster.connect().await.context("failed to connect to any cluster member")?;

    for i in 0..5 {
        let arg = format!("hello-{i}");
        let timeout = Some(Duration::from_secs(5));
        match cluster.invoke::<String, String>("echo", &arg, timeout).await {
            Ok(reply) => info!(request = %arg, response = %reply, "call succeeded"),
            Err(e) => info!(request = %arg, error = %e, "call failed"),
        }
    }

    cluster.close();
    Ok(())
}
