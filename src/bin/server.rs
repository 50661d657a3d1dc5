// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result, bail};
use corerpc::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    server::{
        ServerDispatcher,
        registry::{MethodRegistry, MethodSpec, typed},
    },
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = resolve_config_path("config.yaml")
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let _log_guard = init_logger(&cfg.runtime.log_config_path)?;

    let Some(server_cfg) = cfg.server.clone() else {
        bail!("config.yaml has no `server` section");
    };

    let mut registry = MethodRegistry::new();
    registry.register_all(vec![MethodSpec::new(
        "echo",
        vec!["String".to_string()],
        typed(|s: String| async move { Ok(s) }),
    )])?;

    let dispatcher = ServerDispatcher::new(server_cfg, cfg.channel, registry);
    let addr = dispatcher.init().await.context("failed to bind server")?;
    info!(%addr, "server listening");

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");
    dispatcher.offline().await;

    Ok(())
}
