mod defaults;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use kube::Client;

use fanout_core::{Limits, HEARTBEAT_SECS, MAX_SUBS_PER_SCOPE, OUT_BUFFER, RESUME_BUFFER, SUB_BUFFER, WRITE_TIMEOUT_SECS};
use fanout_kubehub::Manager;
use fanout_session::ClusterRouter;

use defaults::{EmptyLister, NoopOwnerResolver, PassthroughRowBuilder};

/// Operator-facing resource bounds and cluster identity (spec §10). Every
/// flag falls back to a `FANOUT_`-prefixed environment variable, then to
/// the spec's stated default.
#[derive(Parser, Debug)]
#[command(name = "fanoutd", version, about = "Resource-change fan-out engine")]
struct Config {
    #[arg(long, env = "FANOUT_CLUSTER_ID", default_value = "default")]
    cluster_id: String,

    #[arg(long, env = "FANOUT_CLUSTER_NAME", default_value = "default")]
    cluster_name: String,

    #[arg(long, env = "FANOUT_MAX_SUBS_PER_SCOPE", default_value_t = MAX_SUBS_PER_SCOPE)]
    max_subs_per_scope: usize,

    #[arg(long, env = "FANOUT_SUB_BUFFER", default_value_t = SUB_BUFFER)]
    sub_buffer: usize,

    #[arg(long, env = "FANOUT_OUT_BUFFER", default_value_t = OUT_BUFFER)]
    out_buffer: usize,

    #[arg(long, env = "FANOUT_RESUME_BUFFER", default_value_t = RESUME_BUFFER)]
    resume_buffer: usize,

    #[arg(long, env = "FANOUT_HEARTBEAT_SECS", default_value_t = HEARTBEAT_SECS)]
    heartbeat_secs: u64,

    #[arg(long, env = "FANOUT_WRITE_TIMEOUT_SECS", default_value_t = WRITE_TIMEOUT_SECS)]
    write_timeout_secs: u64,
}

impl Config {
    fn limits(&self) -> Limits {
        Limits {
            max_subs_per_scope: self.max_subs_per_scope,
            sub_buffer: self.sub_buffer,
            out_buffer: self.out_buffer,
            resume_buffer: self.resume_buffer,
            heartbeat_secs: self.heartbeat_secs,
            write_timeout_secs: self.write_timeout_secs,
        }
    }
}

fn init_tracing() {
    let env = std::env::var("FANOUT_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Config::parse();
    tracing::info!(cluster_id = %config.cluster_id, "fan-out engine starting");

    let client = Client::try_default().await?;
    let manager = Manager::new(
        client,
        config.limits(),
        Arc::new(PassthroughRowBuilder),
        Arc::new(NoopOwnerResolver),
        Arc::new(EmptyLister),
        Arc::new(EmptyLister),
        None,
        config.cluster_id.clone(),
        config.cluster_name.clone(),
    );
    manager.start();

    let mut clusters = HashMap::new();
    clusters.insert(config.cluster_id.clone(), Arc::clone(&manager));
    let router = ClusterRouter::new(clusters);
    tracing::info!(clusters = router.cluster_ids().count(), "cluster router ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    manager.stop();

    Ok(())
}
