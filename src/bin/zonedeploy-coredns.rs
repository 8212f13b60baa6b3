use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use zonedeploy::{
    ConvergeReport, Converger, CorednsConfig, FilePerms, Outcome, Transport,
    deploy::{DeploymentPlan, SERVICE_NAME, render_corefile},
    transport::{LocalTransport, SshTransport},
    zone::attributes::{ZoneItem, plan_zones},
};

#[derive(Parser, Debug)]
#[command(author, version, about, rename_all = "kebab-case")]
struct Cli {
    /// Path to the JSON deployment description
    #[arg(long, value_name = "PATH")]
    config: PathBuf,
    /// Target host
    #[arg(long, value_name = "HOST", default_value = "localhost")]
    host: String,
    /// Reach the target host with ssh/scp instead of the local filesystem
    #[arg(long)]
    ssh: bool,
    /// Directory target paths are placed under when deploying locally
    #[arg(long, value_name = "DIR", default_value = "/", conflicts_with = "ssh")]
    root: PathBuf,
    /// Report what differs without writing anything
    #[arg(long)]
    dry_run: bool,
    /// Print the ordered deployment plan as JSON and exit
    #[arg(long)]
    plan: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = CorednsConfig::load(&cli.config).await?;
    let zones = plan_zones(&config).context("invalid zone configuration")?;

    if cli.plan {
        let plan = DeploymentPlan::new(&config, &zones);
        let ordered = plan.ordered()?;
        println!("{}", serde_json::to_string_pretty(&ordered)?);
        return Ok(());
    }

    let transport: Arc<dyn Transport> = if cli.ssh {
        Arc::new(SshTransport::default())
    } else {
        Arc::new(LocalTransport::new(&cli.root))
    };
    let converger = Arc::new(Converger::new(transport).with_dry_run(cli.dry_run));

    info!(host = %cli.host, zones = zones.len(), dry_run = cli.dry_run, "converging");
    let report = tokio::select! {
        report = converge(&converger, &cli.host, &config, zones) => report,
        _ = shutdown_signal() => bail!("interrupted before convergence finished"),
    };

    for entry in &report.entries {
        match &entry.result {
            Ok(Outcome::Unchanged) => info!(item = %entry.id, "unchanged"),
            Ok(Outcome::Written) => info!(item = %entry.id, path = %entry.path, "updated"),
            Ok(Outcome::WouldWrite) => info!(item = %entry.id, path = %entry.path, "would update"),
            Err(err) => error!(item = %entry.id, "{err}"),
        }
    }

    if report.needs_service_restart() {
        println!("restart {}", SERVICE_NAME);
    }

    let failures = report.failures().count();
    if failures > 0 {
        bail!("{failures} item(s) failed to converge");
    }

    Ok(())
}

/// Zone files first, then the Corefile that references them.
async fn converge(
    converger: &Arc<Converger>,
    host: &str,
    config: &CorednsConfig,
    zones: Vec<ZoneItem>,
) -> ConvergeReport {
    let mut report = converger.converge_all(host, zones).await;

    let path = config.corefile_path();
    let perms = FilePerms::new(0o644, &config.owner, &config.group);
    let result = converger
        .converge_file(host, &path, &render_corefile(config), &perms)
        .await;
    report.push(format!("file:{}", path), path, result);

    report
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to install CTRL+C handler: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
