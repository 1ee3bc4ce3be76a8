//! procwatch - process self-monitoring
//!
//! Samples CPU utilization, resident memory, thread count and CPU
//! temperature of its own process and reports them as Prometheus metrics,
//! log lines, or a one-shot JSON document.

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use procwatch::{
    cli::Cli,
    config::Config,
    internal_metrics::{system::SystemCollector, MetricsBuilder},
    process_stats::{ProcessStats, StatsSnapshot},
    sources::{cpu_info::cpu_info_source, processor_count, sensors},
    task_manager::TaskManager,
};
use serde::Serialize;
use std::time::Duration;

/// Output of `--once`.
#[derive(Serialize)]
struct Report {
    processors: usize,
    cpu_brand: String,
    cpu_frequency_hz: f64,
    #[serde(flatten)]
    snapshot: StatsSnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        env_logger::init();
        error!("Failed to load configuration: {}", err);
        std::process::exit(1);
    });

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let result = if cli.once {
        report_once(&config).await
    } else {
        run(config).await
    };

    sensors::shutdown();
    result
}

/// Takes two samples one interval apart and prints the second as JSON.
async fn report_once(config: &Config) -> Result<()> {
    let mut stats = ProcessStats::new(config.sensors.temperature);
    let mut cpu_info = cpu_info_source(config.sensors.cpu_info);

    tokio::time::sleep(Duration::from_millis(config.collector.interval_ms)).await;
    stats.update();

    let report = Report {
        processors: processor_count(),
        cpu_brand: cpu_info.brand(),
        cpu_frequency_hz: cpu_info.frequency_hz(config.sensors.cpu_frequency_policy),
        snapshot: stats.snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    info!("procwatch starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Sample Interval: {}ms", config.collector.interval_ms);
    info!("Log Snapshots: {}", config.collector.log_snapshots);
    info!(
        "Metrics Endpoint: {}",
        if config.metrics.enabled {
            config.metrics.listen_address.to_string()
        } else {
            "Disabled".to_string()
        }
    );
    info!("Temperature Sensor: {}", config.sensors.temperature);
    info!("CPU Info: {}", config.sensors.cpu_info);
    info!("-------------------------------------------------------");

    let task_manager = TaskManager::new();

    let (metrics, server) = MetricsBuilder::new(config.metrics.clone()).build(task_manager.shutdown_rx());
    if let Some((server, addr)) = server {
        info!("Serving metrics on http://{}/metrics", addr);
        task_manager.spawn("MetricsServer", server.run());
    }

    let cpu_info = cpu_info_source(config.sensors.cpu_info);
    let brand = cpu_info.brand();
    if !brand.is_empty() {
        info!("CPU: {} ({} logical processors)", brand, processor_count());
    }

    let collector = SystemCollector::new(
        ProcessStats::new(config.sensors.temperature),
        cpu_info,
        metrics,
        Duration::from_millis(config.collector.interval_ms.max(1)),
    )
    .with_snapshot_logging(config.collector.log_snapshots)
    .with_frequency_policy(config.sensors.cpu_frequency_policy);
    task_manager.spawn("SystemCollector", collector.run(task_manager.shutdown_rx()));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
    info!("Shutdown requested.");
    task_manager.shutdown().await;
    Ok(())
}
