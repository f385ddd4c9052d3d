//! bgqueue CLI — run dealership reports over the background worker queue.

use std::path::PathBuf;
use std::sync::Arc;

use bgqueue::config::Config;
use bgqueue::report::{
    DealershipData, DealershipInfo, DealershipSource, FileDealershipSource, ReportsService,
    SimulatedDealershipService, StaticDealershipSource,
};
use bgqueue::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bgqueue", about = "Dealership reports over a background worker queue")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct CommonArgs {
    /// File with one `id,endpoint` per line (overrides DEALERSHIPS_FILE)
    #[arg(long, global = true)]
    dealerships: Option<PathBuf>,
    /// Generate this many synthetic dealerships when no file is given
    #[arg(long, global = true, default_value_t = 25)]
    synthetic: usize,
    /// Worker threads (overrides BGQUEUE_WORKERS)
    #[arg(long, global = true)]
    workers: Option<usize>,
    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Dealerships ranked by total sales
    Top {
        /// Maximum dealerships to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Dealerships running low on stock
    LowStock {
        /// Show dealerships with at most this many cars
        #[arg(long, default_value_t = 5)]
        threshold: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "bgqueue".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    let mut report_config = config.report_config();
    if let Some(workers) = cli.common.workers {
        report_config.worker_count = workers;
    }

    let source: Arc<dyn DealershipSource> =
        match cli.common.dealerships.or(config.dealerships_file) {
            Some(path) => Arc::new(FileDealershipSource::new(path)),
            None => Arc::new(synthetic_source(cli.common.synthetic)),
        };
    let service = ReportsService::new(
        source,
        Arc::new(SimulatedDealershipService::default()),
        report_config,
    );

    // The queue blocks on OS threads; keep it off the async workers.
    let command = cli.command;
    let data = tokio::task::spawn_blocking(move || match command {
        Command::Top { limit } => service.top_performing_dealerships(Some(limit)),
        Command::LowStock { threshold } => service.low_stock_dealerships(threshold),
    })
    .await??;

    if cli.common.json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        print_table(&data);
    }
    guard.force_flush();
    Ok(())
}

fn synthetic_source(count: usize) -> StaticDealershipSource {
    StaticDealershipSource(
        (1..=count)
            .map(|i| {
                DealershipInfo::new(
                    format!("dealer-{i:03}"),
                    format!("http://dealer-{i:03}.example.com/api"),
                )
            })
            .collect(),
    )
}

fn print_table(data: &[DealershipData]) {
    if data.is_empty() {
        println!("No dealerships found.");
        return;
    }

    println!("{:<20}  {:>14}  {:>6}", "DEALERSHIP", "TOTAL_SALES", "STOCK");
    println!("{}", "-".repeat(44));
    for d in data {
        println!(
            "{:<20}  {:>14}  {:>6}",
            d.dealership_identifier, d.total_sales, d.available_stock
        );
    }
    println!("\n{} dealership(s)", data.len());
}
