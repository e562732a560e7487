use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use stormforce::{charts, logging, report, Args, Summary, TracingSink};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_settings()).context("failed to set up logging")?;
    let json_output = args.json_output;
    let chart_file = (!args.no_charts).then(|| args.chart_file.clone());
    let config = args.into_config().context("invalid configuration")?;

    println!("Running {} requests @ {}", config.requests, config.url);
    println!("  {} workers, {} attempts per request", config.workers, config.retry_limit);
    println!();

    let results = stormforce::run(config.clone(), Arc::new(TracingSink))
        .await
        .context("load test failed")?;

    let summary = Summary::from_results(&results, &config);
    println!("\n{}", summary);
    summary.log();

    if json_output {
        match report::write_json(&results, "results.json") {
            Ok(()) => println!("Results saved to results.json"),
            Err(e) => tracing::error!("Error writing results.json: {}", e),
        }
    }

    if let Some(path) = chart_file {
        match charts::write_html(&results, &path) {
            Ok(()) => println!("Charts saved to {}", path.display()),
            Err(e) => tracing::error!("Error generating charts: {}", e),
        }
    }

    Ok(())
}
