//! One-shot reconciliation of a single account from the command line.
//!
//! Exit status: 0 when both sides agree everywhere, 2 when any check
//! failed, 1 when the run could not be performed at all.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use balcheck::{
    address::CanonicalAddress,
    api::models::CheckErrorView,
    bootstrap::build_engine,
    config::Config,
    engine::{AggregateResult, TracingReporter},
    telemetry,
};

#[derive(Parser)]
#[command(name = "balcheck-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compare aggregator balances against each chain's LCD node", long_about = None)]
struct Cli {
    /// Account to check, as a bech32 address on any chain
    #[arg(long, env = "BALCHECK_ADDR")]
    addr: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON log lines and a JSON report
    #[arg(long)]
    json: bool,

    /// Aggregator base URL (overrides BALCHECK_AGGREGATOR_URL)
    #[arg(long)]
    aggregator_url: Option<String>,

    /// Maximum checks in flight at once
    #[arg(long)]
    max_concurrent_checks: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    http_timeout_secs: Option<u64>,

    /// Page cap when following node balance pagination
    #[arg(long)]
    max_balance_pages: Option<usize>,
}

impl Cli {
    /// Layer command-line flags over the environment-derived settings.
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.aggregator_url {
            config.aggregator_url = url.clone();
        }
        if let Some(limit) = self.max_concurrent_checks {
            config.max_concurrent_checks = limit;
        }
        if let Some(secs) = self.http_timeout_secs {
            config.http_timeout_secs = secs;
        }
        if let Some(pages) = self.max_balance_pages {
            config.max_balance_pages = pages;
        }
        if self.json {
            config.log_json = true;
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    address: &'a CanonicalAddress,
    chains_checked: usize,
    checks_run: usize,
    errors: Vec<CheckErrorView>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let directives = if cli.verbose {
        "debug,hyper=info,reqwest=info"
    } else {
        "warn,balcheck=info"
    };
    telemetry::init_tracing(cli.json, directives);

    let address = match CanonicalAddress::parse_bech32(&cli.addr) {
        Ok(address) => address,
        Err(e) => {
            eprintln!("invalid address {}: {}", cli.addr, e);
            return ExitCode::from(1);
        }
    };

    match run(&cli, &address).await {
        Ok(result) => {
            report(&result, cli.json);
            if result.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: &Cli, address: &CanonicalAddress) -> Result<AggregateResult> {
    let mut config = Config::load().context("loading configuration")?;
    cli.apply(&mut config);
    config.validate().context("validating configuration")?;

    let engine = build_engine(&config, Arc::new(TracingReporter))?;

    info!(address = %address, aggregator = %config.aggregator_url, "starting reconciliation");
    let result = engine
        .reconcile(address)
        .await
        .context("reconciliation did not run")?;

    Ok(result)
}

fn report(result: &AggregateResult, json: bool) {
    if json {
        let report = Report {
            address: &result.address,
            chains_checked: result.chains_checked,
            checks_run: result.checks_run,
            errors: result.errors.iter().map(CheckErrorView::from).collect(),
        };
        match serde_json::to_string_pretty(&report) {
            Ok(body) => println!("{}", body),
            Err(e) => warn!(error = %e, "could not serialize report"),
        }
        return;
    }

    for err in &result.errors {
        println!(
            "[{}] {} ({})",
            err.context.chain,
            err,
            err.failure.kind()
        );
        if let Some(url) = &err.context.expected_url {
            println!("    lcd: {}", url);
        }
        if let Some(url) = &err.context.actual_url {
            println!("    api: {}", url);
        }
    }

    println!(
        "{}: {} chains, {} checks, {} mismatches, {} unverified",
        result.address,
        result.chains_checked,
        result.checks_run,
        result.mismatches().count(),
        result.unverified().count()
    );
}
