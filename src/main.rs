#![forbid(unsafe_code)]

use error_iter::ErrorIter as _;
use is_terminal::IsTerminal as _;
use onlyargs::CliError;
use onlyargs_derive::OnlyArgs;
use pit38::imports::exante::read_report;
use pit38::model::{reconstruct, rollback, Stats, Trader};
use pit38::quotes::nbp::NbpClient;
use pit38::util::fifo::FIFO;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::{env, process::ExitCode};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

#[derive(Debug, OnlyArgs)]
#[footer = "Additional environment variables:"]
#[footer = "  - TERM_COLOR accepts \"always\" to override automatic terminal sensing"]
struct Args {
    /// Read an Exante Transaction Report TSV from a file.
    ///   May be given multiple times; reports are merged and processed
    ///   in transaction order.
    #[long]
    input_report: Vec<PathBuf>,

    /// Declare only this fiscal year.
    ///   Trades count by their sell date, dividends and taxes by their
    ///   own date. Default is to declare everything found.
    #[short('y')]
    tax_year: Option<i32>,

    /// Flat tax rate in percent applied to capital gains and dividends.
    #[short('t')]
    #[default("19")]
    tax_percentage: String,

    /// Base URL of the NBP Web API.
    #[long]
    #[default("https://api.nbp.pl")]
    nbp_url: String,

    /// Enable verbose output.
    /// Prints processing statistics after the report.
    verbose: bool,
}

#[derive(Debug, Error)]
enum Error {
    #[error("Argument parsing error")]
    Args(#[from] CliError),

    #[error("Invalid tax percentage: `{0}`")]
    TaxPercentage(String),

    #[error("Failed to import {0:?}")]
    Import(PathBuf, #[source] pit38::errors::ExanteError),

    #[error("Transaction reconstruction error")]
    Reconstruct(#[from] pit38::errors::ReconstructError),

    #[error("Trade processing error")]
    Trader(#[from] pit38::errors::TraderError),
}

fn main() -> ExitCode {
    // Initialize the tracing subscriber for instrumentation.
    // Uses the `RUST_LOG` environment var for configuration. E.g. `RUST_LOG=debug cargo run`
    // This is very useful to see the input TSV row that caused a failure.
    //
    // See: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/struct.EnvFilter.html#directives
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let term_color = env::var("TERM_COLOR")
        .map(|color| color == "always")
        .unwrap_or_else(|_| std::io::stdout().is_terminal());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(term_color))
        .with(env_filter)
        .init();

    match run(onlyargs::parse()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            for source in err.sources().skip(1) {
                eprintln!("  Caused by: {source}");
            }

            ExitCode::FAILURE
        }
    }
}

fn run(args: Result<Args, CliError>) -> Result<(), Error> {
    let args = args?;

    let tax_percentage: Decimal = args
        .tax_percentage
        .parse()
        .map_err(|_| Error::TaxPercentage(args.tax_percentage.clone()))?;

    let mut stats = Stats::default();
    let mut rows = FIFO::new();
    for input_report in args.input_report {
        let report_rows = read_report(&mut stats, &input_report)
            .map_err(|e| Error::Import(input_report.clone(), e))?;
        info!("Imported {} rows from {input_report:?}", report_rows.len());
        rows.extend(report_rows);
    }

    let rows = rollback::filter_rollbacked(&mut stats, rows);
    let transactions = reconstruct::reconstruct(&mut stats, rows)?;

    let mut trader = Trader::new(
        NbpClient::new(&args.nbp_url),
        tax_percentage,
        args.tax_year,
    );
    let report = trader.process(&mut stats, transactions)?;

    println!("{report}");

    if args.verbose {
        stats.pretty_print();
    }

    Ok(())
}
