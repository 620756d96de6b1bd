//! MetricIO CLI - Command Line Client
//!
//! This binary provides client commands for the MetricIO wire protocol.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metricio_client::Client;
use metricio_common::{CompareOp, Error, LocatorType, MetricKind, Predicate, TIME_NOW};
use metricio_proto::Query;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "metricio")]
#[command(about = "MetricIO command line client")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:9410")]
    server: String,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Append one observation
    Add {
        /// Metric kind (storage, cpu, traffic, rtt, hopcount, aspathlen, wlanassoc)
        kind: String,
        /// Observed value
        value: u64,
        /// Locator the observation belongs to
        locator: String,
        /// Unix timestamp; "now" lets the server stamp it
        #[arg(short, long, default_value = "now")]
        time: String,
    },
    /// Find locators whose observations match a predicate
    Query {
        /// Metric kind (storage, cpu, traffic, rtt, hopcount, aspathlen, wlanassoc)
        kind: String,
        /// Comparison operator (<, <=, =, >, >=)
        op: String,
        /// Comparison value
        value: u64,
        /// Window start, unix timestamp, inclusive
        #[arg(long, default_value_t = 0)]
        start: u64,
        /// Window end, unix timestamp, inclusive; 0 means unbounded
        #[arg(long, default_value_t = 0)]
        end: u64,
        /// Maximum number of locators to return
        #[arg(short, long, default_value_t = 10)]
        max: u8,
        /// Locator form to return (domain, uri)
        #[arg(long, default_value = "domain")]
        loc_type: String,
    },
    /// Stream observations from a file, one "time value locator" triple per line
    Load {
        /// Metric kind (storage, cpu, traffic, rtt, hopcount, aspathlen, wlanassoc)
        kind: String,
        /// Input file; blank lines and #-comments are skipped
        file: String,
    },
}

/// Parse a timestamp argument; "now" defers the stamp to the server.
fn parse_time(s: &str) -> Result<u64> {
    if s == "now" {
        return Ok(TIME_NOW);
    }
    s.parse()
        .map_err(|_| anyhow::anyhow!("invalid timestamp: '{s}'"))
}

async fn run_add(
    server: &str,
    kind: &str,
    time: &str,
    value: u64,
    locator: &str,
) -> Result<()> {
    let kind: MetricKind = kind.parse()?;
    let time = parse_time(time)?;
    let mut client = Client::connect(server)
        .await
        .with_context(|| format!("failed to connect to {server}"))?;
    client.add(kind, time, value, locator.as_bytes()).await?;
    client.close().await;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_query(
    server: &str,
    kind: &str,
    op: &str,
    value: u64,
    start: u64,
    end: u64,
    max: u8,
    loc_type: &str,
) -> Result<()> {
    let query = Query {
        loc_type: loc_type.parse::<LocatorType>()?,
        max_count: max,
        predicate: Predicate {
            kind: kind.parse::<MetricKind>()?,
            op: op.parse::<CompareOp>()?,
            value,
            start,
            end,
        },
    };

    let mut client = Client::connect(server)
        .await
        .with_context(|| format!("failed to connect to {server}"))?;
    let hits = match client.query(&query).await {
        Err(Error::NoResults) => anyhow::bail!("no results"),
        result => result?,
    };
    for hit in &hits {
        println!("{}", String::from_utf8_lossy(&hit.locator));
    }
    client.close().await;
    Ok(())
}

async fn run_load(server: &str, kind: &str, file: &str) -> Result<()> {
    let kind: MetricKind = kind.parse()?;
    let raw = std::fs::read_to_string(file).with_context(|| format!("failed to read {file}"))?;

    let mut client = Client::connect(server)
        .await
        .with_context(|| format!("failed to connect to {server}"))?;
    let mut sent = 0usize;
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (time, value, locator) =
            parse_triple(line).with_context(|| format!("{file}:{}", idx + 1))?;
        client.add(kind, time, value, locator.as_bytes()).await?;
        sent += 1;
    }
    client.close().await;
    println!("Loaded {sent} observations");
    Ok(())
}

/// Split one input line into its (time, value, locator) fields.
fn parse_triple(line: &str) -> Result<(u64, u64, &str)> {
    let mut fields = line.split_whitespace();
    let (Some(time), Some(value), Some(locator), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        anyhow::bail!("expected 'time value locator'");
    };
    let time = parse_time(time)?;
    let value = value
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid value: '{value}'"))?;
    Ok((time, value, locator))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match args.command {
        Commands::Add {
            kind,
            value,
            locator,
            time,
        } => run_add(&args.server, &kind, &time, value, &locator).await,
        Commands::Query {
            kind,
            op,
            value,
            start,
            end,
            max,
            loc_type,
        } => run_query(&args.server, &kind, &op, value, start, end, max, &loc_type).await,
        Commands::Load { kind, file } => run_load(&args.server, &kind, &file).await,
    }
}
