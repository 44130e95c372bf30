//! dynq - query JSON documents with dynamic expressions.
//!
//! Reads a JSON array, applies the requested stages in a fixed order and
//! prints the result as JSON.
//!
//! # Usage
//!
//! ```text
//! dynq --input pages.json --where 'Views > @0' --arg 10 --order-by 'Name desc' --take 5
//! cat pages.json | dynq --group-by Template --count
//! ```
//!
//! Stages run in this order: `--where`, `--order-by`, `--skip`, `--take`,
//! `--select` or `--group-by`, `--count`.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DYNQ_ABSENT_AS_FALSE` | `true` | Missing members read as `false` in `--where` |
//! | `DYNQ_IGNORE_MEMBER_CASE` | `true` | Case-insensitive member lookup |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use dynq_core::{Compiler, DynqConfig, Query, Type, Value, query};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    Ok(())
}

#[derive(Debug, Parser)]
#[command(name = "dynq")]
#[command(about = "dynq - query JSON documents with dynamic expressions")]
#[command(version)]
struct Cli {
    /// Input JSON array. Defaults to stdin.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Positional argument bound to `@0`, `@1`, ... (JSON literal). Repeatable.
    #[arg(short, long = "arg", value_name = "JSON", value_parser = parse_json)]
    args: Vec<serde_json::Value>,

    /// Keep rows matching this predicate
    #[arg(short = 'w', long = "where", value_name = "EXPR")]
    filter: Option<String>,

    /// Sort by these keys (`Name desc, Id`)
    #[arg(short, long, value_name = "EXPR")]
    order_by: Option<String>,

    /// Rows to skip after ordering
    #[arg(long)]
    skip: Option<usize>,

    /// Rows to keep after skipping
    #[arg(long)]
    take: Option<usize>,

    /// Project each row through this selector
    #[arg(short, long, value_name = "EXPR", conflicts_with = "group_by")]
    select: Option<String>,

    /// Group rows by this key
    #[arg(short, long, value_name = "EXPR")]
    group_by: Option<String>,

    /// Print the number of resulting rows instead of the rows
    #[arg(short, long)]
    count: bool,

    /// Log filter (trace, debug, info, warn, error). Overrides `LOG_LEVEL`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn values(&self) -> Vec<Value> {
        self.args.iter().cloned().map(Value::from).collect()
    }
}

fn parse_json(raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_str(raw)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read standard input")?;
            Ok(buf)
        }
    }
}

fn run(compiler: &Compiler, cli: &Cli, input: &str) -> Result<serde_json::Value> {
    let json: serde_json::Value = serde_json::from_str(input).context("input is not valid JSON")?;
    let serde_json::Value::Array(items) = json else {
        bail!("input must be a JSON array");
    };
    let mut rows: Vec<Value> = items.into_iter().map(Value::from).collect();
    debug!(rows = rows.len(), "loaded input");

    let args = cli.values();
    let q = Query::new(compiler, Type::dynamic_record("Record"));
    if let Some(predicate) = &cli.filter {
        rows = q
            .filter(&rows, predicate, &args)
            .with_context(|| format!("--where '{predicate}'"))?;
    }
    if let Some(ordering) = &cli.order_by {
        rows = q
            .order_by(&rows, ordering, &args)
            .with_context(|| format!("--order-by '{ordering}'"))?;
    }
    if let Some(n) = cli.skip {
        rows = query::skip(&rows, n);
    }
    if let Some(n) = cli.take {
        rows = query::take(&rows, n);
    }
    if let Some(selector) = &cli.select {
        rows = q
            .project(&rows, selector, &args)
            .with_context(|| format!("--select '{selector}'"))?;
    }
    if let Some(key) = &cli.group_by {
        rows = q
            .group_by(&rows, key, "it", &args)
            .with_context(|| format!("--group-by '{key}'"))?
            .into_iter()
            .map(Value::from)
            .collect();
    }

    if cli.count {
        return Ok(serde_json::Value::from(query::count(&rows)));
    }
    Ok(serde_json::Value::Array(rows.iter().map(Value::to_json).collect()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = DynqConfig::from_env();
    if let Some(level) = &cli.log_level {
        config.log_level.clone_from(level);
    }
    init_tracing(&config.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting dynq");

    let input = read_input(cli.input.as_deref())?;
    let compiler = Compiler::new(config);
    let output = run(&compiler, &cli, &input)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
