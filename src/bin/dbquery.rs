use clap::Parser;
use dbquery::{config, logging, DbQueryError, Params, QueryExecutor, QueryResult, Result, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

/// Run one parameterized SQL statement and print its result.
#[derive(Debug, Parser)]
#[command(name = "dbquery", version, about)]
struct Cli {
    /// Path to the TOML config file (defaults to <config dir>/dbquery/config.toml)
    #[arg(short, long, env = "DBQUERY_CONFIG")]
    config: Option<PathBuf>,

    /// Print the id generated by the statement after its result
    #[arg(long)]
    last_insert_id: bool,

    /// SQL statement; placeholders are written :name
    sql: String,

    /// Parameters as NAME=VALUE; integers, true/false and null are typed, the rest is text
    #[arg(value_parser = parse_param)]
    params: Vec<(String, Value)>,
}

fn parse_param(raw: &str) -> std::result::Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{}'", raw));
    }
    Ok((name.to_string(), Value::infer(value)))
}

fn run(cli: Cli) -> Result<()> {
    let path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()
            .ok_or_else(|| DbQueryError::config("no config directory on this platform"))?,
    };
    info!(path = %path.display(), "loading config");
    let config = config::load_config(&path)?;

    let mut executor = QueryExecutor::new(config.database)?;
    let params: Params = cli.params.into_iter().collect();

    match executor.query(&cli.sql, &params)? {
        QueryResult::RowSet(rows) => println!("{}", serde_json::to_string_pretty(&rows)?),
        QueryResult::AffectedCount(n) => println!("{}", n),
        QueryResult::Empty => {}
    }

    if cli.last_insert_id {
        println!("{}", executor.last_insert_id()?);
    }

    executor.close();
    Ok(())
}

fn main() -> ExitCode {
    logging::init_logging();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("dbquery: {}", e);
            ExitCode::FAILURE
        }
    }
}
