//! Validate a configuration and print what a run would do, without any
//! network or database access.

use anyhow::{Context, Result};
use censustrade::{
    config::{Config, DestinationConfig},
    fetch::{build_url, QueryKey},
    schema::TradeDirection,
};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "plan", about = "Show the request plan for a config file")]
struct Args {
    /// Path to the configuration YAML file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_file(&args.config)?;
    let plan = config.validate().context("invalid configuration")?;

    let periods: Vec<String> = plan.periods.iter().map(|p| p.to_string()).collect();
    println!("periods ({}): {}", periods.len(), periods.join(", "));
    println!("commodity codes: {}", config.commodity_codes.len());
    println!(
        "requests: {}",
        plan.request_count(config.commodity_codes.len())
    );
    println!("mode: {:?}", config.mode);
    match &config.destination {
        DestinationConfig::Postgres { table, .. } => println!("destination: table {}", table),
        DestinationConfig::File { path, format, .. } => {
            println!("destination: {:?} file {}", format, path.display())
        }
    }
    println!("columns: {}", plan.schemas.output_columns().join(", "));

    // sample request per direction, key omitted
    if let (Some(&period), Some(code)) = (plan.periods.first(), config.commodity_codes.first()) {
        for direction in TradeDirection::ALL {
            let key = QueryKey {
                period,
                code: code.clone(),
                direction,
            };
            let url = build_url(&plan.base_url, &key, plan.schemas.get(direction), None)?;
            println!("{}: {}", direction, url);
        }
    }
    Ok(())
}
