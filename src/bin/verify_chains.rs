use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use tracing::error;

use integrity_ledger::database::Database;
use integrity_ledger::integrity::audit_chains;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("verify-chains")
        .version("1.0.0")
        .about("Verify the block-hash chain of every patient in the integrity ledger")
        .arg(
            Arg::new("database-url")
                .short('d')
                .long("database-url")
                .value_name("URL")
                .env("DATABASE_URL")
                .help("SQLite database URL")
                .required(true),
        )
        .arg(
            Arg::new("patient")
                .short('p')
                .long("patient")
                .value_name("ID")
                .value_parser(clap::value_parser!(i64))
                .help("Only verify this patient's chain"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print reports as JSON"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .init();

    let database_url = matches
        .get_one::<String>("database-url")
        .ok_or_else(|| anyhow!("--database-url is required"))?;
    let only_patient = matches.get_one::<i64>("patient").copied();
    let as_json = matches.get_flag("json");

    let database = Database::new(database_url).await?;
    let reports = audit_chains(&database, only_patient).await?;
    let broken = reports.iter().filter(|r| !r.valid).count();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            if verbose || !report.valid {
                println!("{}", report.summary());
            }
        }
        println!(
            "Checked {} chains: {} valid, {} broken",
            reports.len(),
            reports.len() - broken,
            broken
        );
    }

    if broken > 0 {
        error!("{} broken chains found", broken);
        std::process::exit(1);
    }

    Ok(())
}
