//! CLI command handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use rulesync_client::HttpRuleStore;
use rulesync_core::TracingRuleStore;
use rulesync_reconciler::{Reconciler, Warning};

use crate::cli::{Cli, Commands};
use crate::desired::DesiredState;
use crate::driver::{Driver, Outcome};

/// Execute a CLI command.
///
/// This is the main command dispatcher that routes to the appropriate handler.
///
/// # Errors
///
/// Setup failures and the first failing lifecycle call.
pub async fn execute_command(cli: Cli) -> Result<()> {
    let driver = build_driver(&cli)?;

    match &cli.command {
        Commands::Plan => cmd_plan(&driver, &cli).await,
        Commands::Apply => cmd_apply(&driver, &cli).await,
        Commands::Refresh => cmd_refresh(&driver).await,
        Commands::Import { name, metric } => cmd_import(&driver, name, metric).await,
        Commands::Destroy => cmd_destroy(&driver).await,
    }
}

fn build_driver(cli: &Cli) -> Result<Driver> {
    let config = cli
        .client
        .resolve()
        .context("Failed to load the rule service client config")?;

    let store = HttpRuleStore::new(config).context("Failed to set up the rule service client")?;
    let reconciler = Reconciler::builder()
        .with_store(Arc::new(TracingRuleStore::new(store)))
        .strict_import_probe(cli.strict_import_probe)
        .build()?;

    Ok(Driver::new(reconciler, &cli.state))
}

async fn cmd_plan(driver: &Driver, cli: &Cli) -> Result<()> {
    let desired = DesiredState::load(&cli.config)?;
    let (plan, warnings) = driver.plan(&desired).await?;

    print_warnings(&warnings);
    print!("{plan}");
    Ok(())
}

async fn cmd_apply(driver: &Driver, cli: &Cli) -> Result<()> {
    let desired = DesiredState::load(&cli.config)?;
    let outcome = driver.apply(&desired).await?;
    finish(outcome, "applied")
}

async fn cmd_refresh(driver: &Driver) -> Result<()> {
    let (state, warnings) = driver.refresh().await?;

    print_warnings(&warnings);
    println!(
        "Refreshed {} rule(s) into {}",
        state.rules.len(),
        driver.state_path().display()
    );
    Ok(())
}

async fn cmd_import(driver: &Driver, name: &str, metric: &str) -> Result<()> {
    driver.import(name, metric).await?;
    println!("Imported '{metric}' as '{name}'");
    Ok(())
}

async fn cmd_destroy(driver: &Driver) -> Result<()> {
    let outcome = driver.destroy().await?;
    finish(outcome, "destroyed")
}

fn finish(outcome: Outcome, verb: &str) -> Result<()> {
    print_warnings(&outcome.warnings);
    println!("{} rule change(s) {verb}", outcome.applied);

    match outcome.failure {
        None => Ok(()),
        Some(e) if e.is_partial() => Err(anyhow::Error::new(e).context(
            "Partial failure: the old rule was deleted but its replacement was not created; \
             run apply again to create it",
        )),
        Some(e) => Err(e.into()),
    }
}

fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("Warning: {}: {}", warning.summary(), warning.detail());
    }
}
