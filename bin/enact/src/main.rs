//! enact runs a changeset plan against several networks, either by sending the
//! transactions or by emitting timelock proposals.

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};

use cli::Cli;
use enact_core::{
    CONFIG_FILENAME, CapturedTransaction, ChangesetOutput, ChangesetPlan, DeployerGroup,
    EnactConfig,
};

/// Keys set by CLI-only `ENACT_` variables, which are not configuration.
const CLI_ONLY_KEYS: [&str; 5] = ["config", "plan", "out", "verbosity", "dry_run"];

/// The configuration file layered with `ENACT_` environment overrides.
fn config_figment(path: &Path) -> Figment {
    Figment::new().merge(Toml::file(path)).merge(
        Env::prefixed("ENACT_")
            .ignore(&CLI_ONLY_KEYS)
            .split("__"),
    )
}

/// Load the configuration file, then apply `ENACT_` environment overrides.
fn load_config(path: &Path) -> Result<EnactConfig> {
    let path = if path.is_dir() {
        path.join(CONFIG_FILENAME)
    } else {
        path.to_path_buf()
    };
    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }

    let config: EnactConfig = config_figment(&path)
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn captured_table(transactions: &[CapturedTransaction]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Network", "Nonce", "From", "To", "Value", "Hash"]);
    for tx in transactions {
        table.add_row(vec![
            Cell::new(tx.chain),
            Cell::new(tx.nonce),
            Cell::new(tx.from),
            Cell::new(tx.to),
            Cell::new(tx.value),
            Cell::new(tx.hash),
        ]);
    }
    table
}

fn output_table(output: &ChangesetOutput) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    if output.proposals.is_empty() {
        table.set_header(vec!["Hash", "Block", "Status"]);
        for receipt in &output.receipts {
            table.add_row(vec![
                Cell::new(receipt.hash),
                Cell::new(receipt.block_number),
                Cell::new(if receipt.success { "success" } else { "reverted" }),
            ]);
        }
    } else {
        table.set_header(vec!["Proposal", "Network", "Starting op count", "Operations"]);
        for proposal in &output.proposals {
            for (chain, metadata) in &proposal.chain_metadata {
                table.add_row(vec![
                    Cell::new(&proposal.description),
                    Cell::new(chain),
                    Cell::new(metadata.starting_op_count),
                    Cell::new(proposal.batch_len(*chain)),
                ]);
            }
        }
    }
    table
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = load_config(Path::new(&cli.config))?;
    let plan = ChangesetPlan::load_from_file(Path::new(&cli.plan))?;

    let env = config.build_environment()?;
    let state = config.build_chain_state();

    let mut group = plan.group(DeployerGroup::builder(&env, &state).mcms(config.mcms));

    tracing::info!(
        config = %cli.config,
        plan = %cli.plan,
        mode = %group.mode(),
        networks = config.networks.len(),
        contexts = plan.contexts.len(),
        "Capturing changeset..."
    );

    let captured = plan.apply(&mut group).await?;

    if cli.dry_run {
        println!("{}", captured_table(&captured));
        tracing::info!(transactions = captured.len(), "Dry run, nothing was sent");
        return Ok(());
    }

    let output = group.enact().await?;

    if !output.proposals.is_empty() {
        let out = PathBuf::from(&cli.out);
        let content = serde_json::to_string_pretty(&output.proposals)
            .context("Failed to serialize proposals")?;
        std::fs::write(&out, content)
            .with_context(|| format!("Failed to write proposals to {}", out.display()))?;
        tracing::info!(
            path = %out.display(),
            proposals = output.proposals.len(),
            "Proposals written"
        );
    }

    println!("{}", output_table(&output));

    Ok(())
}
