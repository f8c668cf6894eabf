use clap::Parser;
use enact_core::CONFIG_FILENAME;
use tracing::level_filters::LevelFilter;

/// Where proposals are written when `--out` is not set.
const DEFAULT_PROPOSALS_PATH: &str = "proposals.json";

#[derive(Parser)]
#[command(name = "enact")]
#[command(
    author,
    version,
    about = "Run a multi-network changeset directly or as timelock proposals"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "ENACT_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the network configuration, or to a directory containing Enact.toml.
    ///
    /// Values can be overridden with `ENACT_`-prefixed environment variables,
    /// nested keys separated by `__` (e.g. `ENACT_MCMS__MIN_DELAY=1h`).
    #[arg(short, long, alias = "conf", env = "ENACT_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: String,

    /// Path to the changeset plan to capture.
    #[arg(short, long, env = "ENACT_PLAN")]
    pub plan: String,

    /// Where to write the generated proposals, in proposal mode.
    #[arg(short, long, env = "ENACT_OUT", default_value = DEFAULT_PROPOSALS_PATH)]
    pub out: String,

    /// Capture and print the transactions without sending anything or
    /// building proposals.
    #[arg(long, env = "ENACT_DRY_RUN")]
    pub dry_run: bool,
}
