mod app;
mod commands;
mod config;
mod logging;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use renamer_engine::{ChatCompletionsNamer, DirStagingArea, FileCredentialStore, Orchestrator};
use renamer_logging::renamer_info;

use app::Console;
use config::PersistedConfig;
pub use logging::LogDestination;

/// Stage files and let a naming service rename them in the background.
#[derive(Debug, Parser)]
#[command(name = "renamer", version)]
pub struct Args {
    /// Directory that holds the staged files.
    #[arg(long, default_value = "staging")]
    pub staging_dir: PathBuf,

    /// RON file with namer, retry and stop settings.
    #[arg(long, default_value = "renamer.ron")]
    pub config: PathBuf,

    /// JSON file the verified API key is kept in.
    #[arg(long, default_value = ".renamer_credentials.json")]
    pub credentials: PathBuf,

    /// Where log output goes.
    #[arg(long, value_enum, default_value_t = LogDestination::File)]
    pub log: LogDestination,

    /// Most verbose level that gets logged (off, error, warn, info, debug, trace).
    #[arg(long, default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,

    /// Write the default settings to the config file and exit.
    #[arg(long)]
    pub write_default_config: bool,
}

pub fn run_app(args: Args) -> anyhow::Result<()> {
    logging::initialize(args.log, args.log_level);

    if args.write_default_config {
        let path = config::save_config(&args.config, &PersistedConfig::default())?;
        println!("wrote default settings to {}", path.display());
        return Ok(());
    }

    let config = config::load_config(&args.config);
    let namer = ChatCompletionsNamer::new(config.namer_settings())
        .context("Failed to set up the naming client")?;
    let staging = DirStagingArea::open(&args.staging_dir)
        .with_context(|| format!("Failed to open staging dir {:?}", args.staging_dir))?;
    let credentials = FileCredentialStore::new(&args.credentials);
    let orchestrator = Orchestrator::new(
        Arc::new(namer),
        Arc::new(staging),
        Arc::new(credentials),
        config.orchestrator_settings(),
    )?;
    renamer_info!("Renamer started with staging dir {:?}", args.staging_dir);

    let mut console = Console::new(orchestrator, config.watch_interval());
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    console.run(stdin.lock(), &mut stdout)?;

    renamer_info!("Renamer exiting");
    Ok(())
}
