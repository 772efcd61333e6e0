use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;

use hostvault::cli::{handle_init_command, handle_snapshot_command, SnapshotCommands};
use hostvault::config::{paths::VaultPaths, settings::Settings};
use hostvault::runtime::DockerRuntime;
use hostvault::store::ResticStore;
use hostvault::sync::RsyncSync;

#[derive(Parser)]
#[command(
    name = "hostvault",
    author = "Kaylee Beyene",
    version,
    about = "Whole-machine backup and restore orchestrator",
    long_about = "hostvault backs up and restores an entire host against a \
                  deduplicating restic repository, stopping and replaying the \
                  running Docker workloads around each operation."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the snapshot repository and credential
    Init {
        /// Overwrite an existing credential
        #[arg(short, long)]
        force: bool,
    },

    /// Snapshot management commands
    #[command(subcommand, alias = "snap")]
    Snapshot(SnapshotCommands),

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("hostvault - Whole-machine backup and restore");
        println!();
        println!("Run 'hostvault --help' for usage information.");
        return Ok(());
    };

    // Everything this tool does touches root-owned state: the repository,
    // the live filesystem, and the runtime's data directory.
    if !nix::unistd::Uid::effective().is_root() {
        bail!("hostvault must run as root");
    }

    let paths = VaultPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    let store = ResticStore::new(settings.repository.clone(), paths.credential_file());

    match command {
        Commands::Init { force } => {
            require_restic()?;
            handle_init_command(&paths, &settings, &store, force)?;
        }
        Commands::Snapshot(cmd) => {
            require_restic()?;
            if !paths.is_initialized() {
                bail!(
                    "No repository credential at {}; run 'hostvault init' first",
                    paths.credential_file().display()
                );
            }

            let runtime = DockerRuntime::detect();
            let sync = RsyncSync::new();
            handle_snapshot_command(&store, &runtime, &sync, &settings, cmd)?;
        }
        Commands::Config => {
            println!("hostvault Configuration");
            println!("=======================");
            println!("Config directory: {}", paths.base_dir().display());
            println!("Credential file:  {}", paths.credential_file().display());
            println!("Repository:       {}", settings.repository.display());
            println!("Staging base:     {}", settings.staging_base.display());
            println!();
            println!("Backup paths:     {}", display_paths(&settings.backup_paths));
            println!("Excluded:         {}", display_paths(&settings.exclude_paths));
            println!("Mirror roots:     {}", display_paths(&settings.mirror_paths));
            println!("Additive roots:   {}", display_paths(&settings.additive_paths));
            println!(
                "Runtime data dir: {}",
                settings.runtime_data_dir.display()
            );
        }
    }

    Ok(())
}

fn require_restic() -> Result<()> {
    if !ResticStore::is_installed() {
        bail!("restic is not installed or not on PATH");
    }
    Ok(())
}

fn display_paths(paths: &[std::path::PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
