//! Snapshot CLI commands
//!
//! Maps create/list/delete/restore 1:1 onto the orchestrators. Delete and
//! restore select their target by 1-indexed ordinal against a freshly
//! materialized catalog; an out-of-range ordinal is reported and nothing
//! else happens.

use clap::Subcommand;

use super::{format_size, prompt_string};
use crate::catalog::SnapshotCatalog;
use crate::config::settings::Settings;
use crate::error::HostVaultResult;
use crate::runtime::ContainerRuntime;
use crate::services::restore::interrupt;
use crate::services::{BackupOrchestrator, RestoreOrchestrator};
use crate::store::SnapshotStore;
use crate::sync::FileSync;

/// Snapshot subcommands
#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Create a new whole-machine snapshot
    Create,

    /// List all snapshots in the repository
    List,

    /// Delete a snapshot by its position in the listing
    Delete {
        /// 1-indexed position from 'snapshot list'
        ordinal: usize,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Restore the machine from a snapshot by its position in the listing
    Restore {
        /// 1-indexed position from 'snapshot list'
        ordinal: usize,
    },
}

/// Handle a snapshot command
pub fn handle_snapshot_command<S, R, F>(
    store: &S,
    runtime: &R,
    sync: &F,
    settings: &Settings,
    cmd: SnapshotCommands,
) -> HostVaultResult<()>
where
    S: SnapshotStore,
    R: ContainerRuntime + Clone + Send + 'static,
    F: FileSync,
{
    match cmd {
        SnapshotCommands::Create => {
            println!("Creating snapshot...");
            let summary = BackupOrchestrator::new(store, runtime, settings).run()?;

            println!("Snapshot created: {}", summary.snapshot_id);
            println!(
                "  Files: {} new, {} changed",
                summary.files_new, summary.files_changed
            );
            println!(
                "  Data:  {} processed, {} added to the repository",
                format_size(summary.total_bytes_processed),
                format_size(summary.data_added)
            );
        }

        SnapshotCommands::List => {
            let catalog = SnapshotCatalog::new(store.snapshots()?);

            if catalog.is_empty() {
                println!("No snapshots found.");
                println!("Create one with: hostvault snapshot create");
                return Ok(());
            }

            println!("{}", catalog.render());
            println!("Total: {} snapshot(s)", catalog.len());
        }

        SnapshotCommands::Delete { ordinal, force } => {
            let catalog = SnapshotCatalog::new(store.snapshots()?);

            let snapshot = match catalog.select(ordinal) {
                Some(s) => s,
                None => {
                    print_out_of_range(ordinal, &catalog);
                    return Ok(());
                }
            };

            if !force {
                println!(
                    "This will permanently delete snapshot {} ({}).",
                    snapshot.id,
                    snapshot.time.format("%Y-%m-%d %H:%M:%S UTC")
                );
                println!("To proceed, run again with --force:");
                println!("  hostvault snapshot delete {} --force", ordinal);
                return Ok(());
            }

            store.delete(&snapshot.id)?;
            println!("Deleted snapshot {}.", snapshot.id);
        }

        SnapshotCommands::Restore { ordinal } => {
            let catalog = SnapshotCatalog::new(store.snapshots()?);

            let snapshot = match catalog.select(ordinal) {
                Some(s) => s,
                None => {
                    print_out_of_range(ordinal, &catalog);
                    return Ok(());
                }
            };

            println!("Restore target:");
            println!("  Snapshot: {}", snapshot.id);
            println!(
                "  Created:  {}",
                snapshot.time.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("  Host:     {}", snapshot.hostname);
            println!("  Paths:    {}", snapshot.paths_display());
            println!();

            interrupt::install();

            let snapshot_id = snapshot.id.clone();
            let result = RestoreOrchestrator::new(store, runtime, sync, settings).run(
                &snapshot_id,
                |check| {
                    println!(
                        "Space check passed: need {}, have {}.",
                        format_size(check.required_bytes),
                        format_size(check.available_bytes)
                    );
                    println!();
                    println!("WARNING: this will overwrite data on this machine and");
                    println!("cannot be undone once the data swap begins.");
                    println!(
                        "Type the snapshot id '{}' to proceed, anything else to abort.",
                        snapshot_id
                    );
                    matches!(prompt_string("> "), Ok(input) if input == snapshot_id)
                },
            );

            match result {
                Ok(outcome) => {
                    println!("Restore complete.");
                    if !outcome.runtime_data_swapped {
                        println!("Note: the snapshot carried no container runtime data.");
                    }
                    println!(
                        "  Synced roots: {} mirrored, {} additive",
                        outcome.mirrored_roots.len(),
                        outcome.additive_roots.len()
                    );
                }
                Err(e) if e.is_abort() => {
                    println!("Restore aborted: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}

fn print_out_of_range(ordinal: usize, catalog: &SnapshotCatalog) {
    if catalog.is_empty() {
        println!("No snapshots in the repository.");
    } else {
        println!(
            "Selection {} is out of range; valid positions are 1-{}.",
            ordinal,
            catalog.len()
        );
        println!("Run 'hostvault snapshot list' to see the current listing.");
    }
}
