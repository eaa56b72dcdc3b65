//! Recovery commands.

use ftlog_core::{recover, DirectoryStore, NoopHooks, RecoveryConfig};
use std::path::Path;
use tracing::info;

/// Runs the needs-recovery command.
pub fn needs_recovery(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if ftlog_core::needs_recovery(dir, true)? {
        println!("Log at {:?} needs recovery", dir);
    } else {
        println!("Log at {:?} is clean", dir);
    }
    Ok(())
}

/// Runs the recover command.
pub fn run(dir: &Path, data_dir: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    info!(dir = %dir.display(), data_dir = %data_dir.display(), force, "running recovery");
    let config = RecoveryConfig::new(dir, data_dir).force_recovery(force);
    let mut store = DirectoryStore::new(data_dir)?;
    let outcome = recover(&config, &mut store, &mut NoopHooks)?;

    if !outcome.recovered {
        println!("Log is clean, nothing to recover");
        return Ok(());
    }

    println!("Recovery complete");
    println!("================");
    match (outcome.checkpoint_begin, outcome.checkpoint_end) {
        (Some(begin), Some(end)) => println!("Checkpoint:      {} .. {}", begin, end),
        _ => println!("Checkpoint:      none, replayed the whole log"),
    }
    println!("Entries:         {}", outcome.entries_replayed);
    println!("Aborted:         {}", outcome.aborted.len());
    println!("Last xid:        {}", outcome.last_xid);
    if let Some(checkpoint) = outcome.new_checkpoint {
        println!("New checkpoint:  {} .. {}", checkpoint.begin, checkpoint.end);
    }
    for txn in &outcome.prepared {
        println!(
            "Prepared:        {} (format {}, {} byte gtrid)",
            txn.xid,
            txn.xa_xid.format_id,
            txn.xa_xid.gtrid.len()
        );
    }
    Ok(())
}
