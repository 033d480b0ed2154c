//! `syndicate status get|set`

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;

use syndicate_core::SiteStatus;
use syndicate_sync::StatusReading;

use super::{site_id, Workspace};

/// Read or override a site's status flag.
#[derive(Subcommand, Debug)]
pub enum StatusCommand {
    /// Print the current status of a site.
    Get {
        /// Site id.
        id: u64,
    },

    /// Force a status, e.g. to recover a site left `pulling` by a crash.
    Set {
        /// Site id.
        id: u64,

        /// One of: idle, pulling, pushing, processing (any case).
        status: String,
    },
}

pub fn run(cmd: StatusCommand) -> Result<()> {
    match cmd {
        StatusCommand::Get { id } => get(id),
        StatusCommand::Set { id, status } => set(id, &status),
    }
}

fn get(id: u64) -> Result<()> {
    let ws = Workspace::open()?;
    let id = site_id(id)?;
    let reading = ws.gate.get_status(id);

    let label = match reading {
        StatusReading::Status(SiteStatus::Idle) | StatusReading::Unset => {
            reading.to_string().green()
        }
        StatusReading::Unknown => reading.to_string().red(),
        StatusReading::Status(_) => reading.to_string().yellow(),
    };

    let since = ws
        .status
        .read_record(id)
        .ok()
        .flatten()
        .map(|record| {
            let age = Utc::now().signed_duration_since(record.updated_at);
            format!(" (since {}s ago)", age.num_seconds().max(0))
        })
        .unwrap_or_default();
    println!("site {id}: {label}{since}");
    Ok(())
}

fn set(id: u64, status: &str) -> Result<()> {
    let ws = Workspace::open()?;
    let id = site_id(id)?;
    if !ws.gate.set_status(id, status) {
        bail!("could not set status of site {id} to '{status}'; expected: idle, pulling, pushing, processing");
    }
    println!("✓ site {id}: {}", ws.gate.get_status(id));
    Ok(())
}
