//! `syndicate site add|list|show`

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use syndicate_core::{registry, Site};

use super::{site_id, Workspace};

/// Register and inspect remote sites.
#[derive(Subcommand, Debug)]
pub enum SiteCommand {
    /// Register a site (no-op if the id is already registered).
    Add(AddArgs),

    /// List registered sites with their current status.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print one site's configuration.
    Show {
        /// Site id.
        id: u64,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Site id (greater than 0).
    pub id: u64,

    /// Human-readable site name.
    #[arg(long)]
    pub name: String,

    /// Transport type used to pull this site (e.g. "file").
    #[arg(long)]
    pub transport: Option<String>,

    /// Transport setting, repeatable: `--set source=/path/to/feed.json`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub settings: Vec<Setting>,
}

/// One `key=value` transport setting.
#[derive(Debug, Clone)]
pub struct Setting {
    key: String,
    value: String,
}

impl FromStr for Setting {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(Self {
                key: key.trim().to_string(),
                value: value.to_string(),
            }),
            _ => Err(format!("expected KEY=VALUE, got '{s}'")),
        }
    }
}

pub fn run(cmd: SiteCommand) -> Result<()> {
    match cmd {
        SiteCommand::Add(args) => add(args),
        SiteCommand::List { json } => list(json),
        SiteCommand::Show { id } => show(id),
    }
}

fn add(args: AddArgs) -> Result<()> {
    let id = site_id(args.id)?;
    let settings: BTreeMap<String, String> = args
        .settings
        .into_iter()
        .map(|s| (s.key, s.value))
        .collect();

    let site = registry::add_site(id, args.name, args.transport, settings)
        .with_context(|| format!("failed to register site {id}"))?;
    println!(
        "✓ site {} '{}' registered (transport: {})",
        site.id,
        site.name,
        site.transport_type.as_deref().unwrap_or("none")
    );
    Ok(())
}

#[derive(Serialize)]
struct SiteJson<'a> {
    #[serde(flatten)]
    site: &'a Site,
    status: String,
}

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "id")]
    id: u64,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "transport")]
    transport: String,
    #[tabled(rename = "status")]
    status: String,
}

fn list(json: bool) -> Result<()> {
    let ws = Workspace::open()?;
    let sites = registry::list_sites().context("failed to load site registry")?;

    if json {
        let rows: Vec<SiteJson<'_>> = sites
            .iter()
            .map(|site| SiteJson {
                site,
                status: ws.gate.get_status(site.id).to_string(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if sites.is_empty() {
        println!("No sites registered.");
        println!("Run: syndicate site add <id> --name <name> --transport <type>");
        return Ok(());
    }

    let rows: Vec<SiteRow> = sites
        .iter()
        .map(|site| SiteRow {
            id: site.id.0,
            name: site.name.clone(),
            transport: site.transport_type.clone().unwrap_or_else(|| "-".to_string()),
            status: ws.gate.get_status(site.id).to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn show(id: u64) -> Result<()> {
    let ws = Workspace::open()?;
    let id = site_id(id)?;
    let site = registry::load_site(id)?;

    println!("{} {}", "Site".bold(), site.id);
    println!("  name:      {}", site.name);
    println!(
        "  transport: {}",
        site.transport_type.as_deref().unwrap_or("none")
    );
    println!("  status:    {}", ws.gate.get_status(id));
    println!("  created:   {}", site.created_at.to_rfc3339());
    for (key, value) in &site.settings {
        println!("  {key} = {value}");
    }
    Ok(())
}
