//! Subcommand handlers.
//!
//! Handlers write their output to a caller-supplied writer so the binary can
//! pass stdout and tests can pass a buffer.

use rowguard_acl::{AccessControl, ResetOptions, ResetReport};
use rowguard_core::{AccessConfig, Identity};
use rowguard_storage::{InMemoryStore, Record, Snapshot};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::cli::{Args, Command, ConfigAction};
use crate::config::CliConfig;
use crate::error::{Error, Result};

// ============================================================================
// Dispatch
// ============================================================================

/// Runs the parsed command.
pub fn run(args: &Args, config: &CliConfig, out: &mut dyn Write) -> Result<()> {
    match &args.command {
        Command::Reset {
            data,
            app_label,
            entity_types,
            dry_run,
        } => {
            let options = ResetOptions {
                app_label: app_label.clone(),
                entity_types: entity_types.clone(),
            };
            cmd_reset(data, &options, *dry_run, out)?;
        }
        Command::List {
            data,
            entity_type,
            identity,
        } => {
            let identity = parse_identity(identity, &config.access)?;
            cmd_list(data, entity_type, identity, out)?;
        }
        Command::Config { action } => match action {
            ConfigAction::Path => cmd_config_path(args.config.as_deref(), out)?,
            ConfigAction::Show => cmd_config_show(config, out)?,
        },
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses an `--as` value: `super`, `anonymous`, `user:<id>`, or a raw id
/// interpreted through the configured markers.
pub fn parse_identity(value: &str, access: &AccessConfig) -> Result<Identity> {
    if let Ok(raw) = value.trim().parse::<i64>() {
        return Ok(access.identity_for(raw));
    }
    value
        .parse::<Identity>()
        .map_err(|_| Error::Identity(value.to_string()))
}

/// Loads a snapshot into a store and wires access control to it.
pub fn open(data: &Path) -> Result<(Arc<InMemoryStore>, AccessControl)> {
    let snapshot = Snapshot::from_file(data)?;
    let store = Arc::new(InMemoryStore::from_snapshot(snapshot)?);
    let control = AccessControl::from_store(store.clone())?;
    log::debug!("Loaded {}", data.display());
    Ok((store, control))
}

fn render(record: &Record) -> String {
    let mut line = format!("{record} [{}]", record.access().level());
    for (field, value) in record.values() {
        line.push_str(&format!(" {field}={value}"));
    }
    line
}

// ============================================================================
// Commands
// ============================================================================

/// Recomputes cached access fields and reports what changed.
///
/// Prints `Updating <type>` for each processed type followed by one
/// `<type>#<id> updated: <fields>` line per changed instance. The snapshot is
/// written back when something changed, unless `dry_run` is set.
pub fn cmd_reset(
    data: &Path,
    options: &ResetOptions,
    dry_run: bool,
    out: &mut dyn Write,
) -> Result<Vec<ResetReport>> {
    let (store, control) = open(data)?;

    let mut processed = Vec::new();
    let reports =
        control.reset_with_progress(options, |name| processed.push(name.to_string()))?;

    for name in &processed {
        writeln!(out, "Updating {name}")?;
        for report in reports.iter().filter(|r| r.entity_type == *name) {
            writeln!(out, "{report}")?;
        }
    }

    if reports.is_empty() {
        writeln!(out, "No changes")?;
    } else if dry_run {
        writeln!(out, "Dry run: {} not written", data.display())?;
    } else {
        store.snapshot().write_to_file(data)?;
        log::info!("Wrote {} updated records to {}", reports.len(), data.display());
    }
    Ok(reports)
}

/// Prints the records of `entity_type` visible to `identity`.
pub fn cmd_list(
    data: &Path,
    entity_type: &str,
    identity: Identity,
    out: &mut dyn Write,
) -> Result<usize> {
    let (_store, control) = open(data)?;
    let records = control
        .objects(entity_type)?
        .as_identity(identity)
        .all()?;
    for record in &records {
        writeln!(out, "{}", render(record))?;
    }
    Ok(records.len())
}

/// Prints the resolved config file path.
pub fn cmd_config_path(explicit: Option<&Path>, out: &mut dyn Write) -> Result<()> {
    match CliConfig::resolve_config_path(explicit) {
        Some(path) => {
            writeln!(out, "{}", path.display())?;
            if !path.exists() {
                eprintln!("(file does not exist; defaults are in effect)");
            }
            Ok(())
        }
        None => Err(Error::Config(
            "Could not determine config directory for this platform".to_string(),
        )),
    }
}

/// Prints the effective configuration as TOML.
pub fn cmd_config_show(config: &CliConfig, out: &mut dyn Write) -> Result<()> {
    write!(out, "{}", config.to_toml_string()?)?;
    Ok(())
}
