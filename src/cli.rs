//! CLI interface for Stevedore.
//!
//! Each subcommand is non-interactive: arguments in, structured output out.
//!
//! Commands split into two groups:
//!
//! - `stevedore import` / `stevedore columns` — start from a source file.
//! - `stevedore sheet list|sync|status` — operate on imported sheets.
//!
//! Sheet references take a full UUID or unambiguous prefix.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::Config;
use crate::model::{FieldMapping, ImportDefinition, ImportLog, ImportedSheet};
use crate::reconcile::StrategyRegistry;
use crate::storage::Storage;
use crate::task::{self, ImportError};
use crate::tabular;

/// Stevedore — load tabular cargo into the content repository.
#[derive(Debug, Parser)]
#[command(name = "stevedore", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Acting identity, recorded on import logs and draft ownership.
    /// When omitted, `STEVEDORE_ACTOR` or the configured default is used.
    #[arg(long = "as", global = true)]
    actor: Option<String>,

    /// Owner site applied to records published without one.
    /// When omitted, the configured default site is used.
    #[arg(long, global = true)]
    site: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow: importing a redirect sheet
  1. stevedore columns redirects.csv
     → prints the column headings available for mapping
  2. stevedore import redirects.csv --type vanity-redirect \
       --map "Local Path=displayName" --map "Local Path=localPaths" \
       --map "New URL=destination" --map "Status=temporary" \
       --map "Query String=queryString" --as importer --site main
     → prints a sheet ID (e.g. a3b0fc12) and the batch outcome
  3. stevedore sheet status a3b
  4. stevedore sheet sync a3b redirects.csv   # after the source changes"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import a tabular source: create a sheet and run its first batch.
    ///
    /// The column-to-field mappings and header setting are snapshotted on
    /// the sheet, so later syncs reuse them as-is.
    Import {
        /// Source file (CSV export).
        file: PathBuf,

        /// Target type the rows reconcile into.
        #[arg(long = "type")]
        target_type: String,

        /// Column-to-field mapping, e.g. "Local Path=displayName".
        /// Can be specified multiple times.
        #[arg(long = "map", value_name = "COLUMN=FIELD")]
        map: Vec<String>,

        /// The source has no header row; address columns as A, B, C, ...
        #[arg(long)]
        no_header: bool,

        /// Display name for the sheet. Defaults to the file name.
        #[arg(long)]
        name: Option<String>,
    },

    /// Manage imported sheets: list, re-sync, inspect status.
    Sheet {
        #[command(subcommand)]
        command: SheetCommand,
    },

    /// Print the column headings a source offers for mapping.
    Columns {
        /// Source file (CSV export).
        file: PathBuf,

        /// The source has no header row; print synthesized letter headings.
        #[arg(long)]
        no_header: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum SheetCommand {
    /// List imported sheets with their latest import status.
    List,

    /// Re-synchronize a sheet from its source and re-run the batch.
    ///
    /// Rows are replaced; the stored mappings are reused unchanged.
    Sync {
        /// Sheet ID: full UUID or unambiguous prefix.
        sheet: String,

        /// Source file to re-read.
        file: PathBuf,
    },

    /// Show the latest import log for a sheet.
    Status {
        /// Sheet ID: full UUID or unambiguous prefix.
        sheet: String,

        /// Show the full import history instead of just the latest run.
        #[arg(long)]
        all: bool,
    },
}

/// Run the CLI, returning an error message on failure.
pub fn run(config: &Config, storage: &Storage) -> Result<(), String> {
    let cli = Cli::parse();
    let registry = StrategyRegistry::with_defaults();

    match cli.command {
        Command::Import {
            file,
            target_type,
            map,
            no_header,
            name,
        } => cmd_import(
            config,
            storage,
            &registry,
            &file,
            &target_type,
            &map,
            no_header,
            name.as_deref(),
            cli.actor.as_deref(),
            cli.site.as_deref(),
        ),
        Command::Sheet { command } => match command {
            SheetCommand::List => cmd_list(storage),
            SheetCommand::Sync { sheet, file } => {
                let sheet = resolve_sheet(storage, &sheet)?;
                cmd_sync(
                    config,
                    storage,
                    &registry,
                    sheet,
                    &file,
                    cli.actor.as_deref(),
                    cli.site.as_deref(),
                )
            }
            SheetCommand::Status { sheet, all } => {
                let sheet = resolve_sheet(storage, &sheet)?;
                cmd_status(storage, &sheet, all)
            }
        },
        Command::Columns { file, no_header } => cmd_columns(&file, no_header),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_import(
    config: &Config,
    storage: &Storage,
    registry: &StrategyRegistry,
    file: &Path,
    target_type: &str,
    map: &[String],
    no_header: bool,
    name: Option<&str>,
    actor: Option<&str>,
    site: Option<&str>,
) -> Result<(), String> {
    let actor = config.resolve_actor(actor)?;
    let site = config.resolve_site(site);

    let mappings = map
        .iter()
        .map(|m| parse_mapping(m))
        .collect::<Result<Vec<_>, String>>()?;

    let definition = ImportDefinition {
        target_type: target_type.to_string(),
        has_header_row: !no_header,
        mappings,
    };

    let rows = tabular::parse(file, definition.has_header_row).map_err(|e| e.to_string())?;

    let name = name
        .map(str::to_string)
        .or_else(|| file.file_name().map(|f| f.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "imported sheet".to_string());

    let sheet = ImportedSheet::new(&name, definition, rows);
    storage
        .create_sheet(&sheet)
        .map_err(|e| format!("failed to save sheet: {e}"))?;

    println!("{}", sheet.id);

    let log = trigger(storage, registry, &sheet, &actor, site.as_deref())?;
    report(&log);
    Ok(())
}

fn cmd_list(storage: &Storage) -> Result<(), String> {
    let sheets = storage
        .list_sheets()
        .map_err(|e| format!("failed to list sheets: {e}"))?;

    if sheets.is_empty() {
        println!("No imported sheets");
        return Ok(());
    }

    for sheet in &sheets {
        let status = storage
            .find_latest_log(sheet.id)
            .map_err(|e| format!("failed to load import log: {e}"))?
            .map_or("never imported", |log| log.status.label());
        let short_id = &sheet.id.to_string()[..8];
        println!(
            "{short_id}  [{status}] [{}]  {} ({} rows)",
            sheet.definition.target_type,
            sheet.name,
            sheet.rows.len()
        );
    }

    Ok(())
}

fn cmd_sync(
    config: &Config,
    storage: &Storage,
    registry: &StrategyRegistry,
    mut sheet: ImportedSheet,
    file: &Path,
    actor: Option<&str>,
    site: Option<&str>,
) -> Result<(), String> {
    let actor = config.resolve_actor(actor)?;
    let site = config.resolve_site(site);

    let rows =
        tabular::parse(file, sheet.definition.has_header_row).map_err(|e| e.to_string())?;
    sheet.replace_rows(rows);
    storage
        .update_sheet(&sheet)
        .map_err(|e| format!("failed to update sheet: {e}"))?;

    let log = trigger(storage, registry, &sheet, &actor, site.as_deref())?;
    report(&log);
    Ok(())
}

fn cmd_status(storage: &Storage, sheet: &ImportedSheet, all: bool) -> Result<(), String> {
    let logs = if all {
        storage
            .list_logs(sheet.id)
            .map_err(|e| format!("failed to load import logs: {e}"))?
    } else {
        storage
            .find_latest_log(sheet.id)
            .map_err(|e| format!("failed to load import log: {e}"))?
            .into_iter()
            .collect()
    };

    if logs.is_empty() {
        println!("No imports recorded for {}", sheet.name);
        return Ok(());
    }

    for log in &logs {
        println!(
            "{}  [{}] submitted by {}",
            log.submission_date,
            log.status.label(),
            log.submitted_by
        );
        for error in &log.errors {
            println!("  {error}");
        }
    }

    Ok(())
}

fn cmd_columns(file: &Path, no_header: bool) -> Result<(), String> {
    let suggestions =
        tabular::column_suggestions(file, !no_header).map_err(|e| e.to_string())?;

    for column in suggestions {
        println!("{column}");
    }
    Ok(())
}

/// Runs the batch, folding configuration errors into actionable messages.
fn trigger(
    storage: &Storage,
    registry: &StrategyRegistry,
    sheet: &ImportedSheet,
    actor: &str,
    site: Option<&str>,
) -> Result<ImportLog, String> {
    task::trigger_import(storage, registry, sheet, actor, site).map_err(|e| match e {
        ImportError::UnknownType(_) => {
            format!("{e}; known types: {}", registry.target_types().join(", "))
        }
        other => other.to_string(),
    })
}

/// Prints a batch outcome to stderr.
fn report(log: &ImportLog) {
    eprintln!("Import {}", log.status.label());
    for error in &log.errors {
        eprintln!("  {error}");
    }
}

/// Parses a `COLUMN=FIELD` mapping argument.
fn parse_mapping(raw: &str) -> Result<FieldMapping, String> {
    let Some((column, field)) = raw.split_once('=') else {
        return Err(format!("invalid mapping '{raw}': expected COLUMN=FIELD"));
    };
    let column = column.trim();
    let field = field.trim();
    if column.is_empty() || field.is_empty() {
        return Err(format!(
            "invalid mapping '{raw}': column and field must both be non-empty"
        ));
    }
    Ok(FieldMapping {
        column: column.to_string(),
        field: field.to_string(),
    })
}

/// Resolve a sheet reference (full UUID or unambiguous prefix) to a sheet.
fn resolve_sheet(storage: &Storage, reference: &str) -> Result<ImportedSheet, String> {
    // Try full UUID first.
    if let Ok(id) = reference.parse::<Uuid>() {
        return storage
            .load_sheet(id)
            .map_err(|e| format!("sheet not found: {e}"));
    }

    // Try as a prefix match against all sheets.
    let sheets = storage
        .list_sheets()
        .map_err(|e| format!("failed to list sheets: {e}"))?;

    let matches: Vec<&ImportedSheet> = sheets
        .iter()
        .filter(|s| s.id.to_string().starts_with(reference))
        .collect();

    match matches.len() {
        0 => Err(format!("no sheet matching '{reference}'")),
        1 => Ok(matches[0].clone()),
        n => {
            let ids: Vec<String> = matches
                .iter()
                .map(|s| s.id.to_string()[..8].to_string())
                .collect();
            Err(format!(
                "'{reference}' is ambiguous — matches {n} sheets: {}",
                ids.join(", ")
            ))
        }
    }
}
