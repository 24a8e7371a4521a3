//! `altas run` / `altas validate`: config-driven monthly reconciliation.

use std::path::{Path, PathBuf};

use altas_io::export::write_outputs;
use altas_io::source::{load_in_process, load_primary};
use altas_io::SourceError;
use altas_recon::model::RowKind;
use altas_recon::{ReconConfig, ReconError, ReconInput, ReconResult, Window};
use chrono::NaiveDate;
use clap::Subcommand;

use crate::exit_codes::EXIT_DUPLICATES;
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Classify one month of records and build the summary tables
    #[command(after_help = "\
Examples:
  altas run altas.recon.toml --input ALTAS.xlsx --sheet ABRIL --month 2025-04
  altas run altas.recon.toml --input abril.csv --in-process tramitacion.xlsx \\
      --from 01-04-2025 --to 30-04-2025 --today 10-05-2025 --out salida
  altas run altas.recon.toml --input abril.csv --month 2025-04 --json --strict")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Primary source (.csv, .xlsx, .xlsm, .xls, .ods)
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Sheet(s) of a workbook input to stack; defaults to the first sheet
        #[arg(long)]
        sheet: Vec<String>,

        /// Workbook or CSV holding drops still being processed
        #[arg(long)]
        in_process: Option<PathBuf>,

        /// Calendar month to reconcile
        #[arg(long, value_name = "YYYY-MM", conflicts_with_all = ["from", "to"], required_unless_present = "from")]
        month: Option<String>,

        /// First day of the window
        #[arg(long, value_name = "DD-MM-YYYY", requires = "to")]
        from: Option<String>,

        /// Last day of the window
        #[arg(long, value_name = "DD-MM-YYYY", requires = "from")]
        to: Option<String>,

        /// Cut-off for counted drops (defaults to the local date)
        #[arg(long, value_name = "DD-MM-YYYY")]
        today: Option<String>,

        /// Directory for the CSV tables and resumen.json
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print the full result as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Fail when any row was set aside as a duplicate
        #[arg(long)]
        strict: bool,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  altas validate altas.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run {
            config,
            input,
            sheet,
            in_process,
            month,
            from,
            to,
            today,
            out,
            json,
            strict,
        } => {
            let today = match today {
                Some(s) => parse_day(&s, "--today")?,
                None => chrono::Local::now().date_naive(),
            };
            let window = resolve_window(month.as_deref(), from.as_deref(), to.as_deref(), today)?;
            let sources = Sources { input, sheets: sheet, in_process };
            cmd_run(&config, &sources, window, out.as_deref(), json, strict)
        }
        ReconCommands::Validate { config } => cmd_validate(&config),
    }
}

struct Sources {
    input: PathBuf,
    sheets: Vec<String>,
    in_process: Option<PathBuf>,
}

fn parse_day(s: &str, flag: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(s.trim(), "%d-%m-%Y")
        .map_err(|_| CliError::usage(format!("{flag}: '{s}' is not a DD-MM-YYYY date")))
}

fn parse_month(s: &str) -> Option<(i32, u32)> {
    let (year, month) = s.trim().split_once('-')?;
    if year.len() != 4 {
        return None;
    }
    Some((year.parse().ok()?, month.parse().ok()?))
}

fn resolve_window(
    month: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    today: NaiveDate,
) -> Result<Window, CliError> {
    let window = match (month, from, to) {
        (Some(m), _, _) => {
            let (year, month) = parse_month(m)
                .ok_or_else(|| CliError::usage(format!("--month: '{m}' is not YYYY-MM")))?;
            Window::month(year, month, today)
        }
        (None, Some(from), Some(to)) => {
            let start = parse_day(from, "--from")?;
            let end = parse_day(to, "--to")?;
            Window::new(start, end, today)
        }
        _ => {
            return Err(CliError::usage("no reporting window given")
                .with_hint("pass --month YYYY-MM or both --from and --to"))
        }
    };
    window.map_err(|e| CliError::usage(e.to_string()))
}

fn load_config(path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| CliError::runtime(format!("cannot read config {}: {e}", path.display())))?;
    ReconConfig::from_toml(&config_str).map_err(|e| CliError::config(e.to_string()))
}

fn source_err(err: SourceError) -> CliError {
    match err {
        SourceError::SheetNotFound { .. } => {
            CliError::runtime(err.to_string()).with_hint("pick a listed sheet with --sheet")
        }
        SourceError::Recon(e) => engine_err(e),
        other => CliError::runtime(other.to_string()),
    }
}

fn engine_err(err: ReconError) -> CliError {
    match err {
        ReconError::MissingColumn { .. } => CliError::runtime(err.to_string())
            .with_hint("check the [schema] column names and aliases in the config"),
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => {
            CliError::config(err.to_string())
        }
        other => CliError::runtime(other.to_string()),
    }
}

fn cmd_run(
    config_path: &Path,
    sources: &Sources,
    window: Window,
    out: Option<&Path>,
    json_output: bool,
    strict: bool,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;

    let primary = load_primary(&sources.input, &sources.sheets).map_err(source_err)?;
    let in_process = sources
        .in_process
        .as_deref()
        .map(|path| load_in_process(path, &config.in_process))
        .transpose()
        .map_err(source_err)?;

    let input = ReconInput { primary, in_process, window };
    let result = altas_recon::run(&config, &input).map_err(engine_err)?;

    if let Some(dir) = out {
        let written = write_outputs(dir, &result).map_err(source_err)?;
        eprintln!("wrote {} file(s) to {}", written.len(), dir.display());
    }

    if json_output {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::runtime(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    print_summary(&result, &window);

    let duplicates = result.duplicates.total();
    if strict && duplicates > 0 {
        return Err(CliError {
            code: EXIT_DUPLICATES,
            message: format!("{duplicates} row(s) set aside as duplicates"),
            hint: Some("see duplicados_*.csv under --out, or drop --strict".into()),
        });
    }

    Ok(())
}

/// Human summary on stderr: window, record counts, the TOTAL row and the
/// duplicate audit.
fn print_summary(result: &ReconResult, window: &Window) {
    let stats = &result.stats;
    eprintln!(
        "{}: {} (today {}) - {} record(s), {} invalid",
        result.meta.config_name,
        window.label(),
        window.today.format("%d-%m-%Y"),
        stats.records,
        stats.invalid,
    );

    if let Some(total) = result.summary.rows.iter().find(|r| r.kind == RowKind::Total) {
        eprintln!(
            "TOTAL: {} altas, {} bajas, {} late drops, {} outside {}, totales {}",
            total.altas,
            total.bajas,
            total.late_drops,
            total.out_of_region,
            result.summary.target_region,
            total.totales,
        );
        for loc in &total.locations {
            eprintln!("  {}: {}", loc.location, loc.altas);
        }
    }

    eprintln!(
        "duplicates: {} altas, {} bajas, {} incid",
        stats.altas.duplicates, stats.bajas.duplicates, stats.incid.duplicates,
    );
}

fn cmd_validate(config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    eprintln!(
        "valid: '{}' with {} plan(s), {} service group(s), {} location(s)",
        config.name,
        config.plans.len(),
        config.service_groups.len(),
        config.locations.len(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::EXIT_USAGE;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_window() {
        let w = resolve_window(Some("2025-04"), None, None, d(2025, 5, 10)).unwrap();
        assert_eq!(w.start, d(2025, 4, 1));
        assert_eq!(w.end, d(2025, 4, 30));
        assert_eq!(w.today, d(2025, 5, 10));
    }

    #[test]
    fn explicit_window() {
        let w = resolve_window(None, Some("16-03-2025"), Some("15-04-2025"), d(2025, 4, 20)).unwrap();
        assert_eq!(w.start, d(2025, 3, 16));
        assert_eq!(w.end, d(2025, 4, 15));
    }

    #[test]
    fn bad_windows_are_usage_errors() {
        let today = d(2025, 5, 10);
        for (month, from, to) in [
            (Some("2025-13"), None, None),
            (Some("04-2025"), None, None),
            (Some("abril"), None, None),
            (None, Some("2025-04-01"), Some("30-04-2025")),
            (None, Some("30-04-2025"), Some("01-04-2025")),
            (None, None, None),
        ] {
            let err = resolve_window(month, from, to, today).unwrap_err();
            assert_eq!(err.code, EXIT_USAGE, "{month:?} {from:?} {to:?}");
        }
    }

    #[test]
    fn missing_column_gets_schema_hint() {
        let err = engine_err(ReconError::MissingColumn {
            table: "ABRIL".into(),
            column: "PLAN".into(),
        });
        assert_eq!(err.code, crate::exit_codes::EXIT_RUNTIME);
        assert!(err.hint.unwrap().contains("[schema]"));
    }
}
