//! # Viewtrace CLI
//!
//! Command handling for the `viewtrace` binary:
//! - `expand`: instrument serialized source files and write the output and metadata
//! - `print`: render a serialized source file as source text
//! - `check`: instrument, mount every view on the reference host and run the
//!   over-render harness

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing::{debug, info};

use viewtrace_core::config::{
    ExpansionMode, HarnessConfig, HostConfig, InstrumentConfig, InvalidationStrategy,
};
use viewtrace_core::runtime::{HarnessReport, LiveView, OverRenderHarness, Recorder};
use viewtrace_core::tracer::{FileExpansionSummary, FileTracer, ViewTracer};
use viewtrace_core::ToSource;

/// Exit code when expansion produced diagnostics or the harness found violations
pub const EXIT_FINDINGS: u8 = 1;

pub fn build_cli() -> Command {
    Command::new("viewtrace")
        .version(viewtrace_core::VERSION)
        .about("Instrument declarative views and check them for over-rendering")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug logging")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("expand")
                .about("Expand @TrackPerformance views and write instrumented source and metadata")
                .arg(input_arg())
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_name("DIR")
                        .help("Output directory")
                        .default_value("viewtrace-out")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("replace-body")
                        .long("replace-body")
                        .help("Replace each body with its instrumented rewrite")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Compute expansions without writing anything")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("print")
                .about("Render a serialized source file as source text")
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Mount each instrumented view and report over-rendering")
                .arg(input_arg())
                .arg(
                    Arg::new("strategy")
                        .long("strategy")
                        .value_name("STRATEGY")
                        .help("Invalidation strategy of the reference host")
                        .value_parser(["fine", "whole-body"])
                        .default_value("fine"),
                )
                .arg(
                    Arg::new("settle-ms")
                        .long("settle-ms")
                        .value_name("MS")
                        .help("Wait after each mutation before reading counts")
                        .value_parser(value_parser!(u64))
                        .default_value("10"),
                ),
        )
}

fn input_arg() -> Arg {
    Arg::new("input")
        .value_name("INPUT")
        .help("Serialized source file (.json) or directory")
        .required(true)
        .index(1)
        .value_parser(value_parser!(PathBuf))
}

/// Parse `args` and run the selected command, writing user-facing output to `out`
pub fn run_from<I, T>(args: I, out: &mut dyn Write) -> Result<u8>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_cli().try_get_matches_from(args)?;
    run(&matches, out)
}

pub fn run(matches: &ArgMatches, out: &mut dyn Write) -> Result<u8> {
    match matches.subcommand() {
        Some(("expand", sub)) => {
            let options = ExpandOptions {
                input: required_path(sub, "input")?,
                out: required_path(sub, "out")?,
                replace_body: sub.get_flag("replace-body"),
                dry_run: sub.get_flag("dry-run"),
            };
            let summary = expand(&options, out)?;
            Ok(if summary.success() { 0 } else { EXIT_FINDINGS })
        }
        Some(("print", sub)) => {
            print(&required_path(sub, "input")?, out)?;
            Ok(0)
        }
        Some(("check", sub)) => {
            let strategy = match sub.get_one::<String>("strategy").map(String::as_str) {
                Some("whole-body") => InvalidationStrategy::WholeBody,
                _ => InvalidationStrategy::FineGrained,
            };
            let settle_ms = sub.get_one::<u64>("settle-ms").copied().unwrap_or(10);
            let options = CheckOptions {
                input: required_path(sub, "input")?,
                strategy,
                settle: Duration::from_millis(settle_ms),
            };
            let outcome = check(&options, out)?;
            Ok(if outcome.is_clean() { 0 } else { EXIT_FINDINGS })
        }
        Some((other, _)) => Err(anyhow!("Unknown command: {other}")),
        None => Err(anyhow!("No command given")),
    }
}

fn required_path(matches: &ArgMatches, name: &str) -> Result<PathBuf> {
    matches
        .get_one::<PathBuf>(name)
        .cloned()
        .ok_or_else(|| anyhow!("Missing argument: {name}"))
}

#[derive(Debug, Clone)]
pub struct ExpandOptions {
    pub input: PathBuf,
    pub out: PathBuf,
    pub replace_body: bool,
    pub dry_run: bool,
}

pub fn expand(options: &ExpandOptions, out: &mut dyn Write) -> Result<FileExpansionSummary> {
    let mode = if options.replace_body {
        ExpansionMode::ReplaceBody
    } else {
        ExpansionMode::MembersOnly
    };
    let tracer = ViewTracer::for_config(InstrumentConfig::new().with_mode(mode)).dry_run(options.dry_run);
    let mut file_tracer = FileTracer::new(tracer);
    let summary = file_tracer.transform_path(&options.input, &options.out)?;

    for metadata in &summary.metadata {
        writeln!(
            out,
            "{}: {} tracked expression(s), {} field(s)",
            metadata.view,
            metadata.expressions.len(),
            metadata.tracked_fields.len()
        )?;
    }
    for diagnostic in &summary.diagnostics {
        writeln!(out, "{diagnostic}")?;
    }
    for error in &summary.errors {
        writeln!(out, "{error}")?;
    }
    for output in &summary.outputs {
        writeln!(out, "wrote {}", output.display())?;
    }
    if options.dry_run {
        writeln!(out, "dry run: nothing written")?;
    }

    info!(
        files = summary.files_processed,
        expanded = summary.declarations_expanded,
        "expand finished"
    );
    Ok(summary)
}

pub fn print(input: &Path, out: &mut dyn Write) -> Result<()> {
    let file = FileTracer::load(input)?;
    write!(out, "{}", file.to_source())?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub input: PathBuf,
    pub strategy: InvalidationStrategy,
    pub settle: Duration,
}

/// Harness reports plus the expansion diagnostics of one `check` run
#[derive(Debug, Default)]
pub struct CheckOutcome {
    pub reports: Vec<HarnessReport>,
    pub diagnostics: usize,
}

impl CheckOutcome {
    pub fn is_clean(&self) -> bool {
        self.diagnostics == 0 && self.reports.iter().all(HarnessReport::is_clean)
    }
}

pub fn check(options: &CheckOptions, out: &mut dyn Write) -> Result<CheckOutcome> {
    let config = InstrumentConfig::new().with_mode(ExpansionMode::ReplaceBody);
    let host_config = HostConfig::for_instrumentation(&config).with_strategy(options.strategy);
    let harness = OverRenderHarness::new(HarnessConfig::default().with_settle(options.settle));

    let mut outcome = CheckOutcome::default();
    for path in input_files(&options.input)? {
        let mut file = FileTracer::load(&path)?;
        let mut tracer = ViewTracer::for_config(config.clone());
        let summary = tracer.expand_file(&mut file);

        for diagnostic in &summary.diagnostics {
            writeln!(out, "{diagnostic}")?;
        }
        outcome.diagnostics += summary.diagnostics.len();

        for metadata in &summary.metadata {
            let decl = file
                .declarations
                .iter()
                .find(|decl| decl.name == metadata.view)
                .ok_or_else(|| anyhow!("Expanded view {} vanished from {}", metadata.view, path.display()))?;

            let recorder = Recorder::new();
            let mut view = LiveView::mount(decl, host_config.clone(), recorder.clone())
                .with_context(|| format!("Failed to mount {}", metadata.view))?;
            let report = harness.run(&mut view, metadata, &recorder)?;
            debug!(view = %metadata.view, clean = report.is_clean(), "checked view");
            write!(out, "{report}")?;
            outcome.reports.push(report);
        }
    }
    Ok(outcome)
}

fn input_files(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut files = Vec::new();
    collect_json(input, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_json(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_json(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "json")
            && !path.to_string_lossy().ends_with(".metadata.json")
        {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_check_defaults() {
        let matches = build_cli()
            .try_get_matches_from(["viewtrace", "check", "views.json"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("strategy").unwrap(), "fine");
        assert_eq!(*sub.get_one::<u64>("settle-ms").unwrap(), 10);
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let result = build_cli().try_get_matches_from(["viewtrace", "check", "v.json", "--strategy", "lazy"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_flag_is_global() {
        let matches = build_cli()
            .try_get_matches_from(["viewtrace", "print", "v.json", "--debug"])
            .unwrap();
        assert!(matches.get_flag("debug"));
    }
}
