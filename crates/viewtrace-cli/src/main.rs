use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use viewtrace_cli::{build_cli, run};
use viewtrace_core::{init_tracing, init_tracing_with};

fn main() -> Result<ExitCode> {
    let matches = build_cli().get_matches();

    // Initialize logging
    if matches.get_flag("debug") {
        init_tracing_with("viewtrace_core=debug,viewtrace_cli=debug");
    } else {
        init_tracing();
    }

    let mut stdout = io::stdout().lock();
    let code = run(&matches, &mut stdout)?;
    stdout.flush()?;
    Ok(ExitCode::from(code))
}
