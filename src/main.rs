use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use whiteboard_warp::{logging, run, Cli, RectifyError};

fn main() -> ExitCode {
    if std::env::args_os().len() <= 1 {
        eprintln!("{}", Cli::command().render_help());
        return ExitCode::from(RectifyError::NoArguments.exit_code());
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version land here too and are not failures.
            let code = if err.use_stderr() {
                RectifyError::InvalidArgument(err.to_string()).exit_code()
            } else {
                0
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    logging::init(cli.verbose);

    println!("Input {}", cli.input.display());
    println!("Output {}", cli.output.display());
    println!("Vertical resolution {}", cli.vertical);
    println!("Horizontal resolution {}", cli.horizontal);

    match rectify(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let known = err.downcast_ref::<RectifyError>();
            if known.map_or(true, |e| !e.is_silent()) {
                eprintln!("Error: {err:#}");
            } else {
                log::debug!("{err:#}");
            }
            ExitCode::from(known.map_or(1, RectifyError::exit_code))
        }
    }
}

fn rectify(cli: &Cli) -> Result<()> {
    let options = cli.options().context("Failed to load detector parameters")?;
    let rectified = run(&options)
        .with_context(|| format!("Failed to rectify {:?}", cli.input))?;
    log::info!(
        "marker centers {:?}",
        rectified
            .correspondence
            .src
            .iter()
            .map(|p| (p.x, p.y))
            .collect::<Vec<_>>()
    );
    Ok(())
}
