//! phprt CLI

use clap::{Parser, Subcommand};
use phprt::config::{Config, Mode};
use phprt::error::{LoadError, report_fatal};
use phprt::interp::{Interpreter, Output, Request};
use phprt::Program;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "phprt", version, about = "phprt - PHP-compatible script runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script from its JSON-encoded AST
    Run {
        /// AST file produced by the parser
        file: PathBuf,
        /// TOML file with runtime options
        #[arg(long)]
        config: Option<PathBuf>,
        /// Start from the production profile (errors hidden)
        #[arg(long)]
        prod: bool,
        /// Arguments passed to the script as $argv
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Decode an AST file and dump it back as JSON (debug)
    Dump {
        /// AST file to decode
        file: PathBuf,
    },
}

fn main() {
    install_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            file,
            config,
            prod,
            args,
        } => run_file(&file, config.as_deref(), prod, &args),
        Command::Dump { file } => dump_file(&file).map(|()| 0),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr so script output on stdout stays clean
fn install_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_program(path: &Path) -> Result<Program, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    let program: Program = serde_json::from_str(&text).map_err(LoadError::ast)?;
    tracing::debug!(path = %path.display(), statements = program.stmts.len(), "program loaded");
    Ok(program)
}

fn load_config(path: Option<&Path>, prod: bool) -> Result<Config, LoadError> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if prod {
        let base = Config::for_mode(Mode::Prod);
        config.mode = Mode::Prod;
        config.error_reporting = base.error_reporting;
        config.display_errors = base.display_errors;
    }
    Ok(config)
}

fn run_file(
    path: &Path,
    config_path: Option<&Path>,
    prod: bool,
    args: &[String],
) -> Result<i32, Box<dyn std::error::Error>> {
    let mut program = load_program(path)?;
    let config = load_config(config_path, prod)?;
    if program.file.is_empty() {
        program.file = path.display().to_string();
    }

    let request = Request::cli(&program.file, args);
    let mut interp = Interpreter::new(config, &request)
        .with_output(Output::streaming(Box::new(std::io::stdout())));
    let outcome = interp.run(&program);

    // the diagnostic already went to the output; point at the source when it is on disk
    if let Some(error) = &outcome.error {
        if let Ok(source) = std::fs::read_to_string(&program.file) {
            report_fatal(&program.file, &source, error);
        }
    }
    Ok(i32::try_from(outcome.exit_code).unwrap_or(255))
}

fn dump_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let program = load_program(path)?;
    println!("{}", serde_json::to_string_pretty(&program)?);
    Ok(())
}
