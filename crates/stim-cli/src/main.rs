use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use stim_core::config::StimConfig;
use stim_core::install::{self, InstallTarget};
use stim_core::{parser, StimError};

#[derive(Parser)]
#[command(name = "stim", version, about = "Compile stim command files into assistant slash commands")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for installed commands (default: ~/.claude/commands)
    #[arg(long, global = true, env = "STIM_COMMANDS_DIR")]
    commands_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a command file and install it as <name>.md
    Compile {
        /// Path to the command file
        file: PathBuf,
        /// Print the compiled markdown instead of writing it
        #[arg(long)]
        stdout: bool,
        /// Write <name>.md into this directory
        #[arg(short, long, conflicts_with = "stdout")]
        output: Option<PathBuf>,
    },
    /// Compile and install one or more command files
    Install {
        /// Paths to the command files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Install into ./.claude/commands instead of the global directory
        #[arg(long)]
        local: bool,
    },
    /// Print the parsed, unresolved command tree as JSON
    Parse {
        /// Path to the command file
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), StimError> {
    let config = StimConfig::load();
    debug!(?config, "loaded config");

    match cli.command {
        Command::Compile { file, stdout, output } => {
            if stdout {
                let compiled = compile_checked(&file, &config)?;
                println!("{}", compiled.markdown);
                return Ok(());
            }
            let target = match output {
                Some(dir) => InstallTarget::dir(dir),
                None => global_target(cli.commands_dir, &config)?,
            };
            install_one(&file, &target, &config)
        }
        Command::Install { files, local } => {
            let target = if local {
                InstallTarget::local(std::env::current_dir()?)
            } else {
                global_target(cli.commands_dir, &config)?
            };
            for file in &files {
                install_one(file, &target, &config)?;
            }
            Ok(())
        }
        Command::Parse { file } => {
            install::check_extension(&file, config.extension())?;
            let source = std::fs::read_to_string(&file)?;
            let command = parser::parse(&source)?;
            println!("{}", serde_json::to_string_pretty(&command)?);
            Ok(())
        }
    }
}

/// Flag or env first, then the config file, then `~/.claude/commands`.
fn global_target(commands_dir: Option<PathBuf>, config: &StimConfig) -> Result<InstallTarget, StimError> {
    match commands_dir.or_else(|| config.commands_dir.clone()) {
        Some(dir) => Ok(InstallTarget::dir(dir)),
        None => InstallTarget::global(),
    }
}

fn compile_checked(file: &Path, config: &StimConfig) -> Result<install::CompiledCommand, StimError> {
    install::check_extension(file, config.extension())?;
    install::compile_file(file)
}

fn install_one(file: &Path, target: &InstallTarget, config: &StimConfig) -> Result<(), StimError> {
    let compiled = compile_checked(file, config)?;
    let installed = install::write_command(&compiled, target)?;

    let source_name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    println!("Compiled {} -> {}", source_name, installed.path.display());
    println!("Command: /{}", installed.name);
    Ok(())
}
