//! colgm code generator CLI

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use colgm::config::CONFIG_FILE_NAME;
use colgm::error::report_error;
use colgm::sir::verify::verify_module;
use colgm::{CodegenConfig, CompileError, MirInput};

#[derive(Parser)]
#[command(name = "colgm", version, about = "colgm - MIR lowering and IR emission")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Lower a MIR file and write textual IR
    Emit {
        /// MIR input (JSON)
        file: PathBuf,
        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Config file, defaults to colgm.toml next to the input
        #[arg(long)]
        config: Option<PathBuf>,
        /// Target triple
        #[arg(long)]
        target: Option<String>,
        /// Omit debug metadata
        #[arg(long)]
        no_debug_info: bool,
        /// Check every lowered function before printing
        #[arg(long)]
        verify: bool,
    },
    /// Lower and verify a MIR file without writing IR
    Check {
        /// MIR input (JSON)
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Command::Emit {
            file,
            output,
            config,
            target,
            no_debug_info,
            verify,
        } => {
            let overrides = Overrides {
                target,
                no_debug_info,
                verify,
            };
            emit_file(&file, output.as_deref(), config.as_deref(), overrides)
        }
        Command::Check { file } => check_file(&file),
    };

    if let Err((filename, e)) = result {
        for error in e.into_errors() {
            let file = if error.file().is_empty() {
                filename.clone()
            } else {
                error.file().to_string()
            };
            let source = std::fs::read_to_string(&file).ok();
            report_error(&file, source.as_deref(), &error);
        }
        std::process::exit(1);
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let formatter = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(formatter)
        .init();
}

/// CLI flags layered over the config file
struct Overrides {
    target: Option<String>,
    no_debug_info: bool,
    verify: bool,
}

type CliResult = Result<(), (String, CompileError)>;

fn load_input(path: &Path) -> Result<MirInput, CompileError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CompileError::io_error(format!("cannot read {}: {e}", path.display())))?;
    MirInput::from_json(&text)
}

fn load_config(input: &Path, explicit: Option<&Path>) -> Result<CodegenConfig, CompileError> {
    if let Some(path) = explicit {
        return CodegenConfig::load(path);
    }
    let beside = input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(CONFIG_FILE_NAME);
    if beside.is_file() {
        CodegenConfig::load(&beside)
    } else {
        Ok(CodegenConfig::default())
    }
}

fn emit_file(
    path: &Path,
    output: Option<&Path>,
    config_path: Option<&Path>,
    overrides: Overrides,
) -> CliResult {
    let filename = path.display().to_string();
    let run = || -> Result<(), CompileError> {
        let input = load_input(path)?;
        let mut config = load_config(path, config_path)?;
        if let Some(target) = overrides.target {
            config.target_triple = Some(target);
        }
        if overrides.no_debug_info {
            config.debug_info = false;
        }
        if overrides.verify {
            config.verify = true;
        }

        let text = colgm::emit_ir(&input, &config)?;
        match output {
            Some(out) => {
                std::fs::write(out, &text).map_err(|e| {
                    CompileError::io_error(format!("cannot write {}: {e}", out.display()))
                })?;
                info!(output = %out.display(), bytes = text.len(), "wrote module");
            }
            None => print!("{text}"),
        }
        Ok(())
    };
    run().map_err(|e| (filename, e))
}

fn check_file(path: &Path) -> CliResult {
    let filename = path.display().to_string();
    let run = || -> Result<(), CompileError> {
        let input = load_input(path)?;
        let config = load_config(path, None)?;
        let module = colgm::lower_program(&input.context, &input.symbols, &config)?;

        let problems = verify_module(&module);
        if !problems.is_empty() {
            let errors = problems
                .into_iter()
                .map(|p| CompileError::internal(p.to_string(), colgm::Span::default()))
                .collect();
            return Err(CompileError::Lowering { errors });
        }

        let blocks: usize = module.func_impls.iter().map(|f| f.blocks.len()).sum();
        println!(
            "✓ {filename}: {} functions, {} declarations, {blocks} blocks",
            module.func_impls.len(),
            module.func_decls.len(),
        );
        Ok(())
    };
    run().map_err(|e| (filename.clone(), e))
}
