use std::path::{Component, Path, PathBuf};
use std::sync::Once;

use anyhow::Context;
use clap::{Parser, Subcommand};
use smvm_core::{
    BytecodeImage, Vm, VmConfig,
    analysis::{FrequencyReport, dump},
    rt::StdConsole,
};
use tracing::info;


static TRACE_INIT: Once = Once::new();
const DEFAULT_TRACE_FILTER: &str =
    "smvm::vm=debug,smvm::gc=debug,smvm::loader=debug,smvm::config=debug,smvm_core=info,smvm_cli=info";
const FAILURE_EXIT_CODE: i32 = 255;

#[derive(Debug, Parser)]
#[command(name = "smvm", author, version, about = "Stack-machine bytecode interpreter", long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Commands>,

    /// If no subcommand, treat as a bytecode file to execute
    #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
    file: Option<PathBuf>,

    /// VM configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, value_name = "PATH", value_parser = parse_sanitized_path)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load and execute a bytecode file.
    Run {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        /// Print the stringified result after a successful run
        #[arg(long)]
        print: bool,
    },
    /// Print the file header, public symbols and disassembled code.
    Dump {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
    },
    /// Print instruction frequencies, most frequent first.
    Stats {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn sanitize_path(raw: &str) -> anyhow::Result<PathBuf> {
    let p = Path::new(raw);

    for comp in p.components() {
        if matches!(comp, Component::ParentDir) {
            anyhow::bail!("Parent directory components ('..') are not allowed in file paths.");
        }
    }

    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

fn env_toggle_enabled(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return false;
    }
    !(trimmed.eq_ignore_ascii_case("0") || trimmed.eq_ignore_ascii_case("false") || trimmed.eq_ignore_ascii_case("off"))
}

fn filter_expr_from(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("1")
        || trimmed.eq_ignore_ascii_case("true")
        || trimmed.eq_ignore_ascii_case("on")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Install a stderr subscriber when `SMVM_TRACE` is set. A value other than a
/// plain toggle is used as the filter expression.
fn maybe_init_tracing() {
    let raw = match std::env::var("SMVM_TRACE") {
        Ok(value) => value,
        Err(_) => return,
    };

    if !env_toggle_enabled(&raw) {
        return;
    }

    TRACE_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::fmt;

        let filter_expr = filter_expr_from(&raw).or_else(|| std::env::var("RUST_LOG").ok());

        let builder = fmt().with_writer(std::io::stderr);

        let builder = match filter_expr.and_then(|expr| EnvFilter::try_new(expr).ok()) {
            Some(filter) => builder.with_env_filter(filter),
            None => builder.with_env_filter(DEFAULT_TRACE_FILTER),
        };

        let _ = builder.try_init();
    });
}

fn run_file(path: &Path, config: Option<&Path>, print: bool) -> anyhow::Result<()> {
    let config = VmConfig::load(config)?;
    let image = BytecodeImage::load(path)?;
    let mut vm = Vm::new(image, &config)?;
    let mut console = StdConsole::stdio();
    let result = vm.run(&mut console)?;
    info!(target: "smvm::vm", file = %path.display(), steps = vm.steps(), "finished");
    if print {
        println!("{}", vm.stringify(result)?);
    }
    Ok(())
}

fn dump_file(path: &Path) -> anyhow::Result<()> {
    let image = BytecodeImage::load(path)?;
    let listing = dump(&image).with_context(|| format!("failed to disassemble {}", path.display()))?;
    print!("{listing}");
    Ok(())
}

fn stats_file(path: &Path, json: bool) -> anyhow::Result<()> {
    let image = BytecodeImage::load(path)?;
    let report =
        FrequencyReport::analyze(&image).with_context(|| format!("failed to analyze {}", path.display()))?;
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn dispatch(args: CliArgs) -> anyhow::Result<()> {
    let CliArgs { command, file, config } = args;
    match (command, file) {
        (Some(Commands::Run { file, print }), _) => run_file(&file, config.as_deref(), print),
        (Some(Commands::Dump { file }), _) => dump_file(&file),
        (Some(Commands::Stats { file, json }), _) => stats_file(&file, json),
        (None, Some(file)) => run_file(&file, config.as_deref(), false),
        (None, None) => anyhow::bail!("no bytecode file given (see `smvm --help`)"),
    }
}

fn main() {
    maybe_init_tracing();

    if let Err(err) = dispatch(CliArgs::parse()) {
        eprintln!("*** FAILURE: {err:#}");
        std::process::exit(FAILURE_EXIT_CODE);
    }
}
