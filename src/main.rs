use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{debug, LevelFilter};

use classrun::jvm::{read_class_file, JVMParser};
use classrun::native::{HostStreams, NativeBridge};
use classrun::program::{Program, ENTRY_POINT};
use classrun::runtime::{Runtime, RuntimeConfig};
use classrun::trace;

#[derive(Parser)]
#[command(name = "classrun")]
#[command(version)]
#[command(about = "Run a compiled Java class on a minimal bytecode interpreter", long_about = None)]
struct Cli {
    /// Compiled `.class` file to run
    path: PathBuf,

    /// Method to invoke [default: main]
    #[arg(short, long)]
    method: Option<String>,

    /// Log diagnostics to stderr (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log the parsed class file before running it
    #[arg(long)]
    dump: bool,
}

fn init_logging(cli: &Cli) {
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if cli.dump {
        builder.filter_module("classrun::trace", LevelFilter::Debug);
    }
    builder.parse_default_env().init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let bytes = read_class_file(&cli.path)
        .with_context(|| format!("failed to read {}", cli.path.display()))?;
    let class_file = JVMParser::parse(&bytes)
        .with_context(|| format!("failed to parse {}", cli.path.display()))?;
    if cli.dump || cli.verbose > 0 {
        trace::log_class_file(&class_file);
    }

    let program = Program::new(&class_file)?;
    let bridge = NativeBridge::with_standard_bindings()?;
    let runtime = Runtime::new(program, bridge).context("failed to link native bindings")?;
    let method = cli.method.as_deref().unwrap_or(ENTRY_POINT);
    debug!("running {method}");

    let stdout = io::stdout();
    let stderr = io::stderr();
    let (mut out, mut err) = (stdout.lock(), stderr.lock());
    let mut host = HostStreams::new(&mut out, &mut err);
    let config = RuntimeConfig {
        entry_point: cli.method.clone(),
    };
    runtime
        .run(&config, &mut host)
        .with_context(|| format!("{method} failed"))?;
    drop(host);
    out.flush()?;
    err.flush()?;
    Ok(())
}
