//! wasmgate CLI entry point.
//!
//! Loads a module into the same registry the C library uses and either calls
//! one of its exports or lists what it exports.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use wasmgate_common::HostSettings;
use wasmgate_common::settings::SETTINGS_ENV;
use wasmgate_core::{CompiledModule, Registry, Value};

#[derive(Debug, Parser)]
#[command(name = "wasmgate", version, about = "Run exports of WebAssembly modules")]
struct Cli {
    /// Host settings file (TOML).
    #[arg(long, global = true, env = SETTINGS_ENV)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Instantiate a module and call one of its exports.
    Run {
        /// Path to a `.wasm` or `.wat` module.
        module: PathBuf,

        /// Name of the exported function.
        export: String,

        /// Interface qualifying the export, e.g. `wasi:cli/run@0.2.0`.
        #[arg(long)]
        interface: Option<String>,

        /// Fuel budget for this instance.
        #[arg(long)]
        fuel: Option<u64>,

        /// Arguments written as TYPE:VALUE, e.g. `i32:5` or `f64:1.5`.
        #[arg(allow_hyphen_values = true)]
        args: Vec<Value>,
    },

    /// List a module's imports and exports.
    Inspect {
        /// Path to a `.wasm` or `.wat` module.
        module: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let settings = match &cli.config {
        Some(path) => HostSettings::from_file(path)
            .with_context(|| format!("Failed to load settings from '{}'", path.display()))?,
        None => HostSettings::default(),
    };
    let registry = Registry::new(&settings).context("Failed to create engine")?;

    match cli.command {
        Command::Run {
            module,
            export,
            interface,
            fuel,
            args,
        } => run(&registry, &module, interface.as_deref(), &export, fuel, &args),
        Command::Inspect { module } => inspect(&registry, &module),
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,wasmgate=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load(registry: &Registry, path: &Path) -> anyhow::Result<CompiledModule> {
    CompiledModule::from_file(registry.engine().inner(), path)
        .with_context(|| format!("Failed to load module '{}'", path.display()))
}

fn run(
    registry: &Registry,
    path: &Path,
    interface: Option<&str>,
    export: &str,
    fuel: Option<u64>,
    args: &[Value],
) -> anyhow::Result<()> {
    let module = load(registry, path)?;
    let handle = registry
        .create_from_module(&module, fuel)
        .context("Failed to instantiate module")?;

    let results = registry
        .call(handle, interface, export, args)
        .with_context(|| format!("Call to '{export}' failed"));

    let remaining = registry.with_instance(handle, |instance| instance.fuel_remaining())?;
    registry.destroy(handle)?;

    for value in results? {
        println!("{value}");
    }
    if let Some(fuel) = remaining {
        info!(fuel_remaining = fuel, "Call finished");
    }
    Ok(())
}

fn inspect(registry: &Registry, path: &Path) -> anyhow::Result<()> {
    let module = load(registry, path)?;

    println!("hash: {}", module.content_hash());
    for import in module.imports() {
        println!("import {import}");
    }
    for export in module.exports() {
        match export.signature {
            Some(signature) => println!("export {} {}: {signature}", export.kind, export.name),
            None => println!("export {} {}", export.kind, export.name),
        }
    }
    Ok(())
}
