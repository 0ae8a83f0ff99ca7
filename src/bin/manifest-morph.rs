//! Manifest Morph CLI
//!
//! Command-line interface for deriving types from schema documents and
//! transcoding payloads through them.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use manifest_morph::{
    decode, encode, load_document, Foundry, FoundryOptions, GroupVersionKind, HintMap, Type,
    DEFAULT_MAX_DEPTH,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "manifest-morph")]
#[command(about = "Derive types from OpenAPI schemas and transcode manifests")]
#[command(version)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the type and hints of a definition
    Derive {
        /// Schema document (Swagger 2 or OpenAPI 3 JSON)
        document: PathBuf,

        #[command(flatten)]
        target: Target,

        /// Recursion depth budget
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Decode a payload against a definition and encode it back
    Transcode {
        /// Schema document (Swagger 2 or OpenAPI 3 JSON)
        document: PathBuf,

        /// Payload file (JSON)
        payload: PathBuf,

        #[command(flatten)]
        target: Target,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Definition id (e.g. io.k8s.api.core.v1.ConfigMap)
    #[arg(long)]
    definition: Option<String>,

    /// Resource kind as [group/]version/kind (e.g. apps/v1/Deployment)
    #[arg(long)]
    gvk: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result = match cli.command {
        Commands::Derive {
            document,
            target,
            max_depth,
            pretty,
        } => run_derive(&document, &target, max_depth, pretty),

        Commands::Transcode {
            document,
            payload,
            target,
            pretty,
        } => run_transcode(&document, &payload, &target, pretty),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_derive(document: &Path, target: &Target, max_depth: usize, pretty: bool) -> Result<(), u8> {
    let foundry = load_foundry(document, FoundryOptions::new().max_depth(max_depth))?;
    let (ty, hints) = derive_target(&foundry, target)?;

    let output = json!({ "type": ty, "hints": hints });
    print_json(&output, pretty)
}

fn run_transcode(document: &Path, payload: &Path, target: &Target, pretty: bool) -> Result<(), u8> {
    let foundry = load_foundry(document, FoundryOptions::new())?;
    let (ty, hints) = derive_target(&foundry, target)?;

    let payload = load_document(payload).map_err(|e| {
        eprintln!("Error loading payload: {}", e);
        e.exit_code() as u8
    })?;

    let output = transcode(&payload, &ty, &hints)?;
    print_json(&output, pretty)
}

fn transcode(payload: &Value, ty: &Type, hints: &HintMap) -> Result<Value, u8> {
    let value = decode(payload, ty, hints).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    encode(&value, hints).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn load_foundry(document: &Path, options: FoundryOptions) -> Result<Foundry, u8> {
    let document = load_document(document).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    Ok(Foundry::with_options(document, options))
}

fn derive_target(foundry: &Foundry, target: &Target) -> Result<(Type, HintMap), u8> {
    let derived = match (&target.definition, &target.gvk) {
        (Some(id), _) => foundry.derive_definition(id),
        (None, Some(gvk)) => gvk
            .parse::<GroupVersionKind>()
            .and_then(|gvk| foundry.type_for_gvk(&gvk)),
        (None, None) => {
            eprintln!("Error: one of --definition or --gvk is required");
            return Err(2);
        }
    };
    derived.map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn print_json(value: &Value, pretty: bool) -> Result<(), u8> {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", output);
    Ok(())
}
