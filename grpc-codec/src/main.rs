//! # grpc-codec CLI Entry Point
//!
//! The main executable for the codec. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Sets up logging (controlled by `RUST_LOG`), parses command-line
//!    arguments using [`cli::Cli`] and loads the optional settings file.
//! 2. **Schema loading**: Compiles a `.proto` directory or reads a precompiled descriptor set
//!    into a `Registry` from `grpc_codec_core`.
//! 3. **Execution**: Packs, unpacks, lists, decodes or encodes.
//! 4. **Presentation**: Formats and prints the resulting data or error to standard output/error.

mod cli;
mod formatter;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, SchemaArgs, TargetArgs};
use formatter::{FormattedString, ServiceList, UnpackedFiles};
use grpc_codec_core::{
    CodecSettings, Message, MessageDecoder, MessageEncoder, Registry, archive,
    registry::discover_proto_files,
};
use std::{io::Write, path::Path, process};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    if let Err(err) = run(args).await {
        eprintln!("{}", FormattedString::from(err));
        process::exit(1);
    }
}

async fn run(args: Cli) -> anyhow::Result<()> {
    let mut settings = match &args.config {
        Some(path) => CodecSettings::load(path)?,
        None => CodecSettings::default(),
    };

    match args.command {
        Commands::Pack {
            dir,
            flat,
            output,
        } => {
            if flat {
                settings.archive.recursive = false;
            }
            let packed = archive::pack(&dir, &settings.archive)?;
            match output {
                Some(path) => std::fs::write(&path, packed)
                    .with_context(|| format!("Failed to write '{}'", path.display()))?,
                None => println!("{packed}"),
            }
        }
        Commands::Unpack { archive: path, dest } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            let files = archive::unpack(&text, &dest)?;
            println!("{}", FormattedString::from(UnpackedFiles(files)));
        }
        Commands::Services { schema, verbose } => {
            let registry = load_registry(&schema, &settings).await?;
            if verbose {
                for name in registry.services() {
                    let service = registry.lookup(&name)?.descriptor().clone();
                    println!("{}", FormattedString::from(service));
                }
            } else {
                println!("{}", FormattedString::from(ServiceList(registry.services())));
            }
        }
        Commands::Decode {
            schema,
            target,
            include_defaults,
            payload,
        } => {
            settings.decode.include_default_values |= include_defaults;
            let registry = load_registry(&schema, &settings).await?;
            let payload = std::fs::read(&payload)
                .with_context(|| format!("Failed to read '{}'", payload.display()))?;

            let message = decode(registry, &settings, &target, &payload)?;
            println!("{}", FormattedString::from(message));
        }
        Commands::Encode {
            schema,
            target,
            body,
            output,
        } => {
            let registry = load_registry(&schema, &settings).await?;
            let message: Message = serde_json::from_value(body)
                .context("Body must be a JSON object whose simple values are strings")?;

            let payload = MessageEncoder::new(registry).encode(
                &message,
                &target.call.to_string(),
                target.direction,
            )?;

            match output {
                Some(path) => std::fs::write(&path, payload)
                    .with_context(|| format!("Failed to write '{}'", path.display()))?,
                None => std::io::stdout().write_all(&payload)?,
            }
        }
    }

    Ok(())
}

fn decode(
    registry: Registry,
    settings: &CodecSettings,
    target: &TargetArgs,
    payload: &[u8],
) -> anyhow::Result<Message> {
    let decoder = MessageDecoder::new(registry).with_options(settings.decode);
    Ok(decoder.decode(payload, &target.call.to_string(), target.direction)?)
}

async fn load_registry(schema: &SchemaArgs, settings: &CodecSettings) -> anyhow::Result<Registry> {
    match (&schema.proto_dir, &schema.file_descriptor_set) {
        (_, Some(path)) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            Registry::decode(&bytes).context("Failed to parse file descriptor set")
        }
        (Some(dir), None) => compile_dir(dir, settings).await,
        (None, None) => anyhow::bail!("Either --proto-dir or --file-descriptor-set is required"),
    }
}

async fn compile_dir(dir: &Path, settings: &CodecSettings) -> anyhow::Result<Registry> {
    let sources = discover_proto_files(dir)
        .with_context(|| format!("Failed to list schema sources in '{}'", dir.display()))?;
    tracing::debug!(dir = %dir.display(), sources = sources.len(), "compiling schema sources");

    let compiler = settings.protoc.compiler();
    Ok(Registry::build(&compiler, &sources, dir).await?)
}
