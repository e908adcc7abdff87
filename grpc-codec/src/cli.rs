//! # CLI
//!
//! This module defines the command-line interface of `grpc-codec` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring call paths are `/Service/Method`);
use clap::{Args, Parser, Subcommand};
use grpc_codec_core::{CallPath, Direction};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grpc-codec", version, about = "Schema-driven gRPC payload transcoder")]
pub struct Cli {
    /// Settings file (JSON). Command-line flags take precedence over it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pack a directory of schema sources into a base64 zip archive
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// grpc-codec pack ./protos -o dictionary.txt
    /// ```
    Pack {
        /// Directory to pack
        dir: PathBuf,

        /// Pack only the files directly inside `dir`, skipping subdirectories
        #[arg(long)]
        flat: bool,

        /// Write the archive to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Unpack a base64 zip archive into a directory
    Unpack {
        /// File holding the archive text
        archive: PathBuf,

        /// Destination directory, created if missing
        dest: PathBuf,
    },

    /// List the services declared by a set of schemas
    Services {
        #[command(flatten)]
        schema: SchemaArgs,

        /// Show the methods of every service
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decode a binary payload into a JSON field tree
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// grpc-codec decode --proto-dir ./protos --call /my.pkg.Service/Method --direction first payload.bin
    /// ```
    Decode {
        #[command(flatten)]
        schema: SchemaArgs,

        #[command(flatten)]
        target: TargetArgs,

        /// Emit fields missing from the payload with their default value
        #[arg(long)]
        include_defaults: bool,

        /// File holding the binary payload
        payload: PathBuf,
    },

    /// Encode a JSON field tree into a binary payload
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// grpc-codec encode --proto-dir ./protos --call /my.pkg.Service/Method --direction first \
    ///     --body '{"name": "value"}' -o payload.bin
    /// ```
    Encode {
        #[command(flatten)]
        schema: SchemaArgs,

        #[command(flatten)]
        target: TargetArgs,

        /// JSON object whose simple values are strings
        #[arg(long, value_parser = parse_body)]
        body: serde_json::Value,

        /// Write the payload to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Where the schemas come from.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct SchemaArgs {
    /// Directory of `.proto` sources, compiled with `protoc`
    #[arg(long)]
    pub proto_dir: Option<PathBuf>,

    /// Precompiled descriptor set (.bin)
    #[arg(long)]
    pub file_descriptor_set: Option<PathBuf>,
}

/// Which schema a payload follows.
#[derive(Args)]
pub struct TargetArgs {
    /// Call path (/package.Service/Method)
    #[arg(long, value_parser = parse_call_path)]
    pub call: CallPath,

    /// `first` for the request, `second` for the response
    #[arg(long, value_parser = parse_direction)]
    pub direction: Direction,
}

fn parse_call_path(value: &str) -> Result<CallPath, String> {
    CallPath::parse(value).map_err(|e| e.to_string())
}

fn parse_direction(value: &str) -> Result<Direction, String> {
    match value.to_ascii_lowercase().as_str() {
        "first" | "request" => Ok(Direction::First),
        "second" | "response" => Ok(Direction::Second),
        _ => Err(format!(
            "Invalid direction: '{value}'. Expected 'first' or 'second'"
        )),
    }
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}
