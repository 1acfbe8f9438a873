//! Schema Bridge - command-line schema dump.
//!
//! Reads Rust struct declarations, converts each through the schema cache and prints an
//! OpenAPI 3.0 document whose `components.schemas` holds every generated model.
//!
//! # Usage
//!
//! ```bash
//! schema-bridge [OPTIONS] <PATH>
//! ```
//!
//! # Examples
//!
//! ```bash
//! schema-bridge ./src/models -o schemas.yaml
//! schema-bridge ./src/models -f json -s User --with-envelopes
//! SCHEMA_BRIDGE_MAPPER=standard schema-bridge ./src/models -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use struct_schema_bridge::cli;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Schema Bridge starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    Ok(())
}
