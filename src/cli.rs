use crate::config::{BridgeConfig, MapperKind};
use crate::openapi_builder::OpenApiBuilder;
use crate::schema_cache::SchemaCache;
use crate::serializer::{output_path, write_to_file, OutputFormat};
use crate::source::SourceIndex;
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::path::PathBuf;

/// Schema Bridge - dump the validation-model schemas of Rust struct declarations
#[derive(Parser, Debug)]
#[command(name = "schema-bridge")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Rust source file or directory holding the struct declarations
    #[arg(value_name = "PATH")]
    pub source_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Type mapper override
    #[arg(short = 'm', long = "mapper", value_enum)]
    pub mapper: Option<MapperKind>,

    /// Only document these structs (and what they reference); repeatable
    #[arg(short = 's', long = "struct", value_name = "NAME")]
    pub structs: Vec<String>,

    /// Also emit single and paginated response envelope schemas per struct
    #[arg(long = "with-envelopes")]
    pub with_envelopes: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.source_path.exists() {
        bail!("Source path does not exist: {}", args.source_path.display());
    }
    if let Some(config) = &args.config_path {
        if !config.is_file() {
            bail!("Configuration file does not exist: {}", config.display());
        }
    }

    info!("Source path: {}", args.source_path.display());
    info!("Output format: {:?}", args.output_format);
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }

    Ok(args)
}

/// Resolve the effective configuration: file, then environment, then command line
pub fn load_config(args: &CliArgs) -> Result<BridgeConfig> {
    let config = match &args.config_path {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if let Some(mapper) = args.mapper {
        config.mapper = mapper;
    }
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Generate the document text for `args`
pub fn generate(args: &CliArgs) -> Result<String> {
    // Step 1: configuration
    let config = load_config(args)?;

    // Step 2: index struct declarations
    info!("Indexing struct declarations...");
    let index = SourceIndex::from_path(&args.source_path)?;
    for warning in index.warnings() {
        warn!("{}", warning);
    }
    info!(
        "Found {} structs and {} enums",
        index.structs().len(),
        index.enums().len()
    );
    if index.structs().is_empty() {
        bail!("No structs with named fields found in {}", args.source_path.display());
    }

    // Step 3: pick the structs to document
    let selected = if args.structs.is_empty() {
        index.structs().to_vec()
    } else {
        args.structs
            .iter()
            .map(|name| {
                index
                    .struct_type(name)
                    .cloned()
                    .with_context(|| format!("Struct {} was not found in the source", name))
            })
            .collect::<Result<Vec<_>>>()?
    };
    info!("Documenting {} structs", selected.len());

    // Step 4: convert and assemble
    let cache = SchemaCache::with_config(config);
    let mut builder = OpenApiBuilder::new();
    for struct_type in &selected {
        let model = cache
            .model_for(struct_type)
            .with_context(|| format!("Failed to document struct {}", struct_type.name()))?;
        builder.add_model(&model);
        if args.with_envelopes {
            builder.add_envelopes(&model);
        }
    }
    info!("Generated {} models ({} schemas)", cache.len(), builder.schema_count());

    // Step 5: serialize
    let document = builder.build();
    args.output_format.serialize(&document)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting schema generation...");
    let content = generate(&args)?;

    if let Some(requested) = &args.output_path {
        let path = output_path(requested, args.output_format);
        info!("Writing output to: {}", path.display());
        write_to_file(&content, &path)?;
    } else {
        println!("{}", content);
    }

    info!("Generation complete!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    fn args_for(path: PathBuf) -> CliArgs {
        CliArgs::parse_from(["schema-bridge", path.to_str().unwrap(), "-f", "json", "-m", "standard"])
    }

    #[test]
    fn test_cli_defaults() {
        let args = CliArgs::parse_from(["schema-bridge", "src"]);
        assert_eq!(args.output_format, OutputFormat::Yaml);
        assert!(args.output_path.is_none());
        assert!(args.mapper.is_none());
        assert!(args.structs.is_empty());
        assert!(!args.with_envelopes);
    }

    #[test]
    fn test_cli_repeated_struct_filter() {
        let args = CliArgs::parse_from(["schema-bridge", "src", "-s", "User", "--struct", "Order", "--with-envelopes"]);
        assert_eq!(args.structs, vec!["User".to_string(), "Order".to_string()]);
        assert!(args.with_envelopes);
    }

    #[test]
    fn test_missing_source_path() {
        let args = args_for(PathBuf::from("/nonexistent/models"));
        assert!(parse_args_from_parsed(args).is_err());
    }

    #[test]
    fn test_generate_json() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("models.rs"),
            r#"
            #[serde(rename_all = "camelCase")]
            pub struct User { pub id: u64, pub full_name: Option<String> }
            "#,
        )
        .unwrap();

        let output = generate(&args_for(temp_dir.path().to_path_buf())).unwrap();
        let doc: Value = serde_json::from_str(&output).unwrap();
        let user = &doc["components"]["schemas"]["UserSchema"];
        assert_eq!(user["required"], serde_json::json!(["id"]));
        assert!(user["properties"]["fullName"].is_object());
    }

    #[test]
    fn test_run_writes_with_format_extension() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("models.rs"), "pub struct User { pub id: u64 }").unwrap();

        let mut args = args_for(temp_dir.path().join("models.rs"));
        args.output_path = Some(temp_dir.path().join("out/schemas"));
        run(args).unwrap();

        let written = fs::read_to_string(temp_dir.path().join("out/schemas.json")).unwrap();
        let doc: Value = serde_json::from_str(&written).unwrap();
        assert!(doc["components"]["schemas"]["UserSchema"].is_object());
    }

    #[test]
    fn test_unknown_struct_filter() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("models.rs"), "pub struct User { pub id: u64 }").unwrap();

        let mut args = args_for(temp_dir.path().to_path_buf());
        args.structs = vec!["Order".to_string()];
        let err = generate(&args).unwrap_err();
        assert!(err.to_string().contains("Order"));
    }

    #[test]
    fn test_no_structs() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("lib.rs"), "pub fn noop() {}").unwrap();

        assert!(generate(&args_for(temp_dir.path().to_path_buf())).is_err());
    }
}
