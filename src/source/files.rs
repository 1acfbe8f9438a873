use anyhow::{bail, Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A Rust source file together with its syntax tree
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub syntax: syn::File,
}

/// Files found below a root, plus the paths that could not be visited
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Collect the `.rs` files at `root`.
///
/// `root` may be a single file. Directories are walked recursively, skipping `target`
/// and hidden directories; entries that cannot be read become warnings.
pub fn discover(root: &Path) -> Result<Discovery> {
    if !root.exists() {
        bail!("Source path does not exist: {}", root.display());
    }
    if root.is_file() {
        return Ok(Discovery {
            files: vec![root.to_path_buf()],
            warnings: Vec::new(),
        });
    }

    let mut discovery = Discovery::default();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || {
                let name = entry.file_name().to_string_lossy();
                !name.starts_with('.') && name != "target"
            }
        });

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if entry.path().extension().is_some_and(|ext| ext == "rs") {
                    discovery.files.push(entry.into_path());
                }
            }
            Ok(_) => {}
            Err(e) => {
                let warning = format!("Failed to access path: {}", e);
                warn!("{}", warning);
                discovery.warnings.push(warning);
            }
        }
    }

    debug!("Discovered {} Rust files under {}", discovery.files.len(), root.display());
    Ok(discovery)
}

/// Read and parse one file
pub fn parse_file(path: &Path) -> Result<SourceFile> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let syntax = syn::parse_file(&content)
        .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;

    Ok(SourceFile {
        path: path.to_path_buf(),
        syntax,
    })
}

/// Parse every path, keeping the files that parse and reporting the rest as warnings
pub fn parse_all(paths: &[PathBuf]) -> (Vec<SourceFile>, Vec<String>) {
    let mut parsed = Vec::with_capacity(paths.len());
    let mut warnings = Vec::new();

    for path in paths {
        match parse_file(path) {
            Ok(file) => parsed.push(file),
            Err(e) => {
                let warning = format!("{:#}", e);
                warn!("Skipping {}: {}", path.display(), warning);
                warnings.push(warning);
            }
        }
    }

    debug!("Parsed {} of {} files", parsed.len(), paths.len());
    (parsed, warnings)
}
