//! Design import and per-design file templating.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{DesignFile, FlowContext};
use crate::error::FlowError;

/// Design shipped with every PDK whose files serve as templates.
pub const REFERENCE_DESIGN: &str = "gcd";

/// `DESIGN_CONFIG` line of the stock Makefile template.
pub const MAKEFILE_DEFAULT_CONFIG: &str = "DESIGN_CONFIG ?= ./designs/nangate45/gcd/config.mk";

impl FlowContext {
    /// PDK directories under `designs/`, sorted, without the shared `src`.
    pub fn list_pdks(&self) -> Result<Vec<String>, FlowError> {
        let designs = self.designs_dir();
        let entries = fs::read_dir(&designs).map_err(|e| FlowError::io(&designs, e))?;

        let mut pdks = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FlowError::io(&designs, e))?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && name != "src" {
                pdks.push(name);
            }
        }
        pdks.sort();
        Ok(pdks)
    }

    /// Imports the RTL in `source` as a new design for the selected PDK.
    ///
    /// Copies the folder to `designs/src/<name>`, creates
    /// `designs/<pdk>/<name>` and concatenates every `.v` file into
    /// `designs/src/<name>/<name>.v`. On success the design becomes the
    /// current selection; resetting its config and constraints is left to
    /// the caller.
    pub fn import_design(&mut self, source: &Path) -> Result<ImportedDesign, FlowError> {
        if !source.is_dir() {
            return Err(FlowError::NotADirectory(source.to_path_buf()));
        }
        let pdk = match self.pdk.as_deref() {
            Some(pdk) if !pdk.is_empty() => pdk.to_string(),
            _ => return Err(FlowError::NoSelection),
        };
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| FlowError::NotADirectory(source.to_path_buf()))?;

        let src_dir = self.design_src_dir(&name);
        let pdk_dir = self.designs_dir().join(&pdk).join(&name);

        let source_real = source.canonicalize().map_err(|e| FlowError::io(source, e))?;
        if resolve_existing(&src_dir).starts_with(&source_real) {
            return Err(FlowError::OverlappingImport {
                dir: source.to_path_buf(),
                destination: src_dir,
            });
        }

        copy_dir_all(source, &src_dir)?;
        fs::create_dir_all(&pdk_dir).map_err(|e| FlowError::io(&pdk_dir, e))?;

        let combined = src_dir.join(format!("{name}.v"));
        let file_count = combine_verilog_files(source, &combined)?;

        info!(design = %name, %pdk, file_count, "Design imported");
        self.design = Some(name.clone());

        Ok(ImportedDesign {
            name,
            src_dir,
            pdk_dir,
            combined,
            file_count,
        })
    }

    /// Rewrites the selected design's `file` from the reference design,
    /// substituting the design name for the reference name.
    pub fn reset_design_file(&self, file: DesignFile) -> Result<PathBuf, FlowError> {
        let pdk = match self.pdk.as_deref() {
            Some(pdk) if !pdk.is_empty() => pdk,
            _ => return Err(FlowError::NoSelection),
        };
        let reference = self.reference_file(pdk, file);
        if !reference.is_file() {
            return Err(FlowError::MissingReference(reference));
        }
        let (design_dir, design) = match (self.design_dir(), self.design.as_deref()) {
            (Some(dir), Some(design)) => (dir, design),
            _ => return Err(FlowError::NoSelection),
        };

        let template = fs::read_to_string(&reference).map_err(|e| FlowError::io(&reference, e))?;
        let target = design_dir.join(file.file_name());
        write_file(&target, &template.replace(REFERENCE_DESIGN, design))?;

        debug!(target = %target.display(), "Reset {} from reference", file.file_name());
        Ok(target)
    }

    /// Writes `<flow>/Makefile` from `template`, pointing its default
    /// `DESIGN_CONFIG` at the selected design.
    pub fn set_makefile(&self, template: &Path) -> Result<PathBuf, FlowError> {
        let config = self.design_config().ok_or(FlowError::NoSelection)?;

        let content = fs::read_to_string(template).map_err(|e| FlowError::io(template, e))?;
        let content =
            content.replace(MAKEFILE_DEFAULT_CONFIG, &format!("DESIGN_CONFIG ?= {config}"));

        let makefile = self.flow_path().join("Makefile");
        write_file(&makefile, &content)?;
        info!(makefile = %makefile.display(), %config, "Makefile updated");
        Ok(makefile)
    }

    pub fn read_design_file(&self, file: DesignFile) -> Result<String, FlowError> {
        let path = self
            .design_dir()
            .ok_or(FlowError::NoSelection)?
            .join(file.file_name());
        fs::read_to_string(&path).map_err(|e| FlowError::io(&path, e))
    }

    pub fn write_design_file(&self, file: DesignFile, content: &str) -> Result<PathBuf, FlowError> {
        let path = self
            .design_dir()
            .ok_or(FlowError::NoSelection)?
            .join(file.file_name());
        write_file(&path, content)?;
        Ok(path)
    }
}

/// Result of [`FlowContext::import_design`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedDesign {
    pub name: String,
    pub src_dir: PathBuf,
    pub pdk_dir: PathBuf,
    pub combined: PathBuf,
    pub file_count: usize,
}

/// Concatenates the `.v` files of `input_dir` into `output`.
///
/// Files are ordered by lowercased name and each one is preceded by a
/// `// --- Start of <name> ---` marker. Returns the number of files.
pub fn combine_verilog_files(input_dir: &Path, output: &Path) -> Result<usize, FlowError> {
    if !input_dir.is_dir() {
        return Err(FlowError::NotADirectory(input_dir.to_path_buf()));
    }

    let entries = fs::read_dir(input_dir).map_err(|e| FlowError::io(input_dir, e))?;
    let mut sources: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FlowError::io(input_dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".v") && entry.path().is_file() {
            sources.push((name, entry.path()));
        }
    }
    if sources.is_empty() {
        return Err(FlowError::NoVerilogSources(input_dir.to_path_buf()));
    }
    sources.sort_by_key(|(name, _)| name.to_lowercase());

    let mut out = fs::File::create(output).map_err(|e| FlowError::io(output, e))?;
    for (name, path) in &sources {
        let body = fs::read_to_string(path).map_err(|e| FlowError::io(path, e))?;
        write!(out, "// --- Start of {name} ---\n{body}").map_err(|e| FlowError::io(output, e))?;
    }

    Ok(sources.len())
}

fn write_file(path: &Path, content: &str) -> Result<(), FlowError> {
    fs::write(path, content).map_err(|e| FlowError::io(path, e))
}

/// Canonicalizes the longest existing prefix of `path` and appends the rest.
fn resolve_existing(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if let Ok(real) = current.canonicalize() {
            return missing.iter().rev().fold(real, |acc, part| acc.join(part));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn copy_dir_all(from: &Path, to: &Path) -> Result<(), FlowError> {
    fs::create_dir_all(to).map_err(|e| FlowError::io(to, e))?;
    for entry in fs::read_dir(from).map_err(|e| FlowError::io(from, e))? {
        let entry = entry.map_err(|e| FlowError::io(from, e))?;
        let src = entry.path();
        let dst = to.join(entry.file_name());
        if src.is_dir() {
            copy_dir_all(&src, &dst)?;
        } else {
            fs::copy(&src, &dst).map_err(|e| FlowError::io(&src, e))?;
        }
    }
    Ok(())
}
