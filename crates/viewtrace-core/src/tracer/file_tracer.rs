/*!
# FileTracer - File-based Expansion

Reads serialized source files (the JSON form of [`SourceFile`]), expands them with a
[`ViewTracer`] and writes, per input, the instrumented source (`<stem>.view`) and the
emitted metadata (`<stem>.metadata.json`).
*/

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

use crate::ast::{SourceFile, ToSource};
use crate::instrument::ViewMetadata;

use super::view_tracer::{Diagnostic, ViewTracer};

/// File-based expansion driver
pub struct FileTracer {
    tracer: ViewTracer,
    source_extensions: Vec<String>,
    output_extension: String,
    preserve_structure: bool,
}

impl FileTracer {
    pub fn new(tracer: ViewTracer) -> Self {
        Self {
            tracer,
            source_extensions: vec!["json".to_string()],
            output_extension: "view".to_string(),
            preserve_structure: true,
        }
    }

    /// Set the file extensions to process
    pub fn source_extensions(mut self, extensions: Vec<String>) -> Self {
        self.source_extensions = extensions;
        self
    }

    /// Set the extension of the instrumented source output
    pub fn output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = extension.into();
        self
    }

    /// Whether to preserve directory structure in output
    pub fn preserve_structure(mut self, preserve: bool) -> Self {
        self.preserve_structure = preserve;
        self
    }

    pub fn tracer(&self) -> &ViewTracer {
        &self.tracer
    }

    /// Load a serialized source file
    pub fn load(path: &Path) -> Result<SourceFile> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut file: SourceFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse source file {}", path.display()))?;
        if file.path.is_empty() {
            file.path = path.to_string_lossy().to_string();
        }
        Ok(file)
    }

    /// Expand a single file or every matching file under a directory
    pub fn transform_path<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input: P,
        output_dir: Q,
    ) -> Result<FileExpansionSummary> {
        let input = input.as_ref();
        let output_dir = output_dir.as_ref();

        if input.is_dir() {
            self.transform_directory(input, output_dir)
        } else {
            let output = self.output_name(input, output_dir)?;
            self.transform_file(input, output)
        }
    }

    /// Expand all files in a directory
    pub fn transform_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        source_dir: P,
        output_dir: Q,
    ) -> Result<FileExpansionSummary> {
        let source_path = source_dir.as_ref();
        let output_path = output_dir.as_ref();

        if !source_path.exists() {
            return Err(anyhow!(
                "Source directory does not exist: {}",
                source_path.display()
            ));
        }

        let mut summary = FileExpansionSummary::new();
        let mut claimed = HashMap::new();
        self.transform_directory_recursive(
            source_path,
            output_path,
            source_path,
            &mut claimed,
            &mut summary,
        )?;

        info!(
            files = summary.files_processed,
            expanded = summary.declarations_expanded,
            errors = summary.errors.len(),
            "directory expansion finished"
        );
        Ok(summary)
    }

    /// Expand a single file; `output_file` receives the instrumented source and the
    /// metadata is written next to it
    pub fn transform_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        source_file: P,
        output_file: Q,
    ) -> Result<FileExpansionSummary> {
        let source_path = source_file.as_ref();
        let output_path = output_file.as_ref();

        let mut file = Self::load(source_path)?;
        let expansion = self.tracer.expand_file(&mut file);

        let mut summary = FileExpansionSummary::new();
        summary.files_processed += 1;
        summary.declarations_expanded += expansion.declarations_expanded;

        if self.tracer.is_dry_run() {
            debug!(file = %source_path.display(), "dry run, nothing written");
        } else {
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(output_path, file.to_source())
                .with_context(|| format!("Failed to write {}", output_path.display()))?;

            let metadata_path = metadata_path_for(output_path);
            let metadata = serde_json::to_string_pretty(&expansion.metadata)?;
            fs::write(&metadata_path, metadata)
                .with_context(|| format!("Failed to write {}", metadata_path.display()))?;

            summary.files_written += 1;
            summary.outputs.push(output_path.to_path_buf());
        }

        summary.metadata.extend(expansion.metadata);
        summary.diagnostics.extend(expansion.diagnostics);
        Ok(summary)
    }

    fn transform_directory_recursive(
        &mut self,
        current_dir: &Path,
        output_dir: &Path,
        source_root: &Path,
        claimed: &mut HashMap<PathBuf, PathBuf>,
        summary: &mut FileExpansionSummary,
    ) -> Result<()> {
        let mut entries = fs::read_dir(current_dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        // Stable output order regardless of directory iteration order
        entries.sort();

        for path in entries {
            if path.is_dir() {
                self.transform_directory_recursive(&path, output_dir, source_root, claimed, summary)?;
            } else if self.should_process_file(&path) {
                let output_file = self.output_path_for(&path, output_dir, source_root)?;
                if let Some(first) = claimed.get(&output_file) {
                    summary.files_processed += 1;
                    summary.errors.push(format!(
                        "Output collision: {} and {} both map to {}",
                        first.display(),
                        path.display(),
                        output_file.display()
                    ));
                    continue;
                }
                claimed.insert(output_file.clone(), path.clone());
                match self.transform_file(&path, &output_file) {
                    Ok(file_summary) => summary.merge(file_summary),
                    Err(e) => {
                        summary.files_processed += 1;
                        summary
                            .errors
                            .push(format!("Error processing {}: {e:#}", path.display()));
                    }
                }
            }
        }

        Ok(())
    }

    fn output_path_for(&self, path: &Path, output_dir: &Path, source_root: &Path) -> Result<PathBuf> {
        if !self.preserve_structure {
            return self.output_name(path, output_dir);
        }
        let relative = path.strip_prefix(source_root)?;
        let parent = relative.parent().unwrap_or_else(|| Path::new(""));
        self.output_name(relative, &output_dir.join(parent))
    }

    /// `<dir>/<stem>.<output extension>`, keeping every dot of a dotted stem
    fn output_name(&self, path: &Path, dir: &Path) -> Result<PathBuf> {
        let stem = path
            .file_stem()
            .ok_or_else(|| anyhow!("Input has no file name: {}", path.display()))?;
        Ok(dir.join(format!("{}.{}", stem.to_string_lossy(), self.output_extension)))
    }

    /// Check if a file should be processed based on its extension
    fn should_process_file(&self, path: &Path) -> bool {
        let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        // Our own metadata output must not be picked up as input on a re-run
        if file_name.ends_with(".metadata.json") {
            return false;
        }
        match path.extension() {
            Some(extension) => {
                let ext_str = extension.to_string_lossy().to_lowercase();
                self.source_extensions
                    .iter()
                    .any(|ext| ext.to_lowercase() == ext_str)
            }
            None => false,
        }
    }
}

/// `<dir>/<stem>.metadata.json` for an output file `<dir>/<stem>.<ext>`
pub fn metadata_path_for(output_file: &Path) -> PathBuf {
    output_file.with_extension("metadata.json")
}

/// Summary of file expansion results
#[derive(Debug, Default)]
pub struct FileExpansionSummary {
    pub files_processed: u64,
    pub files_written: u64,
    pub declarations_expanded: u64,
    pub outputs: Vec<PathBuf>,
    pub metadata: Vec<ViewMetadata>,
    pub diagnostics: Vec<Diagnostic>,
    pub errors: Vec<String>,
}

impl FileExpansionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: FileExpansionSummary) {
        self.files_processed += other.files_processed;
        self.files_written += other.files_written;
        self.declarations_expanded += other.declarations_expanded;
        self.outputs.extend(other.outputs);
        self.metadata.extend(other.metadata);
        self.diagnostics.extend(other.diagnostics);
        self.errors.extend(other.errors);
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty() && self.diagnostics.is_empty()
    }
}
