// crates/document/src/convert.rs
//! Conversion of source documents to derived formats
//!
//! TXT and HTML are rendered natively. PDF, EPUB, MOBI and covers are produced
//! by external programs configured as command templates, e.g.
//! `ebook-convert {input} {output}`.

use crate::error::{DocumentError, DocumentResult};
use crate::{html, text};
use folio_core::BookFormat;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

/// A converter producing one or more derived formats from a source file
pub trait FormatConverter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Returns true if this converter can produce `target`
    fn supports(&self, target: BookFormat) -> bool;

    /// Converts `source` into `target`, writing the result to `output`
    fn convert(&self, source: &Path, target: BookFormat, output: &Path) -> DocumentResult<()>;
}

/// Renders TXT and HTML without external tools
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeConverter;

impl FormatConverter for NativeConverter {
    fn name(&self) -> &str {
        "native"
    }

    fn supports(&self, target: BookFormat) -> bool {
        matches!(target, BookFormat::Txt | BookFormat::Html)
    }

    fn convert(&self, source: &Path, target: BookFormat, output: &Path) -> DocumentResult<()> {
        let content = std::fs::read_to_string(source)?;
        let rendered = match target {
            BookFormat::Txt => text::render_text(&content)?,
            BookFormat::Html => html::render_html(&content)?.html,
            other => return Err(DocumentError::NoConverter(other.to_string())),
        };
        std::fs::write(output, rendered)?;
        Ok(())
    }
}

/// Runs external programs from `{input}`/`{output}` command templates
#[derive(Debug, Default, Clone)]
pub struct CommandConverter {
    templates: HashMap<BookFormat, String>,
}

impl CommandConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the command template for a format; blank templates are ignored
    pub fn with_template(mut self, target: BookFormat, template: impl Into<String>) -> Self {
        let template = template.into();
        if !template.trim().is_empty() {
            self.templates.insert(target, template);
        }
        self
    }

    /// Builds the argument vector for a conversion
    pub fn command_line(&self, target: BookFormat, source: &Path, output: &Path) -> Option<Vec<String>> {
        let template = self.templates.get(&target)?;
        let input = source.to_string_lossy();
        let output = output.to_string_lossy();
        Some(
            template
                .split_whitespace()
                .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
                .collect(),
        )
    }
}

impl FormatConverter for CommandConverter {
    fn name(&self) -> &str {
        "command"
    }

    fn supports(&self, target: BookFormat) -> bool {
        self.templates.contains_key(&target)
    }

    fn convert(&self, source: &Path, target: BookFormat, output: &Path) -> DocumentResult<()> {
        let args = self
            .command_line(target, source, output)
            .ok_or_else(|| DocumentError::NoConverter(target.to_string()))?;
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| DocumentError::NoConverter(target.to_string()))?;

        debug!("Running converter for {}: {}", target, args.join(" "));
        let result = Command::new(program)
            .args(rest)
            .output()
            .map_err(|e| DocumentError::ConverterFailed {
                command: program.clone(),
                reason: e.to_string(),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            warn!("Converter {} exited with {}", program, result.status);
            return Err(DocumentError::ConverterFailed {
                command: program.clone(),
                reason: if stderr.is_empty() {
                    result.status.to_string()
                } else {
                    stderr
                },
            });
        }

        if !output.exists() {
            return Err(DocumentError::ConverterFailed {
                command: program.clone(),
                reason: format!("no output written to {}", output.display()),
            });
        }

        Ok(())
    }
}

/// Picks the first converter that supports each target
#[derive(Default)]
pub struct ConverterSet {
    converters: Vec<Box<dyn FormatConverter>>,
}

impl ConverterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Native converter followed by the configured commands
    pub fn with_commands(commands: CommandConverter) -> Self {
        Self::new()
            .with_converter(Box::new(NativeConverter))
            .with_converter(Box::new(commands))
    }

    pub fn with_converter(mut self, converter: Box<dyn FormatConverter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn supports(&self, target: BookFormat) -> bool {
        self.converters.iter().any(|c| c.supports(target))
    }

    pub fn convert(&self, source: &Path, target: BookFormat, output: &Path) -> DocumentResult<()> {
        let converter = self
            .converters
            .iter()
            .find(|c| c.supports(target))
            .ok_or_else(|| DocumentError::NoConverter(target.to_string()))?;
        debug!("Converting {} to {} with {}", source.display(), target, converter.name());
        converter.convert(source, target, output)
    }
}

impl std::fmt::Debug for ConverterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.converters.iter().map(|c| c.name()).collect();
        f.debug_struct("ConverterSet").field("converters", &names).finish()
    }
}
