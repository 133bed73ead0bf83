// 📤 Emitter - newline-delimited JSON output
// One shaped record per line, written whole or not at all

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    Compact,
    /// Two-space indented, still one document per write
    Pretty,
}

pub struct JsonLinesEmitter<W: Write> {
    writer: W,
    style: JsonStyle,
    line: Vec<u8>,
    written: usize,
}

impl JsonLinesEmitter<BufWriter<File>> {
    /// Create (or truncate) an output file
    pub fn create<P: AsRef<Path>>(path: P, style: JsonStyle) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(JsonLinesEmitter::new(BufWriter::new(file), style))
    }
}

impl<W: Write> JsonLinesEmitter<W> {
    pub fn new(writer: W, style: JsonStyle) -> Self {
        JsonLinesEmitter {
            writer,
            style,
            line: Vec::new(),
            written: 0,
        }
    }

    /// Serialize one document and write it followed by a newline
    ///
    /// Serialization happens into a scratch buffer first, so a document that
    /// fails to serialize leaves nothing behind in the output.
    pub fn emit<T: Serialize>(&mut self, document: &T) -> Result<()> {
        self.line.clear();
        match self.style {
            JsonStyle::Compact => serde_json::to_writer(&mut self.line, document),
            JsonStyle::Pretty => serde_json::to_writer_pretty(&mut self.line, document),
        }
        .context("Failed to serialize document")?;
        self.line.push(b'\n');

        self.writer
            .write_all(&self.line)
            .context("Failed to write document")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and hand back the number of documents written
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush().context("Failed to flush output")?;
        Ok(self.written)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// `<input-file-name>.json` next to the input ("charlotte.osm" → "charlotte.osm.json")
pub fn output_path_for(input: &Path) -> PathBuf {
    let mut name = input
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".json");
    input.with_file_name(name)
}

// ============================================================================
// TESTS
// ============================================================================
