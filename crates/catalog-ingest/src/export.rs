//! Batch window exporter
//!
//! Success and failed rows are buffered in two independent windows. A window
//! is written out when it reaches the batch size and once more at the end for
//! whatever is left. Each file is labeled with the range of rows it holds
//! within its own stream: `<stem>_<start>-<end>_output-<tag>.csv` and
//! `<stem>_<start>-<end>_failed-<tag>.csv`.

use crate::scheduler::RowOutcome;
use crate::table::write_rows;
use catalog_common::row::ProductRow;
use catalog_common::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Success,
    Failed,
}

impl Stream {
    fn label(self) -> &'static str {
        match self {
            Stream::Success => "output",
            Stream::Failed => "failed",
        }
    }
}

#[derive(Debug)]
struct Window {
    stream: Stream,
    buffer: Vec<ProductRow>,
    /// Rows of this stream already written
    flushed: usize,
}

impl Window {
    fn new(stream: Stream) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            flushed: 0,
        }
    }
}

/// One written window file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFile {
    pub stream: Stream,
    pub path: PathBuf,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub success_rows: usize,
    pub failed_rows: usize,
    pub files: Vec<WindowFile>,
}

impl ExportReport {
    pub fn windows(&self, stream: Stream) -> usize {
        self.files.iter().filter(|f| f.stream == stream).count()
    }
}

pub struct BatchExporter {
    output_dir: PathBuf,
    stem: String,
    author_tag: String,
    batch_size: usize,
    success: Window,
    failed: Window,
    files: Vec<WindowFile>,
}

impl BatchExporter {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        stem: impl Into<String>,
        author_tag: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            stem: stem.into(),
            author_tag: author_tag.into(),
            batch_size: batch_size.max(1),
            success: Window::new(Stream::Success),
            failed: Window::new(Stream::Failed),
            files: Vec::new(),
        }
    }

    /// Buffer an outcome, writing its window out when full
    pub fn push(&mut self, outcome: RowOutcome) -> Result<()> {
        let (window, row) = match outcome {
            RowOutcome::Success(row) => (&mut self.success, row),
            RowOutcome::Failed(row) => (&mut self.failed, row),
        };
        window.buffer.push(row);

        if window.buffer.len() >= self.batch_size {
            let file = flush(&self.output_dir, &self.stem, &self.author_tag, window)?;
            self.files.extend(file);
        }
        Ok(())
    }

    /// Write every non-empty window and report what was exported
    pub fn finish(mut self) -> Result<ExportReport> {
        for window in [&mut self.success, &mut self.failed] {
            let file = flush(&self.output_dir, &self.stem, &self.author_tag, window)?;
            self.files.extend(file);
        }
        Ok(ExportReport {
            success_rows: self.success.flushed,
            failed_rows: self.failed.flushed,
            files: self.files,
        })
    }
}

pub fn window_file_name(stem: &str, start: usize, end: usize, stream: Stream, author_tag: &str) -> String {
    format!("{}_{}-{}_{}-{}.csv", stem, start, end, stream.label(), author_tag)
}

fn flush(output_dir: &Path, stem: &str, author_tag: &str, window: &mut Window) -> Result<Option<WindowFile>> {
    if window.buffer.is_empty() {
        return Ok(None);
    }

    let start = window.flushed + 1;
    let end = window.flushed + window.buffer.len();
    let path = output_dir.join(window_file_name(stem, start, end, window.stream, author_tag));

    write_rows(&path, &window.buffer)?;

    match window.stream {
        Stream::Success => info!(
            path = %path.display(),
            rows = window.buffer.len(),
            "Exported {}-{} (success)", start, end
        ),
        Stream::Failed => warn!(
            path = %path.display(),
            rows = window.buffer.len(),
            "Exported {}-{} (failed)", start, end
        ),
    }

    window.flushed = end;
    window.buffer.clear();

    Ok(Some(WindowFile {
        stream: window.stream,
        path,
        start,
        end,
    }))
}
