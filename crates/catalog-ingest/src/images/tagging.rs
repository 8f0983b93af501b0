//! EXIF/XMP tagging through a long-lived `exiftool -stay_open` process
//!
//! Callers must serialize writes through the run context's tagging region;
//! [`ExifTool`] additionally guards its pipes with a mutex of its own.

use crate::config::MetadataConfig;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Marker exiftool prints after each `-execute`
const READY_MARKER: &str = "{ready}";
const UPDATED_MARKER: &str = "1 image files updated";
const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum TagError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exiftool I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("exiftool did not update {path}: {output}")]
    Rejected { path: String, output: String },

    #[error("exiftool exited unexpectedly")]
    Closed,
}

/// Metadata written into one processed image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTags {
    pub title: String,
    pub author: String,
    pub keywords: Vec<String>,
    pub taken_at: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub year: i32,
}

impl ImageTags {
    pub fn new(title: &str, author: &str, metadata: &MetadataConfig, now: DateTime<Local>) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            keywords: title.split_whitespace().map(str::to_string).collect(),
            taken_at: (now - Duration::days(metadata.days_ago)).naive_local(),
            latitude: metadata.latitude,
            longitude: metadata.longitude,
            year: now.year(),
        }
    }

    pub fn latitude_ref(&self) -> &'static str {
        if self.latitude >= 0.0 {
            "N"
        } else {
            "S"
        }
    }

    pub fn longitude_ref(&self) -> &'static str {
        if self.longitude >= 0.0 {
            "E"
        } else {
            "W"
        }
    }

    /// Tag assignments in exiftool argument-file form, one per line
    pub fn to_args(&self) -> Vec<String> {
        let title = single_line(&self.title);
        let author = single_line(&self.author);

        let mut args = vec![
            format!("-Title={}", title),
            format!("-Subject={}", title),
            "-Rating=5".to_string(),
        ];
        args.extend(
            self.keywords
                .iter()
                .map(|k| format!("-Keywords={}", single_line(k))),
        );
        args.extend([
            format!("-Comment={}", title),
            format!("-Author={}", author),
            format!("-XPTitle={}", title),
            format!("-XPSubject={}", title),
            format!("-XPComment={}", title),
            format!("-XPKeywords={}", self.keywords.join(";")),
            format!("-XPAuthor={}", author),
            format!("-DateTimeOriginal={}", self.taken_at.format("%Y:%m:%d %H:%M:%S")),
            format!("-GPSLatitude={}", self.latitude.abs()),
            format!("-GPSLatitudeRef={}", self.latitude_ref()),
            format!("-GPSLongitude={}", self.longitude.abs()),
            format!("-GPSLongitudeRef={}", self.longitude_ref()),
            format!("-Make={}", author),
            format!("-Model={} Product Image", author),
            format!("-Copyright=© {} {}", self.year, author),
            "-overwrite_original".to_string(),
        ]);
        args
    }
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Writes metadata into image files
#[async_trait]
pub trait Tagger: Send + Sync {
    async fn write_tags(&self, path: &Path, tags: &ImageTags) -> Result<(), TagError>;

    /// Release the underlying tool; later writes may restart it
    async fn shutdown(&self) -> Result<(), TagError>;
}

struct Session {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

pub struct ExifTool {
    program: PathBuf,
    session: Mutex<Option<Session>>,
}

impl ExifTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            session: Mutex::new(None),
        }
    }

    fn spawn(&self) -> Result<Session, TagError> {
        let mut child = Command::new(&self.program)
            .args(["-stay_open", "True", "-@", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TagError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(TagError::Closed)?;
        let stdout = child.stdout.take().ok_or(TagError::Closed)?;

        info!(program = %self.program.display(), "exiftool started");

        Ok(Session {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    async fn execute(session: &mut Session, path: &Path, tags: &ImageTags) -> Result<String, TagError> {
        let mut command = tags.to_args().join("\n");
        command.push('\n');
        command.push_str(&path.display().to_string());
        command.push_str("\n-execute\n");

        session.stdin.write_all(command.as_bytes()).await?;
        session.stdin.flush().await?;

        let mut output = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            if session.stdout.read_line(&mut line).await? == 0 {
                return Err(TagError::Closed);
            }
            if line.trim() == READY_MARKER {
                return Ok(output);
            }
            output.push_str(&line);
        }
    }
}

#[async_trait]
impl Tagger for ExifTool {
    async fn write_tags(&self, path: &Path, tags: &ImageTags) -> Result<(), TagError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }
        let Some(session) = guard.as_mut() else {
            return Err(TagError::Closed);
        };

        match Self::execute(session, path, tags).await {
            Ok(output) if output.contains(UPDATED_MARKER) => {
                debug!(path = %path.display(), "Tags written");
                Ok(())
            },
            Ok(output) => Err(TagError::Rejected {
                path: path.display().to_string(),
                output: output.trim().to_string(),
            }),
            Err(e) => {
                // The pipe state is unknown now, start over on the next write
                *guard = None;
                Err(e)
            },
        }
    }

    async fn shutdown(&self) -> Result<(), TagError> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Ok(());
        };

        session.stdin.write_all(b"-stay_open\nFalse\n").await?;
        session.stdin.flush().await?;

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, session.child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!(?status, "exiftool stopped");
            },
            Err(_) => {
                warn!("exiftool did not exit in time, killing it");
                session.child.kill().await?;
            },
        }
        Ok(())
    }
}
