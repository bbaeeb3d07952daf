#![forbid(unsafe_code)]

//! Liveness probing: does a stored URL still resolve to playable media?

use std::path::PathBuf;
use std::process::{Command, Stdio};

use log::{debug, warn};

pub const DEFAULT_YT_DLP: &str = "yt-dlp";

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Live,
    /// The tool ran and could not resolve the URL.
    Unavailable,
    /// The check itself could not run (tool missing, spawn failure).
    Unchecked(String),
}

pub trait LivenessCheck {
    fn availability(&self, url: &str) -> Availability;

    /// Compatible view that folds "could not check" into "not live".
    fn is_live(&self, url: &str) -> bool {
        matches!(self.availability(url), Availability::Live)
    }
}

/// Asks yt-dlp to resolve the URL without downloading anything.
#[derive(Debug, Clone)]
pub struct YtDlpProbe {
    program: PathBuf,
}

impl YtDlpProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, url: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--skip-download")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

impl Default for YtDlpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_YT_DLP)
    }
}

impl LivenessCheck for YtDlpProbe {
    fn availability(&self, url: &str) -> Availability {
        match self.command(url).status() {
            Ok(status) if status.success() => Availability::Live,
            Ok(status) => {
                debug!("{} exited with {} for {}", self.program.display(), status, url);
                Availability::Unavailable
            }
            Err(err) => {
                warn!("could not run {}: {}", self.program.display(), err);
                Availability::Unchecked(format!("{}: {}", self.program.display(), err))
            }
        }
    }
}
