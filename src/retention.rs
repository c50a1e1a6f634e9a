use crate::config::{RecordingConfig, SystemConfig};
use crate::error::{OnvifcamError, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const SECONDS_PER_DAY: u64 = 24 * 3600;

/// Sweep operation result
#[derive(Debug, Clone, Default)]
pub struct SweepResult {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
    pub duration: Duration,
}

/// Periodically deletes recordings older than the retention window
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    output_path: PathBuf,
    retention: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(output_path: impl Into<PathBuf>, retention_days: u32, interval: Duration) -> Self {
        Self {
            output_path: output_path.into(),
            retention: Duration::from_secs(u64::from(retention_days) * SECONDS_PER_DAY),
            interval,
        }
    }

    pub fn from_config(recording: &RecordingConfig, system: &SystemConfig) -> Self {
        Self::new(
            &recording.output_path,
            system.retention_days,
            Duration::from_secs(system.cleanup_interval_hours * 3600),
        )
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Sweep now and then every interval until `cancel` fires
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        info!(
            "Starting retention sweeper for {} (retention: {} days, every {:?})",
            self.output_path.display(),
            self.retention.as_secs() / SECONDS_PER_DAY,
            self.interval
        );

        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match self.run_sweep().await {
                    Ok(result) => {
                        info!(
                            "Retention sweep completed: {} files deleted, {} bytes freed",
                            result.files_deleted, result.bytes_freed
                        );
                        if !result.errors.is_empty() {
                            warn!(
                                "Retention sweep completed with {} errors: {:?}",
                                result.errors.len(),
                                result.errors
                            );
                        }
                    }
                    Err(e) => error!("Retention sweep failed: {}", e),
                }
            }

            debug!("Retention sweeper stopped");
        })
    }

    pub async fn run_sweep(&self) -> Result<SweepResult> {
        self.run_sweep_at(SystemTime::now()).await
    }

    /// Delete regular files in the output directory last modified before
    /// `now - retention`. Per-file failures are collected, not fatal.
    pub async fn run_sweep_at(&self, now: SystemTime) -> Result<SweepResult> {
        let started = std::time::Instant::now();
        let mut result = SweepResult::default();

        let cutoff = now.checked_sub(self.retention).ok_or_else(|| {
            OnvifcamError::component("retention", "retention window exceeds system time")
        })?;

        let mut entries = match fs::read_dir(&self.output_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "Output directory {} does not exist yet, nothing to sweep",
                    self.output_path.display()
                );
                return Ok(result);
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    result
                        .errors
                        .push(format!("{}: {}", path.display(), e));
                    continue;
                }
            };

            if !metadata.is_file() {
                continue;
            }

            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    result
                        .errors
                        .push(format!("{}: {}", path.display(), e));
                    continue;
                }
            };

            if modified >= cutoff {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Deleted expired recording {}", path.display());
                    result.files_deleted += 1;
                    result.bytes_freed += metadata.len();
                }
                Err(e) => {
                    result
                        .errors
                        .push(format!("{}: {}", path.display(), e));
                }
            }
        }

        result.duration = started.elapsed();
        Ok(result)
    }
}
