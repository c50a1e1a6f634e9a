use crate::camera::CameraIdentity;
use crate::config::RecordingConfig;
use crate::error::RecordingError;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Everything needed to launch one recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingRequest {
    /// Camera media stream
    pub source_url: String,
    /// Directory the recording is written to
    pub output_dir: PathBuf,
    /// File name inside `output_dir`
    pub file_name: String,
    /// Container title metadata
    pub title: String,
}

impl RecordingRequest {
    /// Build the request for a recording of `camera` starting at `now`.
    ///
    /// File names look like `2024-03-01_10.15.00_home-garage-camera.mp4`.
    pub fn for_camera(
        camera: &CameraIdentity,
        recording: &RecordingConfig,
        now: DateTime<Local>,
    ) -> Self {
        let label = camera.file_label();
        Self {
            source_url: camera
                .address()
                .stream_url(recording.stream_port, &recording.stream_path),
            output_dir: PathBuf::from(&recording.output_path),
            file_name: format!("{}_{}.mp4", now.format("%Y-%m-%d_%H.%M.%S"), label),
            title: format!("{} - {}", now.format("%Y-%m-%d %H:%M:%S"), camera.label()),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }
}

/// One live invocation of the external recording tool
#[derive(Debug)]
pub struct RecordingSession {
    output: PathBuf,
    started_at: DateTime<Local>,
    process: Option<Child>,
}

impl RecordingSession {
    pub fn new(output: PathBuf, process: Option<Child>) -> Self {
        Self {
            output,
            started_at: Local::now(),
            process,
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn process_id(&self) -> Option<u32> {
        self.process.as_ref().and_then(Child::id)
    }
}

/// Starts and interrupts recordings
#[async_trait::async_trait]
pub trait Recorder: Send + Sync {
    async fn start(&self, request: &RecordingRequest) -> Result<RecordingSession, RecordingError>;

    /// Ask the recording to finish. Does not wait for the file to be finalized.
    async fn stop(&self, session: RecordingSession) -> Result<(), RecordingError>;
}

/// Records by running ffmpeg with stream copy
pub struct FfmpegRecorder {
    program: String,
}

impl FfmpegRecorder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(recording: &RecordingConfig) -> Self {
        Self::new(recording.ffmpeg_path.clone())
    }

    fn command(&self, request: &RecordingRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-nostdin")
            .arg("-i")
            .arg(&request.source_url)
            .arg("-vcodec")
            .arg("copy")
            .arg("-metadata")
            .arg(format!("title={}", request.title))
            .arg(&request.file_name)
            .current_dir(&request.output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

#[async_trait::async_trait]
impl Recorder for FfmpegRecorder {
    async fn start(&self, request: &RecordingRequest) -> Result<RecordingSession, RecordingError> {
        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|e| RecordingError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        let child = self
            .command(request)
            .spawn()
            .map_err(|e| RecordingError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        info!(
            "Recording {} to {} (pid {:?})",
            request.source_url,
            request.output_path().display(),
            child.id()
        );

        Ok(RecordingSession::new(request.output_path(), Some(child)))
    }

    async fn stop(&self, session: RecordingSession) -> Result<(), RecordingError> {
        let RecordingSession {
            output, process, ..
        } = session;

        let mut child = match process {
            Some(child) => child,
            None => return Ok(()),
        };

        let pid = child.id().ok_or_else(|| RecordingError::NoProcessId {
            output: output.display().to_string(),
        })?;

        let result = interrupt(pid);

        // Reap in the background; ffmpeg finalizes the container on its own time
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("Recording process {} exited with {}", pid, status),
                Err(e) => warn!("Failed to reap recording process {}: {}", pid, e),
            }
        });

        result?;
        info!("Stopped recording {}", output.display());
        Ok(())
    }
}

fn interrupt(pid: u32) -> Result<(), RecordingError> {
    let pid_t = libc::pid_t::try_from(pid).map_err(|_| RecordingError::Signal {
        pid,
        source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
    })?;

    // SAFETY: kill(2) has no memory safety requirements
    let rc = unsafe { libc::kill(pid_t, libc::SIGINT) };
    if rc != 0 {
        return Err(RecordingError::Signal {
            pid,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}
