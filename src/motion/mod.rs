mod debouncer;
mod recording;
#[cfg(test)]
mod tests;

pub use debouncer::{MotionDebouncer, MotionState, MotionStatus};
pub use recording::{FfmpegRecorder, Recorder, RecordingRequest, RecordingSession};
