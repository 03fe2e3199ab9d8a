//! Live audio/video capture.
//!
//! A [`Recorder`] moves through `Idle → Recording → Finalizing → Idle`.
//! The device itself is abstracted behind [`MediaDevices`] so hosts can plug
//! in whatever capture backend they have.

use crate::core::capture::IncomingFile;
use crate::{NotepadError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Audio,
    Video,
}

impl CaptureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureKind::Audio => "audio",
            CaptureKind::Video => "video",
        }
    }

    /// MIME type of the assembled recording.
    pub fn mime_type(self) -> &'static str {
        match self {
            CaptureKind::Audio => "audio/webm",
            CaptureKind::Video => "video/webm",
        }
    }

    /// Device tracks to request: audio only, or audio plus video.
    pub fn constraints(self) -> MediaConstraints {
        MediaConstraints {
            audio: true,
            video: self == CaptureKind::Video,
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

/// A live capture stream holding one or more device tracks.
pub trait MediaStream {
    /// Stops every track and releases the underlying device.
    fn stop_tracks(&mut self);
}

/// Grants access to capture devices.
pub trait MediaDevices {
    /// Opens a stream matching `constraints`.
    ///
    /// # Errors
    ///
    /// Should return [`NotepadError::PermissionDenied`] when the user or
    /// platform refuses access. Any other error is reported the same way.
    fn get_user_media(&mut self, constraints: MediaConstraints) -> Result<Box<dyn MediaStream>>;
}

/// Read-only view of where the recorder is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording {
        kind: CaptureKind,
        note_id: String,
        bytes: usize,
    },
    Finalizing,
}

/// A recording that has been stopped and is waiting to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedRecording {
    pub kind: CaptureKind,
    /// The note that was active when recording started.
    pub note_id: String,
    pub file: IncomingFile,
}

struct ActiveRecording {
    kind: CaptureKind,
    note_id: String,
    stream: Box<dyn MediaStream>,
    chunks: Vec<Vec<u8>>,
}

enum Phase {
    Idle,
    Recording(ActiveRecording),
    Finalizing(Box<dyn MediaStream>),
}

pub struct Recorder {
    phase: Phase,
}

impl Default for Recorder {
    fn default() -> Self {
        Self { phase: Phase::Idle }
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecorderState {
        match &self.phase {
            Phase::Idle => RecorderState::Idle,
            Phase::Recording(active) => RecorderState::Recording {
                kind: active.kind,
                note_id: active.note_id.clone(),
                bytes: active.chunks.iter().map(Vec::len).sum(),
            },
            Phase::Finalizing(_) => RecorderState::Finalizing,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// Requests a device stream and starts buffering chunks for `note_id`.
    ///
    /// On refusal the recorder stays idle and the error is returned as
    /// [`NotepadError::PermissionDenied`]; there is no retry.
    pub fn start(
        &mut self,
        devices: &mut dyn MediaDevices,
        kind: CaptureKind,
        note_id: &str,
    ) -> Result<()> {
        if !self.is_idle() {
            return Err(NotepadError::RecordingInProgress);
        }
        let stream = devices
            .get_user_media(kind.constraints())
            .map_err(|e| match e {
                NotepadError::PermissionDenied(_) => e,
                other => NotepadError::PermissionDenied(other.to_string()),
            })?;
        log::info!("Started {kind} recording for {note_id}");
        self.phase = Phase::Recording(ActiveRecording {
            kind,
            note_id: note_id.to_string(),
            stream,
            chunks: Vec::new(),
        });
        Ok(())
    }

    /// Buffers one chunk delivered by the device.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) -> Result<()> {
        match &mut self.phase {
            Phase::Recording(active) => {
                active.chunks.push(chunk);
                Ok(())
            }
            _ => Err(NotepadError::NotRecording),
        }
    }

    /// Stops buffering and assembles the chunks into one file.
    ///
    /// The recorder is left in `Finalizing` holding the device stream until
    /// [`finish`](Self::finish) is called, whether or not storing succeeds.
    pub fn stop(&mut self, now: i64) -> Result<FinishedRecording> {
        let active = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Recording(active) => active,
            other => {
                self.phase = other;
                return Err(NotepadError::NotRecording);
            }
        };
        let ActiveRecording {
            kind,
            note_id,
            stream,
            chunks,
        } = active;
        self.phase = Phase::Finalizing(stream);

        let data = chunks.concat();
        log::info!("Stopped {kind} recording for {note_id} ({} bytes)", data.len());
        Ok(FinishedRecording {
            kind,
            note_id,
            file: IncomingFile::new(format!("{kind}-{now}.webm"), kind.mime_type(), data),
        })
    }

    /// Releases the device stream and returns to `Idle`.
    pub fn finish(&mut self) {
        if let Phase::Finalizing(mut stream) = std::mem::replace(&mut self.phase, Phase::Idle) {
            stream.stop_tracks();
        } else {
            log::debug!("finish() called while not finalizing");
        }
    }
}
