//! Camera frame boundary
//!
//! Camera device acquisition is an external collaborator: this module only
//! fixes the frame representation, the [`FrameSource`] trait a capture
//! backend implements, and the shared latest-frame slot a renderer may
//! poll. Sessions own their source and drop it on the terminal transition,
//! which releases the device exactly once.

use std::sync::Arc;

use parking_lot::Mutex;

/// One RGB8 camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap raw interleaved RGB8 pixel data.
    pub fn rgb8(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Errors from a capture backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    /// The device could not be opened. Reported once; the session does not
    /// start and there is no retry.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    /// A single frame read failed. Transient: the session loop continues
    /// on the next iteration without touching any counter or state.
    #[error("frame read failed: {0}")]
    ReadFailed(String),
}

/// A source of camera frames.
///
/// `read_frame` blocks until the next frame is available and paces the
/// session loops. A failed read is transient; callers retry on the next
/// iteration.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<Frame, CaptureError>;
}

/// Shared slot holding the most recently captured frame.
///
/// Written by a session's capture loop, read by whatever renders the
/// preview. Display-only: correctness of sampling and recognition never
/// depends on what a reader observes here.
#[derive(Clone, Default)]
pub struct LatestFrame {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Frame) {
        *self.slot.lock() = Some(frame);
    }

    pub fn snapshot(&self) -> Option<Frame> {
        self.slot.lock().clone()
    }
}
