//! Frame capture while recording and animated GIF export.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};

use crate::error::{Result, WormholeError};

/// Used when the frame clock has no FPS estimate yet.
pub const FALLBACK_FRAME_MS: u32 = 33;

#[derive(Debug, Default)]
pub struct FrameRecorder {
    recording: bool,
    frames: Vec<RgbaImage>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Start a fresh recording, or stop and hand back what was captured.
    pub fn toggle(&mut self) -> Option<Vec<RgbaImage>> {
        if self.recording {
            self.recording = false;
            log::info!("--- Stopped recording ({} frames) ---", self.frames.len());
            Some(std::mem::take(&mut self.frames))
        } else {
            self.recording = true;
            self.frames.clear();
            log::info!("--- Started recording ---");
            None
        }
    }

    /// Keep a frame if recording; otherwise drop it.
    pub fn capture(&mut self, frame: RgbaImage) {
        if self.recording {
            self.frames.push(frame);
        }
    }
}

pub fn frame_duration_ms(fps: f32) -> u32 {
    if fps > 0.0 {
        (1000.0 / fps) as u32
    } else {
        FALLBACK_FRAME_MS
    }
}

pub fn default_file_name(now: DateTime<Local>) -> String {
    format!("wormhole_recording_{}.gif", now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Write `frames` as an endlessly looping GIF. Zero frames is a no-op that
/// returns `Ok(None)`.
pub fn export_animation(frames: &[RgbaImage], frame_duration_ms: u32, path: &Path) -> Result<Option<PathBuf>> {
    if frames.is_empty() {
        log::warn!("No frames were recorded. Nothing to save.");
        return Ok(None);
    }
    log::info!("Saving {} frames to {}...", frames.len(), path.display());

    let image_err = |source| WormholeError::Image { path: path.to_path_buf(), source };
    let mut buf = Vec::new();
    {
        // The GIF trailer is written when the encoder drops.
        let mut encoder = GifEncoder::new(&mut buf);
        encoder.set_repeat(Repeat::Infinite).map_err(image_err)?;
        let delay = Delay::from_numer_denom_ms(frame_duration_ms, 1);
        encoder
            .encode_frames(frames.iter().map(|f| Frame::from_parts(f.clone(), 0, 0, delay)))
            .map_err(image_err)?;
    }
    std::fs::write(path, &buf)?;

    log::info!("GIF saved: {}", path.display());
    Ok(Some(path.to_path_buf()))
}
