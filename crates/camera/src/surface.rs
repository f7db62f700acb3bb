use std::io::Write;
use std::path::PathBuf;

use drivekit_sim::CameraFrame;
use tracing::{debug, warn};

/// Latest camera frame plus the recording flag, shared between the
/// session (reader) and the sensor frame handler (writer).
#[derive(Debug)]
pub struct FrameSurface {
    latest: Option<CameraFrame>,
    recording: bool,
    out_dir: PathBuf,
}

impl FrameSurface {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            latest: None,
            recording: false,
            out_dir: out_dir.into(),
        }
    }

    pub fn latest(&self) -> Option<&CameraFrame> {
        self.latest.as_ref()
    }

    /// Drops the held frame (done when the sensor is respawned so a stale
    /// image never lingers across a viewpoint switch).
    pub fn clear(&mut self) {
        self.latest = None;
    }

    pub fn recording(&self) -> bool {
        self.recording
    }

    /// Flips frame-to-disk recording; returns the new state.
    pub fn toggle_recording(&mut self) -> bool {
        self.recording = !self.recording;
        self.recording
    }

    /// Accepts a pushed frame, saving it to disk when recording.
    pub fn accept(&mut self, frame: CameraFrame) {
        if self.recording {
            if let Err(e) = self.save(&frame) {
                warn!(frame = frame.frame, error = %e, "failed to save camera frame");
            }
        }
        self.latest = Some(frame);
    }

    /// Writes one frame as a binary PPM named after the server frame
    /// number, e.g. `_out/00001234.ppm`.
    fn save(&self, frame: &CameraFrame) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(format!("{:08}.ppm", frame.frame));
        let mut file = std::io::BufWriter::new(std::fs::File::create(&path)?);
        write!(file, "P6\n{} {}\n255\n", frame.width, frame.height)?;
        for px in frame.rgba.chunks_exact(4) {
            file.write_all(&px[..3])?;
        }
        debug!(path = %path.display(), "saved camera frame");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: u64) -> CameraFrame {
        CameraFrame {
            frame: n,
            width: 2,
            height: 1,
            rgba: vec![10, 20, 30, 255, 40, 50, 60, 255],
        }
    }

    #[test]
    fn accept_keeps_latest_frame() {
        let mut surface = FrameSurface::new("_out");
        assert!(surface.latest().is_none());
        surface.accept(frame(1));
        surface.accept(frame(2));
        assert_eq!(surface.latest().unwrap().frame, 2);
        surface.clear();
        assert!(surface.latest().is_none());
    }

    #[test]
    fn recording_writes_ppm_named_after_frame() {
        let dir = std::env::temp_dir().join(format!("drivekit_surface_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mut surface = FrameSurface::new(&dir);

        surface.accept(frame(7));
        assert!(!dir.join("00000007.ppm").exists());

        assert!(surface.toggle_recording());
        surface.accept(frame(8));
        let saved = std::fs::read(dir.join("00000008.ppm")).unwrap();
        // Header plus 2 RGB pixels.
        assert!(saved.starts_with(b"P6\n2 1\n255\n"));
        assert_eq!(saved.len(), b"P6\n2 1\n255\n".len() + 6);

        assert!(!surface.toggle_recording());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
