//! Offline frame export.
//!
//! Export walks the timeline at fixed sample instants `i / fps` instead of
//! wall-clock time. Before frame `i` is captured, every event with a
//! timestamp at or before its instant has been applied to the stage, so
//! the frames reproduce exactly what playback shows at the same positions.

use crate::archive::FrameArchive;
use crate::capture::FrameCapture;
use crate::error::{Error, Result};
use crate::stage::Stage;
use crate::timeline::Timeline;

/// Forward-only position in a timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportCursor {
    position: usize,
}

impl ExportCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next event to apply
    pub fn position(&self) -> usize {
        self.position
    }

    /// Apply every not-yet-applied event with `time <= instant`.
    /// Returns how many were applied.
    pub fn advance_to(&mut self, timeline: &Timeline, instant: f64, stage: &mut Stage) -> usize {
        let start = self.position;
        while let Some(event) = timeline.get(self.position) {
            if event.time > instant {
                break;
            }
            stage.apply(event);
            self.position += 1;
        }
        self.position - start
    }
}

/// Export progress report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn percent(&self) -> u32 {
        (self.fraction() * 100.0).round() as u32
    }
}

/// Result of a finished export
#[derive(Debug)]
pub struct ExportOutcome<T> {
    /// Number of frames captured
    pub frames: usize,
    /// The finished archive
    pub artifact: T,
}

/// Number of frames for `duration` seconds at `frame_rate`: `ceil(d * fps)`.
pub fn frame_count(duration: f64, frame_rate: u32) -> usize {
    (duration * frame_rate as f64).ceil().max(0.0) as usize
}

/// Zero-padded frame file name, `frame_00042.png`
pub fn frame_name(index: usize, extension: &str) -> String {
    format!("frame_{:05}.{}", index, extension)
}

/// Render the timeline to a sequence of frames.
///
/// The stage is reset before the first frame and after the last one. If
/// a capture fails the export stops, the partial archive is discarded and
/// the stage is cleared.
pub fn export_frames<C, A, P>(
    timeline: &Timeline,
    total_duration: f64,
    frame_rate: u32,
    stage: &mut Stage,
    capture: &mut C,
    mut archive: A,
    mut progress: P,
) -> Result<ExportOutcome<A::Output>>
where
    C: FrameCapture + ?Sized,
    A: FrameArchive,
    P: FnMut(Progress),
{
    if frame_rate == 0 {
        return Err(Error::InvalidExport("frame rate must be at least 1".to_string()));
    }
    if !total_duration.is_finite() || total_duration < 0.0 {
        return Err(Error::InvalidExport(format!(
            "duration must be a non-negative number of seconds, got {}",
            total_duration
        )));
    }

    let total = frame_count(total_duration, frame_rate);
    log::info!(
        "Exporting {} frame(s) at {} fps ({:.2}s)",
        total,
        frame_rate,
        total_duration
    );

    stage.reset();
    let mut cursor = ExportCursor::new();
    for index in 0..total {
        let instant = index as f64 / frame_rate as f64;
        cursor.advance_to(timeline, instant, stage);

        let result = capture
            .capture(stage.keyboard())
            .and_then(|data| archive.add_frame(&frame_name(index, capture.extension()), &data));
        if let Err(e) = result {
            log::error!("Export aborted at frame {} of {}: {}", index, total, e);
            stage.reset();
            return Err(match e {
                Error::Capture(msg) => Error::Capture(msg),
                other => Error::Capture(format!("frame {}: {}", index, other)),
            });
        }

        progress(Progress {
            completed: index + 1,
            total,
        });
    }

    let artifact = archive.finish();
    stage.reset();
    Ok(ExportOutcome {
        frames: total,
        artifact: artifact?,
    })
}
