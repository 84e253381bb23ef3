//! Progress-reporting port for the analysis pipeline.
//!
//! The pipeline emits an ordered sequence of named milestones plus a
//! terminal sentinel. The transport (SSE stream, terminal output, test
//! recorder) is the caller's concern: it injects a [`ProgressSink`]
//! and the core never touches a global channel.

use std::fmt;

/// Named milestones emitted by the pipeline, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Milestone {
    /// Both input rasters decoded and classified
    InputsValidated,
    /// Alignment and normalization finished
    PreprocessingComplete,
    /// Pixel differencing finished
    PixelDetectionComplete { changed_pixels: usize },
    /// Texture refinement finished
    TextureDetectionComplete { confirmed_pixels: usize },
    /// Vector report assembled
    VectorComplete,
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Milestone::InputsValidated => write!(f, "Input rasters validated"),
            Milestone::PreprocessingComplete => write!(f, "Preprocessing completed"),
            Milestone::PixelDetectionComplete { changed_pixels } => {
                write!(
                    f,
                    "Pixel-level change detection complete | Pixels: {}",
                    changed_pixels
                )
            }
            Milestone::TextureDetectionComplete { confirmed_pixels } => {
                write!(
                    f,
                    "Texture change detection complete | Pixels: {}",
                    confirmed_pixels
                )
            }
            Milestone::VectorComplete => write!(f, "Vector report generation complete"),
        }
    }
}

/// An event on the progress channel.
///
/// `Done` is the terminal sentinel: it is a distinct variant rather
/// than a magic message string so transports can tell it apart from
/// ordinary milestones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Milestone(Milestone),
    Done,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Milestone(m) => write!(f, "{}", m),
            ProgressEvent::Done => write!(f, "Analysis completed"),
        }
    }
}

/// Observer interface for pipeline progress.
///
/// Implementations must tolerate being shared across threads; a single
/// analysis emits events strictly in order from one thread.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Sink that discards all events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestone_messages_carry_counts() {
        let m = Milestone::PixelDetectionComplete { changed_pixels: 42 };
        assert!(m.to_string().contains("42"));
    }

    #[test]
    fn test_done_is_distinct_from_milestones() {
        let done = ProgressEvent::Done;
        let m = ProgressEvent::Milestone(Milestone::VectorComplete);
        assert_ne!(done, m);
    }
}
