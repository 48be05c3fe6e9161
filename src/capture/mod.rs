//! Interactive polygon capture.
//!
//! A [`PolygonCapture`] turns a stream of discrete input events into either a
//! finished polygon (at least three vertices) or a cancellation. It knows
//! nothing about windows or terminals: events come from an [`EventSource`]
//! and every accepted change is pushed to a [`RenderSink`].
//!
//! ```text
//! Empty --point--> Drawing --finish (>= 3 points)--> Finished
//!   ^                 |
//!   +----reset--------+        any state --quit--> Cancelled
//! ```

mod render;
mod source;

pub use render::{CaptureFrame, ConsoleRenderer, NullRenderer, RenderSink};
pub use source::{EventSource, KeyScript, ScriptedEvents};

use std::io;

use crate::model::{MIN_POLYGON_VERTICES, PlantId, Point};

/// A discrete input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureEvent {
    /// A vertex placed at image coordinates.
    PointAdded(Point),
    /// Remove the most recent vertex.
    UndoLast,
    /// Clear all vertices.
    Reset,
    /// Complete the polygon.
    Finish,
    /// Abandon the polygon.
    Quit,
}

/// Capture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No vertices placed since start or last reset.
    Empty,
    /// Vertices are being placed.
    Drawing,
    /// Completed with at least three vertices.
    Finished,
    /// Abandoned by the user.
    Cancelled,
}

impl CaptureState {
    /// Check if no further events are accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaptureState::Finished | CaptureState::Cancelled)
    }
}

/// Effect of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The vertex list changed and should be re-rendered.
    Changed,
    /// The event had no effect.
    Ignored,
    /// The capture reached `Finished` or `Cancelled`.
    Terminated,
}

/// Result of a capture run.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Completed polygon, always at least three vertices.
    Finished(Vec<Point>),
    /// The user quit.
    Cancelled,
    /// The event source ran dry before a terminal event.
    InputClosed {
        /// Vertices placed when input ended (discarded).
        points: usize,
    },
}

impl CaptureOutcome {
    /// Vertices of a finished polygon.
    pub fn polygon(&self) -> Option<&[Point]> {
        match self {
            CaptureOutcome::Finished(points) => Some(points),
            _ => None,
        }
    }
}

/// Capture context for one (image, plant) pair.
///
/// Owns the in-progress vertex buffer. Consumed when the capture ends.
#[derive(Debug, Clone)]
pub struct PolygonCapture {
    plant_id: PlantId,
    points: Vec<Point>,
    state: CaptureState,
}

impl PolygonCapture {
    pub fn new(plant_id: PlantId) -> Self {
        Self {
            plant_id,
            points: Vec::new(),
            state: CaptureState::Empty,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Vertices placed so far.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Apply one event.
    ///
    /// `Finish` with fewer than three vertices is ignored. Events after a
    /// terminal state are ignored.
    pub fn apply(&mut self, event: CaptureEvent) -> Transition {
        if self.state.is_terminal() {
            return Transition::Ignored;
        }

        match event {
            CaptureEvent::PointAdded(p) => {
                self.points.push(p);
                self.state = CaptureState::Drawing;
                Transition::Changed
            }
            CaptureEvent::UndoLast => match self.points.pop() {
                Some(_) => Transition::Changed,
                None => Transition::Ignored,
            },
            CaptureEvent::Reset => {
                self.points.clear();
                self.state = CaptureState::Empty;
                Transition::Changed
            }
            CaptureEvent::Finish => {
                if self.points.len() >= MIN_POLYGON_VERTICES {
                    self.state = CaptureState::Finished;
                    Transition::Terminated
                } else {
                    log::debug!(
                        "Ignoring finish for plant {}: {} of {} vertices",
                        self.plant_id,
                        self.points.len(),
                        MIN_POLYGON_VERTICES
                    );
                    Transition::Ignored
                }
            }
            CaptureEvent::Quit => {
                self.points.clear();
                self.state = CaptureState::Cancelled;
                Transition::Terminated
            }
        }
    }

    /// Current render frame.
    pub fn frame(&self) -> CaptureFrame<'_> {
        CaptureFrame {
            plant_id: &self.plant_id,
            points: &self.points,
            closed_preview: self.points.len() >= MIN_POLYGON_VERTICES,
        }
    }

    /// Drive the capture until a terminal event or the end of input.
    ///
    /// Errors from the source or sink are returned as-is; the in-progress
    /// polygon is lost.
    pub fn run<S, R>(mut self, source: &mut S, sink: &mut R) -> io::Result<CaptureOutcome>
    where
        S: EventSource + ?Sized,
        R: RenderSink + ?Sized,
    {
        sink.begin_polygon(&self.plant_id)?;

        while !self.state.is_terminal() {
            let Some(event) = source.next_event()? else {
                log::debug!(
                    "Input closed while drawing plant {} ({} vertices)",
                    self.plant_id,
                    self.points.len()
                );
                return Ok(CaptureOutcome::InputClosed {
                    points: self.points.len(),
                });
            };

            log::trace!("plant {}: {:?}", self.plant_id, event);
            if self.apply(event) == Transition::Changed {
                sink.render(&self.frame())?;
            }
        }

        Ok(self.into_outcome())
    }

    /// Outcome for a capture in a terminal state.
    fn into_outcome(self) -> CaptureOutcome {
        match self.state {
            CaptureState::Finished => CaptureOutcome::Finished(self.points),
            _ => CaptureOutcome::Cancelled,
        }
    }
}
