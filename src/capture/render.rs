//! Render sinks showing capture progress.

use std::io::{self, Write};
use std::path::Path;

use crate::keybindings::KeyBindings;
use crate::model::{PlantId, Point};

/// Snapshot of an in-progress polygon.
#[derive(Debug, Clone, Copy)]
pub struct CaptureFrame<'a> {
    /// Plant being outlined.
    pub plant_id: &'a PlantId,
    /// Vertices placed so far.
    pub points: &'a [Point],
    /// Whether a closed polygon preview is drawn (three or more vertices).
    pub closed_preview: bool,
}

/// Receives everything the user should see during a session.
pub trait RenderSink {
    /// A new reference image is displayed (`index` is 1-based).
    fn show_image(&mut self, path: &Path, index: usize, total: usize) -> io::Result<()>;

    /// Capture for a plant begins.
    fn begin_polygon(&mut self, plant_id: &PlantId) -> io::Result<()>;

    /// The vertex list changed.
    fn render(&mut self, frame: &CaptureFrame<'_>) -> io::Result<()>;
}

/// Discards all output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl RenderSink for NullRenderer {
    fn show_image(&mut self, _path: &Path, _index: usize, _total: usize) -> io::Result<()> {
        Ok(())
    }

    fn begin_polygon(&mut self, _plant_id: &PlantId) -> io::Result<()> {
        Ok(())
    }

    fn render(&mut self, _frame: &CaptureFrame<'_>) -> io::Result<()> {
        Ok(())
    }
}

/// Text rendition of the capture for terminals.
pub struct ConsoleRenderer<W> {
    out: W,
    help: String,
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W, bindings: &KeyBindings) -> Self {
        Self {
            out,
            help: bindings.help(),
        }
    }

    /// Consume the renderer and return the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderSink for ConsoleRenderer<W> {
    fn show_image(&mut self, path: &Path, index: usize, total: usize) -> io::Result<()> {
        writeln!(self.out, "\n=== Image {}/{}: {} ===", index, total, path.display())?;
        self.out.flush()
    }

    fn begin_polygon(&mut self, plant_id: &PlantId) -> io::Result<()> {
        writeln!(
            self.out,
            "Draw polygon for plant_id={}. Enter x y to add a vertex; {}",
            plant_id, self.help
        )?;
        self.out.flush()
    }

    fn render(&mut self, frame: &CaptureFrame<'_>) -> io::Result<()> {
        let vertices = frame
            .points
            .iter()
            .map(|p| format!("({:.1}, {:.1})", p.x, p.y))
            .collect::<Vec<_>>()
            .join(" ");
        let shape = if frame.closed_preview { "closed" } else { "open" };
        writeln!(
            self.out,
            "  plant {} [{} vertices, {}] {}",
            frame.plant_id,
            frame.points.len(),
            shape,
            vertices
        )?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_output() {
        let mut renderer = ConsoleRenderer::new(Vec::new(), &KeyBindings::default());
        let plant = PlantId::new("2");
        let points = [Point::new(1.0, 2.0), Point::new(3.0, 4.0), Point::new(5.0, 6.0)];

        renderer.show_image(Path::new("img.jpg"), 1, 3).unwrap();
        renderer.begin_polygon(&plant).unwrap();
        renderer
            .render(&CaptureFrame {
                plant_id: &plant,
                points: &points,
                closed_preview: true,
            })
            .unwrap();

        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(text.contains("=== Image 1/3: img.jpg ==="));
        assert!(text.contains("plant_id=2"));
        assert!(text.contains("enter=finish"));
        assert!(text.contains("[3 vertices, closed] (1.0, 2.0) (3.0, 4.0) (5.0, 6.0)"));
    }
}
