//! Waveform visualizer
//!
//! Cosmetic only. A missing surface is skipped silently and drawing never
//! produces an error.

use crate::audio::analyser::AnalyserTap;

/// Something a polyline can be drawn on
pub trait DisplaySurface: Send {
    /// Width and height in surface units
    fn size(&self) -> (f32, f32);

    fn clear(&mut self);

    /// Connected line through `points`
    fn stroke_polyline(&mut self, points: &[(f32, f32)]);
}

/// Drives redraws from the analyser tap while a session is active
pub struct Visualizer {
    surface: Option<Box<dyn DisplaySurface>>,
    scheduled: bool,
    frames_drawn: u64,
}

impl Visualizer {
    pub fn new(surface: Option<Box<dyn DisplaySurface>>) -> Self {
        Self {
            surface,
            scheduled: false,
            frames_drawn: 0,
        }
    }

    /// Begin redrawing on every animation tick
    pub fn schedule(&mut self) {
        self.scheduled = true;
    }

    /// Cancel the pending redraw and blank the surface
    pub fn cancel(&mut self) {
        self.scheduled = false;
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
        }
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// One animation tick. Returns true when something was drawn.
    pub fn on_frame(&mut self, analyser: Option<&AnalyserTap>) -> bool {
        if !self.scheduled {
            return false;
        }
        let (Some(surface), Some(analyser)) = (self.surface.as_mut(), analyser) else {
            return false;
        };

        let points = waveform_points(&analyser.byte_time_domain_data(), surface.size());
        surface.clear();
        surface.stroke_polyline(&points);
        self.frames_drawn += 1;
        true
    }
}

/// Scale analyser bytes onto a surface, ending on the centre line
pub fn waveform_points(data: &[u8], (width, height): (f32, f32)) -> Vec<(f32, f32)> {
    if data.is_empty() {
        return Vec::new();
    }

    let slice_width = width / data.len() as f32;
    let mut points: Vec<(f32, f32)> = data
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let y = f32::from(v) / 128.0 * height / 2.0;
            (i as f32 * slice_width, y)
        })
        .collect();
    points.push((width, height / 2.0));
    points
}

/// Character-cell surface for terminals
pub struct TextSurface {
    width: usize,
    height: usize,
    cells: Vec<char>,
}

impl TextSurface {
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(2);
        let height = height.max(2);
        Self {
            width,
            height,
            cells: vec![' '; width * height],
        }
    }

    /// Current contents, one line per row
    pub fn render(&self) -> String {
        self.cells
            .chunks(self.width)
            .map(|row| row.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn plot(&mut self, x: f32, y: f32) {
        let col = (x.round().max(0.0) as usize).min(self.width - 1);
        let row = (y.round().max(0.0) as usize).min(self.height - 1);
        self.cells[row * self.width + col] = '*';
    }
}

impl DisplaySurface for TextSurface {
    fn size(&self) -> (f32, f32) {
        ((self.width - 1) as f32, (self.height - 1) as f32)
    }

    fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = ' ');
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)]) {
        for pair in points.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as usize;
            for s in 0..=steps {
                let t = s as f32 / steps as f32;
                self.plot(x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
            }
        }
        if let [(x, y)] = points {
            self.plot(*x, *y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_a_flat_center_line() {
        let points = waveform_points(&[128; 4], (100.0, 50.0));
        assert_eq!(points.len(), 5);
        assert!(points.iter().all(|&(_, y)| y == 25.0));
        assert_eq!(points[1].0, 25.0);
        assert_eq!(points[4], (100.0, 25.0));
    }

    #[test]
    fn test_not_drawn_unless_scheduled() {
        let mut visualizer = Visualizer::new(Some(Box::new(TextSurface::new(8, 4))));
        let tap = AnalyserTap::new(16);
        assert!(!visualizer.on_frame(Some(&tap)));

        visualizer.schedule();
        assert!(visualizer.on_frame(Some(&tap)));
        assert_eq!(visualizer.frames_drawn(), 1);

        visualizer.cancel();
        assert!(!visualizer.on_frame(Some(&tap)));
    }

    #[test]
    fn test_missing_surface_is_skipped() {
        let mut visualizer = Visualizer::new(None);
        visualizer.schedule();
        assert!(!visualizer.on_frame(Some(&AnalyserTap::new(16))));
        visualizer.cancel();
    }

    #[test]
    fn test_text_surface_draws_midline() {
        let mut surface = TextSurface::new(5, 3);
        let points = waveform_points(&[128; 4], surface.size());
        surface.stroke_polyline(&points);

        let rendered = surface.render();
        let rows: Vec<&str> = rendered.lines().collect();
        assert_eq!(rows[0], "     ");
        assert_eq!(rows[1], "*****");
        assert_eq!(rows[2], "     ");

        surface.clear();
        assert!(!surface.render().contains('*'));
    }
}
