//! Snapshot frames and trapped-electron classification.

use std::path::{Path, PathBuf};
use std::process::Command;

use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};
use crate::field::ExternalField;

/// Axis-aligned rectangle, boundaries inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: (f64, f64),
    pub y: (f64, f64),
}

impl Rect {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x.0 && x <= self.x.1 && y >= self.y.0 && y <= self.y.1
    }

    pub fn area(&self) -> f64 {
        (self.x.1 - self.x.0).abs() * (self.y.1 - self.y.0).abs()
    }
}

/// Sorts electrons into those sitting above the resonator and the rest.
#[derive(Debug, Clone, Copy)]
pub struct TrapClassifier {
    pub trap: Rect,
}

impl TrapClassifier {
    pub fn new(trap: Rect) -> Self {
        Self { trap }
    }

    /// Number of electrons inside the trap region.
    pub fn get_trapped_electrons(&self, r: &[f64]) -> usize {
        r.chunks_exact(2).filter(|p| self.trap.contains(p[0], p[1])).count()
    }

    /// Number of electrons that migrated out of the trap region.
    pub fn get_untrapped_electrons(&self, r: &[f64]) -> usize {
        r.len() / 2 - self.get_trapped_electrons(r)
    }

    /// Areal density of the trapped electrons (per m² for SI coordinates).
    pub fn electron_density_by_area(&self, r: &[f64]) -> f64 {
        let area = self.trap.area();
        if area > 0.0 {
            self.get_trapped_electrons(r) as f64 / area
        } else {
            0.0
        }
    }
}

/// Number of electrons outside the simulation box entirely.
pub fn check_unbounded_electrons(r: &[f64], xdomain: (f64, f64), ydomain: (f64, f64)) -> usize {
    let bounds = Rect { x: xdomain, y: ydomain };
    r.chunks_exact(2).filter(|p| !bounds.contains(p[0], p[1])).count()
}

/// Something that turns an electron configuration into a diagnostic frame.
pub trait SnapshotRenderer {
    /// Render one frame and return where it was written.
    fn save_snapshot(&mut self, r: &[f64]) -> Result<PathBuf>;

    /// Frames written so far.
    fn frames_written(&self) -> usize;
}

/// Map a value in `clim` onto a blue–white–red colour.
fn energy_to_color(value: f64, clim: (f64, f64)) -> RGBColor {
    let span = clim.1 - clim.0;
    let x = if span.abs() > 0.0 { ((value - clim.0) / span).clamp(0.0, 1.0) } else { 0.5 };

    let r = (255.0 * x) as u8;
    let b = (255.0 * (1.0 - x)) as u8;
    let g = (255.0 * (1.0 - (2.0 * (x - 0.5).abs()))).clamp(0.0, 255.0) as u8;
    RGBColor(r, g, b)
}

/// PNG frames: background energy map with the electrons on top.
///
/// Frames are numbered consecutively (`frame_00000.png`, ...) across the
/// whole sweep so they can be stitched into a movie.
pub struct PngSnapshotWriter {
    dir: PathBuf,
    /// Plot window `(x, y)` in metres
    window: Rect,
    size: (u32, u32),
    /// Background resolution
    cells: (usize, usize),
    background: Vec<f64>,
    clim: (f64, f64),
    frame: usize,
}

impl PngSnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>, window: Rect, clim: (f64, f64)) -> Self {
        Self {
            dir: dir.into(),
            window,
            size: (400, 600),
            cells: (100, 30),
            background: Vec::new(),
            clim,
            frame: 0,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Continue numbering at `frame`, e.g. when a sweep is resumed.
    pub fn with_first_frame(mut self, frame: usize) -> Self {
        self.frame = frame;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sample the voltage-scaled external energy on the background grid.
    pub fn set_background<F: ExternalField>(&mut self, field: &F, voltage: f64) {
        let (nx, ny) = self.cells;
        let dx = (self.window.x.1 - self.window.x.0) / nx as f64;
        let dy = (self.window.y.1 - self.window.y.0) / ny as f64;
        self.background = (0..ny)
            .flat_map(|j| (0..nx).map(move |i| (i, j)))
            .map(|(i, j)| {
                let x = self.window.x.0 + (i as f64 + 0.5) * dx;
                let y = self.window.y.0 + (j as f64 + 0.5) * dy;
                voltage * field.value(x, y)
            })
            .collect();
    }

    fn frame_path(&self) -> PathBuf {
        self.dir.join(format!("frame_{:05}.png", self.frame))
    }

    fn draw(&self, path: &Path, r: &[f64]) -> std::result::Result<(), String> {
        let to_um = 1e6;
        let (x0, x1) = (self.window.x.0 * to_um, self.window.x.1 * to_um);
        let (y0, y1) = (self.window.y.0 * to_um, self.window.y.1 * to_um);

        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(|e| e.to_string())?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(|e| e.to_string())?;

        let (nx, ny) = self.cells;
        if self.background.len() == nx * ny {
            let dx = (x1 - x0) / nx as f64;
            let dy = (y1 - y0) / ny as f64;
            chart
                .draw_series(self.background.iter().enumerate().map(|(k, &value)| {
                    let (i, j) = (k % nx, k / nx);
                    let xa = x0 + i as f64 * dx;
                    let ya = y0 + j as f64 * dy;
                    Rectangle::new(
                        [(xa, ya), (xa + dx, ya + dy)],
                        energy_to_color(value, self.clim).filled(),
                    )
                }))
                .map_err(|e| e.to_string())?;
        }

        chart
            .draw_series(
                r.chunks_exact(2)
                    .map(|p| Circle::new((p[0] * to_um, p[1] * to_um), 3, RGBColor(0, 191, 255).filled())),
            )
            .map_err(|e| e.to_string())?;

        root.present().map_err(|e| e.to_string())?;
        Ok(())
    }
}

impl SnapshotRenderer for PngSnapshotWriter {
    fn save_snapshot(&mut self, r: &[f64]) -> Result<PathBuf> {
        let path = self.frame_path();
        self.draw(&path, r).map_err(SweepError::Render)?;
        self.frame += 1;
        Ok(path)
    }

    fn frames_written(&self) -> usize {
        self.frame
    }
}

/// Number of consecutive `frame_%05d.png` files in `dir`, starting at 0.
///
/// This is where a resumed writer continues, so the pattern input of
/// [`make_movie`] sees no gap.
pub fn count_frames(dir: &Path) -> usize {
    (0..)
        .take_while(|&k| dir.join(format!("frame_{:05}.png", k)).is_file())
        .count()
}

/// Stitch `frame_%05d.png` files in `frames_dir` into an MP4 with ffmpeg.
pub fn make_movie(ffmpeg: &str, frames_dir: &Path, output: &Path, fps: u32) -> Result<()> {
    let pattern = frames_dir.join("frame_%05d.png");
    let fps = fps.to_string();
    let status = Command::new(ffmpeg)
        .arg("-y")
        .args(["-framerate", fps.as_str()])
        .arg("-i")
        .arg(&pattern)
        .args(["-pix_fmt", "yuv420p"])
        .arg(output)
        .status()
        .map_err(|e| SweepError::io(ffmpeg, e))?;

    if !status.success() {
        return Err(SweepError::Render(format!("ffmpeg exited with status {:?}", status.code())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::HarmonicField;

    fn resonator_trap() -> TrapClassifier {
        TrapClassifier::new(Rect { x: (-0.5e-6, 0.5e-6), y: (-20e-6, 20e-6) })
    }

    #[test]
    fn test_trapped_and_untrapped_sum_to_total() {
        let trap = resonator_trap();
        let r: Vec<f64> = (0..60)
            .flat_map(|i| {
                let x = -1.8e-6 + i as f64 * 0.06e-6;
                let y = (i as f64 - 30.0) * 0.9e-6;
                [x, y]
            })
            .collect();
        let trapped = trap.get_trapped_electrons(&r);
        let untrapped = trap.get_untrapped_electrons(&r);
        assert!(trapped > 0 && untrapped > 0);
        assert_eq!(trapped + untrapped, 60);
    }

    #[test]
    fn test_trap_boundary_is_inclusive() {
        let trap = resonator_trap();
        assert_eq!(trap.get_trapped_electrons(&[0.5e-6, 20e-6]), 1);
        assert_eq!(trap.get_trapped_electrons(&[0.51e-6, 0.0]), 0);
    }

    #[test]
    fn test_density_by_area() {
        let trap = TrapClassifier::new(Rect { x: (0.0, 2.0), y: (0.0, 5.0) });
        let r = [1.0, 1.0, 1.5, 4.0, 3.0, 1.0];
        assert_eq!(trap.electron_density_by_area(&r), 0.2);
    }

    #[test]
    fn test_unbounded_electrons() {
        let r = [0.0, 0.0, 2.0, 0.0, 0.0, -3.0, 1.0, 1.0];
        assert_eq!(check_unbounded_electrons(&r, (-1.0, 1.0), (-1.0, 1.0)), 2);
    }

    #[test]
    fn test_color_map_endpoints() {
        let low = energy_to_color(-1.0, (-1.0, 0.0));
        let high = energy_to_color(5.0, (-1.0, 0.0));
        assert_eq!((low.0, low.1, low.2), (0, 0, 255));
        assert_eq!((high.0, high.1, high.2), (255, 0, 0));
    }

    #[test]
    fn test_png_writer_numbers_frames() {
        let dir = tempfile::tempdir().unwrap();
        let window = Rect { x: (-1.8e-6, 1.8e-6), y: (-2e-6, 2e-6) };
        let mut writer = PngSnapshotWriter::new(dir.path(), window, (-1.0, 0.0)).with_size(80, 120);
        writer.set_background(&HarmonicField { kx: 1e11, ky: 0.0 }, -1.0);
        let first = writer.save_snapshot(&[0.0, 0.0, 0.5e-6, 1e-6]).unwrap();
        let second = writer.save_snapshot(&[0.1e-6, 0.0]).unwrap();
        assert!(first.ends_with("frame_00000.png"));
        assert!(second.ends_with("frame_00001.png"));
        assert!(first.exists() && second.exists());
        assert_eq!(writer.frames_written(), 2);
    }

    #[test]
    fn test_count_frames_stops_at_first_gap() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(count_frames(dir.path()), 0);
        for k in [0, 1, 3] {
            std::fs::write(dir.path().join(format!("frame_{:05}.png", k)), b"").unwrap();
        }
        std::fs::write(dir.path().join("frame_notes.txt"), b"").unwrap();
        assert_eq!(count_frames(dir.path()), 2);
    }
}
