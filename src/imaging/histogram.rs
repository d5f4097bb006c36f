//! Channel histograms.
//!
//! Displays the normalized distribution of one channel as vertical bars
//! under a title, with labelled axes, markers at the channel mean and
//! median, and a box stating both values.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use std::path::Path;
use std::sync::Arc;

use super::text::FigureFont;
use crate::error::{AnalyzerError, Result};

/// Bar color of every channel figure
pub const BAR_BLUE: Rgb<u8> = Rgb([31, 119, 180]);

/// What to draw for one channel
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSpec {
    /// Number of equal-width bins over the 0-255 sample range
    pub bins: usize,
    pub color: Rgb<u8>,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Channel mean, marked and stated in the statistics box
    pub mean: Option<f64>,
    /// Channel median, marked and stated in the statistics box
    pub median: Option<f64>,
    pub mean_label: String,
    pub median_label: String,
}

impl HistogramSpec {
    /// Lines of the statistics box, e.g. `"   Mean: 127.5"`
    fn summary_lines(&self) -> Vec<String> {
        [(&self.mean_label, self.mean), (&self.median_label, self.median)]
            .into_iter()
            .filter_map(|(label, value)| value.map(|v| format!("{:>7}: {:>5.1}", label, v)))
            .collect()
    }
}

/// A rendered histogram, ready to persist
#[derive(Debug, Clone)]
pub struct HistogramArtifact {
    pub title: String,
    pub raster: RgbImage,
}

/// Produces and saves histogram artifacts.
///
/// Rendering and persisting fail independently; neither touches statistics.
pub trait RenderSink: Send + Sync {
    fn render(&self, samples: &[u8], spec: &HistogramSpec) -> Result<HistogramArtifact>;
    fn persist(&self, artifact: &HistogramArtifact, path: &Path) -> Result<()>;
}

/// Draws histograms into an RGB raster and saves them as PNG
#[derive(Clone)]
pub struct PngHistogramSink {
    width: u32,
    height: u32,
    font: Arc<FigureFont>,
}

pub const DEFAULT_FIGURE_WIDTH: u32 = 640;
pub const DEFAULT_FIGURE_HEIGHT: u32 = 480;

impl Default for PngHistogramSink {
    /// Default size with the bitmap glyphs; no system lookup
    fn default() -> Self {
        Self::new(
            DEFAULT_FIGURE_WIDTH,
            DEFAULT_FIGURE_HEIGHT,
            Arc::new(FigureFont::Bitmap),
        )
    }
}

// Bands around the plot area
const TITLE_BAND: u32 = 36;
const X_LABEL_BAND: u32 = 40;
const Y_LABEL_BAND: u32 = 40;
const RIGHT_PAD: u32 = 16;

const TITLE_SIZE: f32 = 16.0;
const LABEL_SIZE: f32 = 14.0;
const SUMMARY_SIZE: f32 = 11.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);
const MEAN_MARKER: Rgb<u8> = Rgb([214, 39, 40]);
const MEDIAN_MARKER: Rgb<u8> = Rgb([44, 160, 44]);

/// Pixel rectangle the bars are drawn in
#[derive(Debug, Clone, Copy)]
struct PlotArea {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

impl PlotArea {
    fn bottom(&self) -> u32 {
        self.top + self.height
    }

    /// Column of a sample value on the 0-256 axis
    fn x_of(&self, value: f64) -> u32 {
        let offset = (value / 256.0) * self.width as f64;
        self.left + offset.clamp(0.0, (self.width - 1) as f64) as u32
    }
}

impl PngHistogramSink {
    pub fn new(width: u32, height: u32, font: Arc<FigureFont>) -> Self {
        Self {
            width: width.max(Y_LABEL_BAND + RIGHT_PAD + 1),
            height: height.max(TITLE_BAND + X_LABEL_BAND + 1),
            font,
        }
    }

    fn plot_area(&self) -> PlotArea {
        PlotArea {
            left: Y_LABEL_BAND,
            top: TITLE_BAND,
            width: self.width - Y_LABEL_BAND - RIGHT_PAD,
            height: self.height - TITLE_BAND - X_LABEL_BAND,
        }
    }

    fn draw_bars(&self, raster: &mut RgbImage, area: PlotArea, densities: &[f64], color: Rgb<u8>) {
        let max_density = densities.iter().copied().fold(0.0f64, f64::max);
        if max_density <= 0.0 {
            return;
        }

        let bins = densities.len() as u64;
        for (bin, &density) in densities.iter().enumerate() {
            let x0 = area.left + (bin as u64 * area.width as u64 / bins) as u32;
            let x1 = area.left + ((bin as u64 + 1) * area.width as u64 / bins) as u32;
            let bar_height = ((density / max_density) * area.height as f64).round() as u32;
            if bar_height == 0 {
                continue;
            }
            let bar = Rect::at(x0 as i32, (area.bottom() - bar_height) as i32)
                .of_size((x1 - x0).max(1), bar_height);
            draw_filled_rect_mut(raster, bar, color);
        }
    }

    fn draw_labels(&self, raster: &mut RgbImage, area: PlotArea, spec: &HistogramSpec) {
        let font = &self.font;

        let (title_width, title_height) = font.text_size(TITLE_SIZE, &spec.title);
        let title_x = (self.width as i32 - title_width as i32) / 2;
        let title_y = (TITLE_BAND as i32 - title_height as i32) / 2;
        font.draw(raster, INK, title_x.max(0), title_y, TITLE_SIZE, &spec.title);

        let (x_width, x_height) = font.text_size(LABEL_SIZE, &spec.x_label);
        let x_label_x = area.left as i32 + (area.width as i32 - x_width as i32) / 2;
        let x_label_y = area.bottom() as i32 + (X_LABEL_BAND as i32 - x_height as i32) / 2;
        font.draw(raster, INK, x_label_x.max(0), x_label_y, LABEL_SIZE, &spec.x_label);

        // Rotated: the text width runs down the left band
        let (y_width, y_height) = font.text_size(LABEL_SIZE, &spec.y_label);
        let y_label_x = (Y_LABEL_BAND as i32 - y_height as i32) / 2;
        let y_label_y = area.top as i32 + (area.height as i32 - y_width as i32) / 2;
        font.draw_vertical(raster, INK, y_label_x, y_label_y.max(0), LABEL_SIZE, &spec.y_label);
    }

    /// White box with the mean and median in the plot's top-left corner.
    fn draw_summary(&self, raster: &mut RgbImage, area: PlotArea, spec: &HistogramSpec) {
        let lines = spec.summary_lines();
        if lines.is_empty() {
            return;
        }

        let padding = 4u32;
        let sizes: Vec<(u32, u32)> = lines
            .iter()
            .map(|line| self.font.text_size(SUMMARY_SIZE, line))
            .collect();
        let text_width = sizes.iter().map(|(w, _)| *w).max().unwrap_or(0);
        let line_height = sizes.iter().map(|(_, h)| *h).max().unwrap_or(0) + 2;

        let box_x = area.left as i32 + 6;
        let box_y = area.top as i32 + 6;
        let frame = Rect::at(box_x, box_y).of_size(
            text_width + 2 * padding,
            line_height * lines.len() as u32 + 2 * padding,
        );
        draw_filled_rect_mut(raster, frame, BACKGROUND);
        draw_hollow_rect_mut(raster, frame, INK);

        for (i, line) in lines.iter().enumerate() {
            let y = box_y + padding as i32 + (i as u32 * line_height) as i32;
            self.font
                .draw(raster, INK, box_x + padding as i32, y, SUMMARY_SIZE, line);
        }
    }
}

impl RenderSink for PngHistogramSink {
    fn render(&self, samples: &[u8], spec: &HistogramSpec) -> Result<HistogramArtifact> {
        if spec.bins == 0 {
            return Err(AnalyzerError::Config(
                "histogram needs at least one bin".to_string(),
            ));
        }

        let densities = densities(samples, spec.bins);
        let area = self.plot_area();
        let mut raster = RgbImage::from_pixel(self.width, self.height, BACKGROUND);

        self.draw_bars(&mut raster, area, &densities, spec.color);

        for (value, color) in [(spec.mean, MEAN_MARKER), (spec.median, MEDIAN_MARKER)] {
            if let Some(value) = value {
                let x = area.x_of(value) as f32;
                draw_line_segment_mut(
                    &mut raster,
                    (x, area.top as f32),
                    (x, (area.bottom() - 1) as f32),
                    color,
                );
            }
        }

        // Axes
        let (left, bottom) = ((area.left - 1) as f32, area.bottom() as f32);
        draw_line_segment_mut(&mut raster, (left, bottom), ((area.left + area.width) as f32, bottom), INK);
        draw_line_segment_mut(&mut raster, (left, area.top as f32), (left, bottom), INK);

        self.draw_summary(&mut raster, area, spec);
        self.draw_labels(&mut raster, area, spec);

        Ok(HistogramArtifact {
            title: spec.title.clone(),
            raster,
        })
    }

    fn persist(&self, artifact: &HistogramArtifact, path: &Path) -> Result<()> {
        tracing::debug!(title = %artifact.title, path = %path.display(), "saving histogram");
        artifact
            .raster
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|source| AnalyzerError::Render {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Normalized histogram of 8-bit samples over `bins` equal-width bins.
///
/// Each density is `count / (n * bin_width)`, so the bars integrate to 1.
pub fn densities(samples: &[u8], bins: usize) -> Vec<f64> {
    let mut counts = vec![0u64; bins];
    for &sample in samples {
        counts[sample as usize * bins / 256] += 1;
    }

    if samples.is_empty() {
        return vec![0.0; bins];
    }

    let bin_width = 256.0 / bins as f64;
    let scale = 1.0 / (samples.len() as f64 * bin_width);
    counts.into_iter().map(|c| c as f64 * scale).collect()
}
