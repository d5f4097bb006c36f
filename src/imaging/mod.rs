/// Image-facing collaborators of the pipeline
///
/// This module handles:
/// - Splitting a decoded image into hue, saturation and brightness planes (extract.rs)
/// - Rendering and saving channel histograms (histogram.rs)
/// - Drawing figure text with a system font or built-in glyphs (text.rs)
/// - Saving a channel plane as a grayscale image

pub mod extract;
pub mod histogram;
pub mod text;

pub use extract::{ChannelExtractor, HsvExtractor};
pub use histogram::{
    HistogramSpec, PngHistogramSink, RenderSink, BAR_BLUE, DEFAULT_FIGURE_HEIGHT,
    DEFAULT_FIGURE_WIDTH,
};
pub use text::FigureFont;

use image::GrayImage;
use std::path::Path;

use crate::error::{AnalyzerError, Result};

/// One of the three planes extracted from an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Hue,
    Saturation,
    Brightness,
}

impl Channel {
    /// All channels in output column order
    pub const ALL: [Channel; 3] = [Channel::Hue, Channel::Saturation, Channel::Brightness];

    pub fn index(self) -> usize {
        match self {
            Channel::Hue => 0,
            Channel::Saturation => 1,
            Channel::Brightness => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Hue => "hue",
            Channel::Saturation => "saturation",
            Channel::Brightness => "brightness",
        }
    }

    /// Suffix of the figure and channel image file names
    pub fn file_suffix(self) -> &'static str {
        match self {
            Channel::Hue => "Image_Hue.png",
            Channel::Saturation => "Image_Saturation.png",
            Channel::Brightness => "Image_Brightness.png",
        }
    }
}

/// The three channel planes of one decoded image.
///
/// Lives for a single item and is dropped once statistics and artifacts
/// have been produced.
#[derive(Debug, Clone)]
pub struct ChannelSamples {
    pub width: u32,
    pub height: u32,
    /// Human-readable description of the source (format, color type)
    pub source: String,
    /// Planes indexed by `Channel::index`, each `width * height` long
    pub planes: [Vec<u8>; 3],
}

impl ChannelSamples {
    pub fn plane(&self, channel: Channel) -> &[u8] {
        &self.planes[channel.index()]
    }

    /// Save one plane as an 8-bit grayscale PNG.
    pub fn save_plane(&self, channel: Channel, path: &Path) -> Result<()> {
        let plane = self.plane(channel).to_vec();
        let image = GrayImage::from_raw(self.width, self.height, plane).ok_or_else(|| {
            AnalyzerError::Config(format!(
                "{} plane does not match {}x{}",
                channel.name(),
                self.width,
                self.height
            ))
        })?;
        image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|source| AnalyzerError::Render {
                path: path.to_path_buf(),
                source,
            })
    }
}
