/// Channel extraction
///
/// Decodes an image with the `image` crate and converts every pixel to
/// 8-bit HSV. The conversion reproduces the classic integer formula used by
/// common imaging libraries so that existing reports stay comparable:
/// - V = max(R, G, B)
/// - S = (max - min) / max, scaled to 0-255 and truncated
/// - H = hue fraction of a full turn, scaled to 0-255 and truncated
/// Gray pixels (max == min) get H = S = 0.
use image::ImageReader;
use std::path::Path;

use super::ChannelSamples;
use crate::error::{AnalyzerError, Result};

/// Splits an image into hue, saturation and brightness planes
pub trait ChannelExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<ChannelSamples>;
}

/// Default extractor backed by the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct HsvExtractor;

impl ChannelExtractor for HsvExtractor {
    fn extract(&self, path: &Path) -> Result<ChannelSamples> {
        let reader = ImageReader::open(path)
            .map_err(|e| AnalyzerError::io(path, e))?
            .with_guessed_format()
            .map_err(|e| AnalyzerError::io(path, e))?;
        let format = reader.format();

        let decoded = reader.decode().map_err(|source| AnalyzerError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let source = format!(
            "{} {}x{} {:?}",
            format
                .map(|f| format!("{:?}", f))
                .unwrap_or_else(|| "unknown".to_string()),
            decoded.width(),
            decoded.height(),
            decoded.color()
        );

        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        let pixel_count = (width as usize) * (height as usize);

        let mut hue = Vec::with_capacity(pixel_count);
        let mut saturation = Vec::with_capacity(pixel_count);
        let mut brightness = Vec::with_capacity(pixel_count);

        for pixel in rgb.pixels() {
            let [h, s, v] = rgb_to_hsv(pixel.0);
            hue.push(h);
            saturation.push(s);
            brightness.push(v);
        }

        Ok(ChannelSamples {
            width,
            height,
            source,
            planes: [hue, saturation, brightness],
        })
    }
}

/// Convert one 8-bit RGB pixel to 8-bit HSV.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);

    if max == min {
        return [0, 0, max];
    }

    let chroma = (max - min) as f32;
    let s = chroma / max as f32;
    let rc = (max - r) as f32 / chroma;
    let gc = (max - g) as f32 / chroma;
    let bc = (max - b) as f32 / chroma;

    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };

    // The turn fraction is computed in double precision, then narrowed.
    // Doing the scale in f64 from the narrowed value keeps 1/3 and 2/3 of a
    // turn landing on 85 and 170 instead of one below.
    let turn = ((h as f64 / 6.0 + 1.0) % 1.0) as f32;

    [
        clip8(turn as f64 * 255.0),
        clip8(s as f64 * 255.0),
        max,
    ]
}

fn clip8(value: f64) -> u8 {
    (value as i32).clamp(0, 255) as u8
}
