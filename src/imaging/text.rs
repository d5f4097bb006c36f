//! Text drawing for histogram figures.
//!
//! Figures are labelled with a scalable font when one is available, either
//! named on the command line or found in the system font database. Without
//! one, the built-in 8x8 bitmap glyphs are used; characters they do not
//! cover (kanji among them) are drawn as hollow boxes.

use ab_glyph::FontVec;
use font8x8::{UnicodeFonts, BASIC_FONTS, HIRAGANA_FONTS, LATIN_FONTS};
use image::{imageops, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size, Canvas};
use imageproc::rect::Rect;
use std::path::Path;

use crate::error::{AnalyzerError, Result};

/// Families tried, in order, when no font file is given
const PREFERRED_FAMILIES: [&str; 9] = [
    "Noto Sans CJK JP",
    "Noto Sans JP",
    "IPAexGothic",
    "IPAGothic",
    "Hiragino Sans",
    "Yu Gothic",
    "DejaVu Sans",
    "Liberation Sans",
    "Arial",
];

/// Glyph for characters the bitmap fonts lack
const MISSING_GLYPH: [u8; 8] = [0x7E, 0x42, 0x42, 0x42, 0x42, 0x42, 0x7E, 0x00];

/// Font used for figure titles, axis labels and the statistics box
pub enum FigureFont {
    Outline { font: FontVec, name: String },
    Bitmap,
}

impl FigureFont {
    /// Use the font file at `path` if given, otherwise search the system.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::discover()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| AnalyzerError::io(path, e))?;
        let font = FontVec::try_from_vec(data).map_err(|e| AnalyzerError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let name = path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Ok(FigureFont::Outline { font, name })
    }

    /// First preferred family installed on this system, or the bitmap glyphs.
    pub fn discover() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();

        let families: Vec<fontdb::Family> = PREFERRED_FAMILIES
            .iter()
            .map(|name| fontdb::Family::Name(name))
            .collect();
        let query = fontdb::Query {
            families: &families,
            ..Default::default()
        };

        let Some(id) = db.query(&query) else {
            tracing::debug!("no preferred font family installed; using bitmap glyphs");
            return FigureFont::Bitmap;
        };
        let name = db
            .face(id)
            .and_then(|face| face.families.first())
            .map(|(family, _)| family.clone())
            .unwrap_or_default();
        let font = db
            .with_face_data(id, |data, index| {
                FontVec::try_from_vec_and_index(data.to_vec(), index).ok()
            })
            .flatten();

        match font {
            Some(font) => FigureFont::Outline { font, name },
            None => {
                tracing::warn!("font '{}' could not be parsed; using bitmap glyphs", name);
                FigureFont::Bitmap
            }
        }
    }

    /// Human-readable name for logs
    pub fn describe(&self) -> &str {
        match self {
            FigureFont::Outline { name, .. } => name,
            FigureFont::Bitmap => "built-in 8x8 bitmap",
        }
    }

    /// Width and height of `text` drawn at `size` pixels.
    pub fn text_size(&self, size: f32, text: &str) -> (u32, u32) {
        match self {
            FigureFont::Outline { font, .. } => text_size(size, font, text),
            FigureFont::Bitmap => {
                let cell = 8 * bitmap_scale(size);
                (text.chars().count() as u32 * cell, cell)
            }
        }
    }

    /// Draw `text` left to right with its top-left corner at `(x, y)`.
    /// Anything outside the canvas is clipped.
    pub fn draw<C>(&self, canvas: &mut C, color: C::Pixel, x: i32, y: i32, size: f32, text: &str)
    where
        C: Canvas,
        C::Pixel: image::Pixel<Subpixel = u8>,
    {
        match self {
            FigureFont::Outline { font, .. } => draw_text_mut(canvas, color, x, y, size, font, text),
            FigureFont::Bitmap => draw_bitmap(canvas, color, x, y, size, text),
        }
    }

    /// Draw `text` reading bottom to top, with the rotated block's top-left
    /// corner at `(x, y)`.
    pub fn draw_vertical(
        &self,
        canvas: &mut RgbImage,
        color: Rgb<u8>,
        x: i32,
        y: i32,
        size: f32,
        text: &str,
    ) {
        let (width, height) = self.text_size(size, text);
        if width == 0 || height == 0 {
            return;
        }

        let mut strip = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
        self.draw(&mut strip, Rgba([color[0], color[1], color[2], 255]), 0, 0, size, text);
        let rotated = imageops::rotate270(&strip);

        for (dx, dy, pixel) in rotated.enumerate_pixels() {
            let alpha = pixel[3];
            if alpha == 0 {
                continue;
            }
            let (px, py) = (x + dx as i32, y + dy as i32);
            if px < 0 || py < 0 || px as u32 >= canvas.width() || py as u32 >= canvas.height() {
                continue;
            }
            let under = canvas.get_pixel_mut(px as u32, py as u32);
            *under = blend(*under, color, alpha);
        }
    }
}

/// Integer pixel scale that brings 8x8 glyphs closest to `size`
fn bitmap_scale(size: f32) -> u32 {
    ((size / 8.0).round() as u32).max(1)
}

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| HIRAGANA_FONTS.get(c))
        .unwrap_or(MISSING_GLYPH)
}

fn draw_bitmap<C: Canvas>(canvas: &mut C, color: C::Pixel, x: i32, y: i32, size: f32, text: &str) {
    let scale = bitmap_scale(size);
    let advance = 8 * scale as i32;

    for (i, c) in text.chars().enumerate() {
        let origin_x = x + i as i32 * advance;
        for (row, bits) in glyph(c).iter().enumerate() {
            // Bit 0 is the leftmost pixel of the row
            for col in 0..8u32 {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let cell = Rect::at(
                    origin_x + (col * scale) as i32,
                    y + (row as u32 * scale) as i32,
                )
                .of_size(scale, scale);
                draw_filled_rect_mut(canvas, cell, color);
            }
        }
    }
}

fn blend(under: Rgb<u8>, over: Rgb<u8>, alpha: u8) -> Rgb<u8> {
    let a = alpha as u32;
    let mix = |u: u8, o: u8| ((u as u32 * (255 - a) + o as u32 * a + 127) / 255) as u8;
    Rgb([
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
    ])
}
