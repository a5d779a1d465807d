//! Draws face boxes and labels onto RGB frames.

use crate::types::BoundingBox;
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BORDER: i64 = 2;
const LABEL_BAND: i64 = 35;
const TEXT_MARGIN: i64 = 6;
const GLYPH_SIZE: i64 = 8;
const GLYPH_SCALE: i64 = 2;

/// Outline `region`, fill a label band along its bottom edge and write `label` in it.
///
/// Anything falling outside the image is clipped.
pub fn draw_face(image: &mut RgbImage, region: &BoundingBox, label: &str) {
    let left = region.x.round() as i64;
    let top = region.y.round() as i64;
    let right = region.right().round() as i64;
    let bottom = region.bottom().round() as i64;

    fill_rect(image, left, top, right, top + BORDER, BOX_COLOR);
    fill_rect(image, left, bottom - BORDER, right, bottom, BOX_COLOR);
    fill_rect(image, left, top, left + BORDER, bottom, BOX_COLOR);
    fill_rect(image, right - BORDER, top, right, bottom, BOX_COLOR);

    fill_rect(image, left, bottom - LABEL_BAND, right, bottom, BOX_COLOR);
    draw_text(
        image,
        left + TEXT_MARGIN,
        bottom - TEXT_MARGIN - GLYPH_SIZE * GLYPH_SCALE,
        label,
        TEXT_COLOR,
    );
}

/// Fill the half-open rectangle `[x0, x1) × [y0, y1)`.
fn fill_rect(image: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn draw_text(image: &mut RgbImage, x: i64, y: i64, text: &str, color: Rgb<u8>) {
    let advance = GLYPH_SIZE * GLYPH_SCALE;
    for (i, ch) in text.chars().enumerate() {
        let glyph = BASIC_FONTS
            .get(ch)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);
        let gx = x + i as i64 * advance;

        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let px = gx + col * GLYPH_SCALE;
                let py = y + row as i64 * GLYPH_SCALE;
                fill_rect(image, px, py, px + GLYPH_SCALE, py + GLYPH_SCALE, color);
            }
        }
    }
}
