//! Letter avatars: a solid tile keyed by letter with the letter drawn on top.
//!
//! Rendering uses a built-in 5x7 bitmap font rather than a system font, so the
//! same letter always produces the same PNG bytes on every machine.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use thiserror::Error;

pub const AVATAR_SIZE: u32 = 100;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_SCALE: u32 = 8;

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("Avatar letter must be A-Z, got {0:?}")]
    InvalidLetter(char),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Background colors for A through Z.
const PALETTE: [[u8; 3]; 26] = [
    [0xFF, 0x00, 0x00],
    [0x00, 0xFF, 0x00],
    [0x00, 0x00, 0xFF],
    [0xFF, 0xFF, 0x00],
    [0x00, 0xFF, 0xFF],
    [0xFF, 0x00, 0xFF],
    [0xFF, 0xA5, 0x00],
    [0x80, 0x00, 0x80],
    [0xFF, 0xC0, 0xCB],
    [0xA5, 0x2A, 0x2A],
    [0x00, 0xFF, 0x00],
    [0x80, 0x80, 0x80],
    [0x80, 0x80, 0x00],
    [0x80, 0x00, 0x00],
    [0x00, 0x00, 0x80],
    [0x00, 0x80, 0x80],
    [0x00, 0xFF, 0xFF],
    [0xC0, 0xC0, 0xC0],
    [0xFF, 0xD7, 0x00],
    [0xFF, 0x7F, 0x50],
    [0xFA, 0x80, 0x72],
    [0x40, 0xE0, 0xD0],
    [0xE6, 0xE6, 0xFA],
    [0x4B, 0x00, 0x82],
    [0xF5, 0xF5, 0xDC],
    [0x98, 0xFF, 0x98],
];

/// 5x7 glyphs for A through Z, one byte per row, low five bits used.
#[rustfmt::skip]
const GLYPHS: [[u8; 7]; 26] = [
    [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
    [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
    [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
    [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
    [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
    [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
    [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
    [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
    [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
    [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
    [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
    [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
    [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
    [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
    [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
    [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
    [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
    [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
    [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
    [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
    [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
    [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
];

const WHITE: [u8; 3] = [0xFF, 0xFF, 0xFF];
const BLACK: [u8; 3] = [0x00, 0x00, 0x00];

fn palette_index(letter: char) -> Result<usize, AvatarError> {
    let upper = letter.to_ascii_uppercase();
    if !upper.is_ascii_uppercase() {
        return Err(AvatarError::InvalidLetter(letter));
    }
    Ok((upper as u8 - b'A') as usize)
}

/// Black text on light backgrounds, white on dark ones.
fn text_color(background: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = background.map(u32::from);
    let luma = (299 * r + 587 * g + 114 * b) / 1000;
    if luma > 186 {
        BLACK
    } else {
        WHITE
    }
}

pub fn generate_avatar(letter: char) -> Result<Vec<u8>, AvatarError> {
    let index = palette_index(letter)?;
    let background = PALETTE[index];
    let foreground = text_color(background);

    let mut img = RgbImage::from_pixel(AVATAR_SIZE, AVATAR_SIZE, Rgb(background));

    let left = (AVATAR_SIZE - GLYPH_WIDTH * GLYPH_SCALE) / 2;
    let top = (AVATAR_SIZE - GLYPH_HEIGHT * GLYPH_SCALE) / 2;
    for (row, bits) in GLYPHS[index].iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            let x0 = left + col * GLYPH_SCALE;
            let y0 = top + row as u32 * GLYPH_SCALE;
            for y in y0..y0 + GLYPH_SCALE {
                for x in x0..x0 + GLYPH_SCALE {
                    img.put_pixel(x, y, Rgb(foreground));
                }
            }
        }
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        img.as_raw(),
        AVATAR_SIZE,
        AVATAR_SIZE,
        ExtendedColorType::Rgb8,
    )?;
    Ok(png)
}

/// Avatar for a handle, keyed by its first character.
pub fn avatar_for_handle(handle: &str) -> Result<Vec<u8>, AvatarError> {
    let first = handle.chars().next().unwrap_or(' ');
    generate_avatar(first)
}
