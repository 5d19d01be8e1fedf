//! Debug artifacts written next to a run: roster dumps and annotated click
//! targets. None of this feeds back into navigation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{DynamicImage, Rgba, RgbaImage};
use serde::Serialize;
use tracing::debug;

use crate::geometry::ResolvedLocation;
use crate::roster::Roster;

const OUTLINE: Rgba<u8> = Rgba([255, 59, 48, 255]);
const LABEL_BG: Rgba<u8> = Rgba([0, 0, 0, 170]);
const LABEL_FG: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// `<dir>/<army>_oob.json`
pub fn dump_roster(roster: &Roster, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(format!("{}_oob.json", roster.army));
    write_json_pretty(&path, roster)?;
    debug!("{} roster dumped to {}", roster.army, path.display());
    Ok(path)
}

/// Save `image` with the click target outlined and labelled under `<dir>/clicks/`.
pub fn annotate_click(
    image: &DynamicImage,
    location: &ResolvedLocation,
    label: &str,
    dir: &Path,
) -> Result<PathBuf> {
    let mut img = image.to_rgba8();
    let bbox = location.bbox;
    draw_rect_outline(
        &mut img,
        bbox.left().max(0) as u32,
        bbox.top().max(0) as u32,
        bbox.width().max(1) as u32,
        bbox.height().max(1) as u32,
        OUTLINE,
        2,
    );
    draw_crosshair(&mut img, location.x, location.y, 6, OUTLINE);

    let text_y = (bbox.top() - 12).max(0);
    let text_w = label.chars().count() as i32 * 8;
    fill_rect_alpha(
        &mut img,
        bbox.left() - 2,
        text_y - 2,
        bbox.left() + text_w + 2,
        text_y + 9,
        LABEL_BG,
    );
    draw_bitmap_text(&mut img, bbox.left(), text_y, label, LABEL_FG);

    let path = dir.join("clicks").join(format!(
        "{}-{}.png",
        timestamp_millis(),
        slugify(label)
    ));
    ensure_parent_dir(&path)?;
    DynamicImage::ImageRgba8(img)
        .save(&path)
        .with_context(|| format!("failed to save click artifact: {}", path.display()))?;
    Ok(path)
}

pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(path, raw).with_context(|| format!("failed to write JSON: {}", path.display()))?;
    Ok(())
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() || matches!(lower, '.' | '_' | '-') {
            out.push(lower);
        } else if lower.is_ascii_whitespace() || lower == '/' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "target".to_string()
    } else {
        out
    }
}

pub fn timestamp_millis() -> String {
    Utc::now().format("%Y%m%d-%H%M%S%.3f").to_string()
}

fn draw_rect_outline(
    img: &mut RgbaImage,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    color: Rgba<u8>,
    thickness: u32,
) {
    if w == 0 || h == 0 || img.width() == 0 || img.height() == 0 {
        return;
    }
    let img_w = img.width();
    let img_h = img.height();

    let x0 = x.min(img_w - 1);
    let y0 = y.min(img_h - 1);
    let x1 = (x + w.saturating_sub(1)).min(img_w - 1);
    let y1 = (y + h.saturating_sub(1)).min(img_h - 1);

    for t in 0..thickness.max(1) {
        let tx0 = x0.saturating_sub(t);
        let ty0 = y0.saturating_sub(t);
        let tx1 = (x1 + t).min(img_w - 1);
        let ty1 = (y1 + t).min(img_h - 1);

        for xx in tx0..=tx1 {
            img.put_pixel(xx, ty0, color);
            img.put_pixel(xx, ty1, color);
        }
        for yy in ty0..=ty1 {
            img.put_pixel(tx0, yy, color);
            img.put_pixel(tx1, yy, color);
        }
    }
}

fn draw_crosshair(img: &mut RgbaImage, cx: i32, cy: i32, arm: i32, color: Rgba<u8>) {
    for d in -arm..=arm {
        put_clipped(img, cx + d, cy, color);
        put_clipped(img, cx, cy + d, color);
    }
}

fn put_clipped(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && x < img.width() as i32 && y < img.height() as i32 {
        let dst = *img.get_pixel(x as u32, y as u32);
        img.put_pixel(x as u32, y as u32, blend_pixel(dst, color));
    }
}

fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = f64::from(src[3]) / 255.0;
    if a <= 0.0 {
        return dst;
    }
    let inv = 1.0 - a;
    let mix = |d: u8, s: u8| (f64::from(d) * inv + f64::from(s) * a).round().clamp(0.0, 255.0) as u8;
    let out_a = (f64::from(dst[3]) + f64::from(src[3]) * inv)
        .round()
        .clamp(0.0, 255.0) as u8;
    Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), out_a])
}

fn fill_rect_alpha(img: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    for y in y0.min(y1)..=y0.max(y1) {
        for x in x0.min(x1)..=x0.max(x1) {
            put_clipped(img, x, y, color);
        }
    }
}

fn draw_bitmap_text(img: &mut RgbaImage, x: i32, y: i32, text: &str, color: Rgba<u8>) {
    let mut cursor_x = x;
    for ch in text.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += 8;
            continue;
        };
        for (row_idx, row) in glyph.iter().enumerate() {
            for col_idx in 0..8 {
                if (*row >> col_idx) & 1 == 1 {
                    put_clipped(img, cursor_x + col_idx, y + row_idx as i32, color);
                }
            }
        }
        cursor_x += 8;
    }
}
