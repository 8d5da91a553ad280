//! Seamless row compositor.
//!
//! Places `n` equally sized images left to right, image `i` at
//! `x = i * (w - overlap)`, into a zeroed row buffer. The first `overlap`
//! columns of each image cross-fade over what is already in the buffer with
//! weight `alpha = x / overlap` on the new image; the remaining columns
//! overwrite. Blending is done in f64 and truncated to u8.
//!
//! The first image has no predecessor, so by default its leading band fades in
//! from the black background. `LeadingEdge::Overwrite` copies it instead.

use image::RgbImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

const CHANNELS: usize = 3;

/// Treatment of the first image's leading overlap band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadingEdge {
    /// Cross-fade against the zeroed background, like every other band.
    #[default]
    BlendBackground,
    /// Copy the band unchanged.
    Overwrite,
}

/// Width of a row of `count` images of width `width`.
pub fn row_width(width: u32, count: usize, overlap: u32) -> u64 {
    if count == 0 {
        return 0;
    }
    width as u64 * count as u64 - overlap as u64 * (count as u64 - 1)
}

/// Composite `images` into one row with the default leading-edge behaviour.
pub fn compose_row(images: &[RgbImage], overlap: u32) -> Result<RgbImage, LayoutError> {
    compose_row_with(images, overlap, LeadingEdge::default())
}

pub fn compose_row_with(
    images: &[RgbImage],
    overlap: u32,
    leading_edge: LeadingEdge,
) -> Result<RgbImage, LayoutError> {
    let (w, h) = check_uniform(images)?;
    if overlap >= w {
        return Err(LayoutError::InvalidOverlap { overlap, width: w });
    }

    let total = row_width(w, images.len(), overlap);
    let out_width = u32::try_from(total).map_err(|_| LayoutError::RowTooWide { width: total })?;
    let step = (w - overlap) as usize * CHANNELS;
    let band = overlap as usize * CHANNELS;
    let src_stride = w as usize * CHANNELS;
    let dst_stride = out_width as usize * CHANNELS;

    // Per-byte blend weights for the overlap band; channel bytes share their column's weight.
    let weights: Vec<f64> = (0..overlap)
        .flat_map(|x| std::iter::repeat_n(x as f64 / overlap as f64, CHANNELS))
        .collect();

    let mut buffer = vec![0u8; dst_stride * h as usize];
    buffer
        .par_chunks_exact_mut(dst_stride)
        .enumerate()
        .for_each(|(y, dst_row)| {
            for (i, image) in images.iter().enumerate() {
                let src_row = &image.as_raw()[y * src_stride..(y + 1) * src_stride];
                let dst = &mut dst_row[i * step..i * step + src_stride];
                let (src_band, src_rest) = src_row.split_at(band);
                let (dst_band, dst_rest) = dst.split_at_mut(band);
                if i == 0 && leading_edge == LeadingEdge::Overwrite {
                    dst_band.copy_from_slice(src_band);
                } else {
                    blend_band(dst_band, src_band, &weights);
                }
                dst_rest.copy_from_slice(src_rest);
            }
        });

    RgbImage::from_raw(out_width, h, buffer).ok_or(LayoutError::EmptyRow)
}

/// `dst = dst * (1 - alpha) + src * alpha`, truncated.
fn blend_band(dst: &mut [u8], src: &[u8], weights: &[f64]) {
    for ((d, &s), &alpha) in dst.iter_mut().zip(src).zip(weights) {
        *d = (*d as f64 * (1.0 - alpha) + s as f64 * alpha) as u8;
    }
}

fn check_uniform(images: &[RgbImage]) -> Result<(u32, u32), LayoutError> {
    let first = images.first().ok_or(LayoutError::EmptyRow)?;
    let (width, height) = first.dimensions();
    for (index, image) in images.iter().enumerate().skip(1) {
        let (actual_width, actual_height) = image.dimensions();
        if (actual_width, actual_height) != (width, height) {
            return Err(LayoutError::DimensionMismatch {
                index,
                width,
                height,
                actual_width,
                actual_height,
            });
        }
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

    fn solid(w: u32, h: u32, color: Rgb<u8>) -> RgbImage {
        RgbImage::from_pixel(w, h, color)
    }

    /// Direct transcription of the per-pixel definition, for comparison.
    fn reference_row(images: &[RgbImage], overlap: u32) -> RgbImage {
        let (w, h) = images[0].dimensions();
        let out_w = row_width(w, images.len(), overlap) as u32;
        let mut out = RgbImage::new(out_w, h);
        for (i, img) in images.iter().enumerate() {
            let x_offset = i as u32 * (w - overlap);
            for y in 0..h {
                for x in 0..w {
                    let alpha = if x < overlap {
                        x as f64 / overlap as f64
                    } else {
                        1.0
                    };
                    let old = *out.get_pixel(x_offset + x, y);
                    let new = img.get_pixel(x, y);
                    let mut px = [0u8; 3];
                    for c in 0..3 {
                        px[c] = (old[c] as f64 * (1.0 - alpha) + new[c] as f64 * alpha) as u8;
                    }
                    out.put_pixel(x_offset + x, y, Rgb(px));
                }
            }
        }
        out
    }

    fn gradient(w: u32, h: u32, seed: u8) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                (x as u8).wrapping_mul(7).wrapping_add(seed),
                (y as u8).wrapping_mul(13).wrapping_add(seed),
                ((x + y) as u8).wrapping_mul(3) ^ seed,
            ])
        })
    }

    #[test]
    fn width_follows_overlap_formula() {
        for n in 1..=5 {
            let images: Vec<_> = (0..n).map(|i| gradient(20, 3, i as u8)).collect();
            let row = compose_row(&images, 7).unwrap();
            assert_eq!(row.width() as u64, 20 * n as u64 - 7 * (n as u64 - 1));
            assert_eq!(row.height(), 3);
        }
    }

    #[test]
    fn blend_ramp_between_two_solids() {
        let row = compose_row(&[solid(20, 1, RED), solid(20, 1, GREEN)], 10).unwrap();
        assert_eq!(row.width(), 30);

        // Second image's band occupies output columns 10..20.
        assert_eq!(row.get_pixel(10, 0), &RED);
        assert_eq!(row.get_pixel(19, 0), &Rgb([25, 229, 0]));
        let reds: Vec<u8> = (10..20).map(|x| row.get_pixel(x, 0)[0]).collect();
        let greens: Vec<u8> = (10..20).map(|x| row.get_pixel(x, 0)[1]).collect();
        assert!(reds.windows(2).all(|p| p[0] >= p[1]));
        assert!(greens.windows(2).all(|p| p[0] <= p[1]));
        assert_eq!(row.get_pixel(25, 0), &GREEN);
    }

    #[test]
    fn first_band_fades_in_from_black_by_default() {
        let row = compose_row(&[solid(20, 1, RED), solid(20, 1, GREEN)], 10).unwrap();
        assert_eq!(row.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(row.get_pixel(5, 0), &Rgb([127, 0, 0]));
    }

    #[test]
    fn overwrite_leading_edge_copies_first_band() {
        let row = compose_row_with(
            &[solid(20, 1, RED), solid(20, 1, GREEN)],
            10,
            LeadingEdge::Overwrite,
        )
        .unwrap();
        assert_eq!(row.get_pixel(0, 0), &RED);
        assert_eq!(row.get_pixel(5, 0), &RED);
        // Later bands still blend.
        assert_eq!(row.get_pixel(19, 0), &Rgb([25, 229, 0]));
    }

    #[test]
    fn matches_per_pixel_definition() {
        let images: Vec<_> = (0..4).map(|i| gradient(17, 5, 40 * i)).collect();
        for overlap in [0, 1, 6, 16] {
            assert_eq!(
                compose_row(&images, overlap).unwrap(),
                reference_row(&images, overlap),
                "overlap {}",
                overlap
            );
        }
    }

    #[test]
    fn output_is_deterministic() {
        let images: Vec<_> = (0..6).map(|i| gradient(32, 9, i * 11)).collect();
        let a = compose_row(&images, 12).unwrap();
        let b = compose_row(&images, 12).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn zero_overlap_concatenates() {
        let row = compose_row(&[solid(4, 2, RED), solid(4, 2, GREEN)], 0).unwrap();
        assert_eq!(row.dimensions(), (8, 2));
        assert_eq!(row.get_pixel(3, 1), &RED);
        assert_eq!(row.get_pixel(4, 1), &GREEN);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(matches!(compose_row(&[], 0), Err(LayoutError::EmptyRow)));
        assert!(matches!(
            compose_row(&[solid(4, 2, RED)], 4),
            Err(LayoutError::InvalidOverlap {
                overlap: 4,
                width: 4
            })
        ));
        assert!(matches!(
            compose_row(&[solid(4, 2, RED), solid(5, 2, RED)], 1),
            Err(LayoutError::DimensionMismatch { index: 1, .. })
        ));
    }
}
