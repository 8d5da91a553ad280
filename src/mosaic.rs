//! Grid assembler.
//!
//! Splits an ordered image list into consecutive rows of `images_per_row`,
//! composites each row and stacks the rows top to bottom. A trailing partial
//! row is dropped, not padded.

use image::RgbImage;
use rayon::prelude::*;

use crate::compose::{compose_row_with, LeadingEdge};
use crate::error::LayoutError;

/// Row layout shared by every row of a mosaic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridLayout {
    pub images_per_row: usize,
    pub overlap: u32,
    pub leading_edge: LeadingEdge,
}

impl GridLayout {
    pub fn new(images_per_row: usize, overlap: u32) -> Self {
        Self {
            images_per_row,
            overlap,
            leading_edge: LeadingEdge::default(),
        }
    }

    pub fn with_leading_edge(mut self, leading_edge: LeadingEdge) -> Self {
        self.leading_edge = leading_edge;
        self
    }
}

/// An assembled mosaic.
#[derive(Clone, Debug)]
pub struct Mosaic {
    pub image: RgbImage,
    pub rows: usize,
    pub images_used: usize,
    pub images_dropped: usize,
}

/// Keep the first `rows * images_per_row` images, failing when fewer exist.
pub fn select_for_layout<T>(
    mut images: Vec<T>,
    images_per_row: usize,
    rows: usize,
) -> Result<Vec<T>, LayoutError> {
    if images_per_row == 0 {
        return Err(LayoutError::InvalidImagesPerRow);
    }
    let required = images_per_row.saturating_mul(rows);
    if images.len() < required {
        return Err(LayoutError::InsufficientImages {
            required,
            available: images.len(),
        });
    }
    images.truncate(required);
    Ok(images)
}

/// Assemble `images` into a mosaic with the default leading edge.
pub fn compose_mosaic(
    images: &[RgbImage],
    images_per_row: usize,
    overlap: u32,
) -> Result<Mosaic, LayoutError> {
    compose_mosaic_with(images, GridLayout::new(images_per_row, overlap))
}

pub fn compose_mosaic_with(images: &[RgbImage], layout: GridLayout) -> Result<Mosaic, LayoutError> {
    if layout.images_per_row == 0 {
        return Err(LayoutError::InvalidImagesPerRow);
    }
    let chunks: Vec<&[RgbImage]> = images.chunks_exact(layout.images_per_row).collect();
    if chunks.is_empty() {
        return Err(LayoutError::NoCompleteRows {
            available: images.len(),
            images_per_row: layout.images_per_row,
        });
    }
    let dropped = images.len() % layout.images_per_row;
    if dropped > 0 {
        log::warn!(
            "dropping {} trailing images that do not fill a row of {}",
            dropped,
            layout.images_per_row
        );
    }

    let rows = chunks
        .par_iter()
        .map(|chunk| compose_row_with(chunk, layout.overlap, layout.leading_edge))
        .collect::<Result<Vec<_>, _>>()?;
    let image = stack_rows(&rows)?;

    Ok(Mosaic {
        image,
        rows: rows.len(),
        images_used: rows.len() * layout.images_per_row,
        images_dropped: dropped,
    })
}

/// Concatenate equally wide rows top to bottom.
pub fn stack_rows(rows: &[RgbImage]) -> Result<RgbImage, LayoutError> {
    let first = rows.first().ok_or(LayoutError::EmptyRow)?;
    let width = first.width();
    let mut height = 0u32;
    let mut buffer = Vec::with_capacity(rows.iter().map(|r| r.as_raw().len()).sum());
    for (index, row) in rows.iter().enumerate() {
        if row.width() != width {
            return Err(LayoutError::DimensionMismatch {
                index,
                width,
                height: first.height(),
                actual_width: row.width(),
                actual_height: row.height(),
            });
        }
        buffer.extend_from_slice(row.as_raw());
        height += row.height();
    }
    RgbImage::from_raw(width, height, buffer).ok_or(LayoutError::EmptyRow)
}
