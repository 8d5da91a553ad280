use crate::error::SourceError;

/// Pixel layouts a frame source may hand over before normalisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Nv12,
}

/// Convert a raw source buffer to packed RGB24.
pub(crate) fn normalize_to_rgb(
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>, SourceError> {
    match format {
        PixelFormat::Rgb24 => {
            check_len(&pixels, packed_len(width, height)?, "RGB")?;
            Ok(pixels)
        }
        PixelFormat::Bgr24 => {
            check_len(&pixels, packed_len(width, height)?, "BGR")?;
            let mut rgb = pixels;
            for px in rgb.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            Ok(rgb)
        }
        PixelFormat::Nv12 => nv12_to_rgb(&pixels, width, height),
    }
}

pub(crate) fn packed_len(width: u32, height: u32) -> Result<usize, SourceError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| SourceError::InvalidFrame("frame dimensions overflow".to_string()))
}

fn check_len(pixels: &[u8], expected: usize, label: &str) -> Result<(), SourceError> {
    if pixels.len() != expected {
        return Err(SourceError::InvalidFrame(format!(
            "{} frame length mismatch: expected {}, got {}",
            label,
            expected,
            pixels.len()
        )));
    }
    Ok(())
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, SourceError> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = w
        .checked_mul(h)
        .ok_or_else(|| SourceError::InvalidFrame("NV12 frame dimensions overflow".to_string()))?;
    check_len(pixels, y_plane + y_plane / 2, "NV12")?;

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;

            let offset = (j * w + i) * 3;
            rgb[offset] = clamp_to_u8(r);
            rgb[offset + 1] = clamp_to_u8(g);
            rgb[offset + 2] = clamp_to_u8(b);
        }
    }

    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
