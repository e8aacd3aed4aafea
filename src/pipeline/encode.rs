//! Image encoding: `DynamicImage` → PNG bytes.
//!
//! PNG is lossless, so rasterised text stays crisp in exported page images.

use crate::error::DocShiftError;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG.
pub fn encode_png(img: &DynamicImage, page: usize) -> Result<Vec<u8>, DocShiftError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| DocShiftError::ImageDecodeFailed {
            name: format!("page {page}"),
            detail: e.to_string(),
        })?;
    debug!("Encoded page {} → {} bytes PNG", page, buf.len());
    Ok(buf)
}

/// Decode a PNG or JPEG payload.
pub fn decode_image(bytes: &[u8], name: &str) -> Result<DynamicImage, DocShiftError> {
    image::load_from_memory(bytes).map_err(|e| DocShiftError::ImageDecodeFailed {
        name: name.to_string(),
        detail: e.to_string(),
    })
}
