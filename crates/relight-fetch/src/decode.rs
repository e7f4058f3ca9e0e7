//! Image decoding for fetched planes.

use image::RgbaImage;

use crate::error::FetchError;

/// Decode a fetched component image (JPEG or PNG) to RGBA8.
pub fn decode_plane(bytes: &[u8], what: &str) -> Result<RgbaImage, FetchError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|source| FetchError::Decode {
            what: what.to_string(),
            source,
        })
}
