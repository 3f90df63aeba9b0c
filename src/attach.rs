use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::GenericImageView;
use thiserror::Error;

// Vision models reject very large inputs; cap either dimension.
const MAX_WIDTH: u32 = 1120;
const MAX_HEIGHT: u32 = 1120;

// Encoded payloads below this are almost certainly not a usable image.
const MIN_ENCODED_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum ImageReadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

/// Read the attached file and produce the base64 payload for the request.
///
/// Bytes that decode as an oversized image are downscaled and re-encoded as
/// PNG first. Bytes that do not decode at all are sent as-is with a logged
/// warning, and a suspiciously short payload is also only warned about; the
/// submission still goes out either way.
pub async fn encode(path: &Path) -> Result<String, ImageReadError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ImageReadError::Read {
            path: path.display().to_string(),
            source,
        })?;

    let bytes = match downscale(&bytes) {
        Ok(resized) => resized,
        Err(e) => {
            eprintln!("[Attach] {} did not decode as an image ({}), sending raw bytes", path.display(), e);
            bytes
        }
    };

    let encoded = STANDARD.encode(&bytes);
    if encoded.len() < MIN_ENCODED_LEN {
        eprintln!("[Attach] encoded payload is only {} chars, probably not a valid image", encoded.len());
    }

    Ok(encoded)
}

fn downscale(bytes: &[u8]) -> image::ImageResult<Vec<u8>> {
    let mut img = image::load_from_memory(bytes)?;

    let (width, height) = img.dimensions();
    if width > MAX_WIDTH || height > MAX_HEIGHT {
        let width_ratio = MAX_WIDTH as f32 / width as f32;
        let height_ratio = MAX_HEIGHT as f32 / height as f32;
        let scale = width_ratio.min(height_ratio);

        let new_width = (width as f32 * scale) as u32;
        let new_height = (height as f32 * scale) as u32;

        img = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);
    }

    let mut buffer = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn small_images_keep_their_dimensions() {
        let out = downscale(&png_bytes(4, 4)).unwrap();
        let reopened = image::load_from_memory(&out).unwrap();
        assert_eq!(reopened.dimensions(), (4, 4));
    }

    #[test]
    fn oversized_images_are_scaled_down_preserving_aspect() {
        let out = downscale(&png_bytes(2240, 1120)).unwrap();
        let reopened = image::load_from_memory(&out).unwrap();
        assert_eq!(reopened.dimensions(), (1120, 560));
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let err = encode(Path::new("/no/such/file.png")).await.unwrap_err();
        assert!(err.to_string().contains("/no/such/file.png"));
    }

    #[tokio::test]
    async fn non_image_bytes_are_still_encoded() {
        let path = std::env::temp_dir().join("askbox-attach-test.txt");
        std::fs::write(&path, b"not an image at all").unwrap();

        let encoded = encode(&path).await.unwrap();
        assert_eq!(STANDARD.decode(&encoded).unwrap(), b"not an image at all");

        let _ = std::fs::remove_file(&path);
    }
}
