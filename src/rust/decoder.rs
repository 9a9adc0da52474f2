//! Turns uploaded bytes or base64 data URIs into a [`DecodedImage`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{error, info};

/// Largest accepted encoded image, for both file uploads and decoded base64 payloads.
pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

/// File extensions accepted on the named-file upload path.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

const DATA_URI_PREFIX: &str = "data:image";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// The input is not in an accepted encoding (bad data URI, bad base64, bad extension)
    #[error("{0}")]
    Format(String),
    /// The bytes could not be decoded into a non-empty image
    #[error("{0}")]
    Decode(String),
    /// The encoded image is larger than [`MAX_IMAGE_BYTES`]
    #[error("{0}")]
    TooLarge(String),
}

/// Channel order of a 3- or 4-channel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// A decoded pixel grid, row-major with interleaved channels.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    channels: u8,
    order: ChannelOrder,
    data: Vec<u8>,
}

impl DecodedImage {
    /// Wraps a raw buffer. Fails when the buffer length does not match
    /// `width * height * channels` or the image has no pixels.
    pub fn new(
        width: u32,
        height: u32,
        channels: u8,
        order: ChannelOrder,
        data: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 || channels == 0 {
            return Err(DecodeError::Decode("Image has zero size".into()));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(DecodeError::Decode(format!(
                "Pixel buffer length mismatch: expected {}, got {}",
                expected,
                data.len()
            )));
        }
        Ok(Self { width, height, channels, order, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl From<image::RgbImage> for DecodedImage {
    fn from(image: image::RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            channels: 3,
            order: ChannelOrder::Rgb,
            data: image.into_raw(),
        }
    }
}

/// Decodes PNG or JPEG bytes into a 3-channel image.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Decode("Image data is empty".into()));
    }
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| DecodeError::Decode(format!("Failed to decode image: {}", e)))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(DecodeError::Decode("Image has zero size".into()));
    }
    let image = DecodedImage::from(decoded.to_rgb8());
    info!("Decoded image: {}x{}x{}", image.width(), image.height(), image.channels());
    Ok(image)
}

/// Rejects payloads above [`MAX_IMAGE_BYTES`]. `what` names the payload in the message
/// ("File" for uploads, "Image" for base64).
pub fn check_size(len: usize, what: &str) -> Result<(), DecodeError> {
    if len > MAX_IMAGE_BYTES {
        error!("{} size ({} bytes) exceeds limit", what, len);
        return Err(DecodeError::TooLarge(format!(
            "{} size exceeds limit. Max size is {}MB.",
            what,
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Validates the file name of a multipart upload against [`ALLOWED_EXTENSIONS`].
pub fn check_upload_filename(filename: &str) -> Result<(), DecodeError> {
    if filename.is_empty() {
        return Err(DecodeError::Format("No selected file".into()));
    }
    let allowed = filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if !allowed {
        error!("File type not allowed: {}", filename);
        return Err(DecodeError::Format(
            "File type not allowed. Only png, jpg, jpeg are accepted.".into(),
        ));
    }
    Ok(())
}

/// Decodes a named-file upload: extension check, size check, then image decode.
pub fn decode_upload(filename: &str, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    check_upload_filename(filename)?;
    check_size(bytes.len(), "File")?;
    decode_image(bytes).map_err(|e| {
        error!("Failed to decode image from file upload: {}", e);
        DecodeError::Decode("Invalid image file".into())
    })
}

/// Extracts the raw bytes from a `data:image/...;base64,<data>` string.
pub fn data_uri_bytes(uri: &str) -> Result<Vec<u8>, DecodeError> {
    if !uri.starts_with(DATA_URI_PREFIX) {
        error!("Invalid base64 image format");
        return Err(DecodeError::Format("Invalid base64 image format.".into()));
    }
    let (_, payload) = uri.split_once(',').ok_or_else(|| {
        DecodeError::Format("Error decoding base64 image: missing ',' after data URI header".into())
    })?;
    let payload = payload.split(',').next().unwrap_or_default().trim();
    BASE64
        .decode(payload)
        .map_err(|e| DecodeError::Format(format!("Error decoding base64 image: {}", e)))
}

/// Decodes a base64 data URI into an image.
pub fn decode_data_uri(uri: &str) -> Result<DecodedImage, DecodeError> {
    info!("Received base64 image data with length: {}", uri.len());
    let bytes = data_uri_bytes(uri)?;
    check_size(bytes.len(), "Image")?;
    decode_image(&bytes).map_err(|e| {
        error!("Failed to decode base64 image: {}", e);
        DecodeError::Decode("Failed to decode base64 image".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let image = decode_image(&png_bytes(8, 4)).unwrap();
        assert_eq!((image.width(), image.height(), image.channels()), (8, 4, 3));
        assert_eq!(&image.as_bytes()[..3], &[200, 120, 40]);
    }

    #[test]
    fn test_empty_bytes_fail() {
        assert!(matches!(decode_image(&[]), Err(DecodeError::Decode(_))));
    }

    #[test]
    fn test_garbage_bytes_fail() {
        assert!(matches!(decode_image(b"not an image"), Err(DecodeError::Decode(_))));
    }

    #[test]
    fn test_upload_extension_is_case_insensitive() {
        assert!(check_upload_filename("hand.PNG").is_ok());
        assert!(check_upload_filename("hand.JpEg").is_ok());
        assert!(check_upload_filename("hand.jpg").is_ok());
    }

    #[test]
    fn test_upload_rejects_other_extensions() {
        let err = check_upload_filename("hand.gif").unwrap_err();
        assert_eq!(err.to_string(), "File type not allowed. Only png, jpg, jpeg are accepted.");
        assert!(check_upload_filename("noextension").is_err());
        assert_eq!(check_upload_filename("").unwrap_err().to_string(), "No selected file");
    }

    #[test]
    fn test_upload_decode_failure_message() {
        let err = decode_upload("hand.png", b"").unwrap_err();
        assert_eq!(err, DecodeError::Decode("Invalid image file".into()));
    }

    #[test]
    fn test_upload_too_large() {
        let bytes = vec![0u8; MAX_IMAGE_BYTES + 1];
        let err = decode_upload("hand.png", &bytes).unwrap_err();
        assert_eq!(err.to_string(), "File size exceeds limit. Max size is 2MB.");
    }

    #[test]
    fn test_data_uri_without_prefix_is_format_error() {
        let err = decode_data_uri("iVBORw0KGgo=").unwrap_err();
        assert_eq!(err, DecodeError::Format("Invalid base64 image format.".into()));
    }

    #[test]
    fn test_data_uri_roundtrip() {
        let uri = format!("data:image/png;base64,{}", BASE64.encode(png_bytes(3, 5)));
        let image = decode_data_uri(&uri).unwrap();
        assert_eq!((image.width(), image.height()), (3, 5));
    }

    #[test]
    fn test_data_uri_bad_base64() {
        let err = decode_data_uri("data:image/png;base64,@@@").unwrap_err();
        assert!(matches!(err, DecodeError::Format(msg) if msg.starts_with("Error decoding base64 image")));
    }

    #[test]
    fn test_data_uri_valid_base64_but_not_image() {
        let uri = format!("data:image/png;base64,{}", BASE64.encode(b"hello"));
        let err = decode_data_uri(&uri).unwrap_err();
        assert_eq!(err, DecodeError::Decode("Failed to decode base64 image".into()));
    }

    #[test]
    fn test_decoded_image_buffer_length_checked() {
        assert!(DecodedImage::new(2, 2, 3, ChannelOrder::Rgb, vec![0; 11]).is_err());
        assert!(DecodedImage::new(0, 2, 3, ChannelOrder::Rgb, vec![]).is_err());
        assert!(DecodedImage::new(2, 2, 4, ChannelOrder::Bgr, vec![0; 16]).is_ok());
    }
}
