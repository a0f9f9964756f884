use base64::{engine::general_purpose, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

use crate::core::errors::{DataUrlError, ImageRole, PipelineError, PipelineResult};

pub const JPEG_MIME: &str = "image/jpeg";
pub const PNG_MIME: &str = "image/png";

/// Encode an RGB buffer as baseline JPEG at the given quality (1..=100)
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> PipelineResult<Vec<u8>> {
    let mut jpeg_bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_bytes, quality.clamp(1, 100))
        .encode_image(img)
        .map_err(PipelineError::EncodingFailed)?;
    Ok(jpeg_bytes)
}

/// Encode an RGB buffer as PNG
pub fn encode_png(img: &RgbImage) -> PipelineResult<Vec<u8>> {
    let mut png_bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(PipelineError::EncodingFailed)?;
    Ok(png_bytes)
}

/// `data:<mime>;base64,<payload>`
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

/// Decode the payload of a base64 `data:` URL; the media type is ignored.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, DataUrlError> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or(DataUrlError::MissingPrefix)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUrlError::MissingSeparator)?;
    if !header.ends_with(";base64") {
        return Err(DataUrlError::NotBase64);
    }
    // Browsers may wrap long payloads
    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(general_purpose::STANDARD.decode(payload)?)
}

/// Image bytes from an upload field: raw file contents, or the text of a
/// `data:` URL as sent by the web page.
pub fn upload_bytes(field: Vec<u8>, input: ImageRole) -> PipelineResult<Vec<u8>> {
    if !field.trim_ascii_start().starts_with(b"data:") {
        return Ok(field);
    }
    let text = std::str::from_utf8(&field).map_err(|_| PipelineError::InvalidDataUrl {
        input,
        source: DataUrlError::NotBase64,
    })?;
    decode_data_url(text).map_err(|source| PipelineError::InvalidDataUrl { input, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_jpeg_roundtrip_dimensions() {
        let img = RgbImage::from_pixel(33, 17, Rgb([200, 40, 40]));
        let bytes = encode_jpeg(&img, 90).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (33, 17));
    }

    #[test]
    fn test_data_url_roundtrip() {
        let png = encode_png(&RgbImage::new(2, 2)).unwrap();
        let url = to_data_url(PNG_MIME, &png);
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_url(&url).unwrap(), png);
    }

    #[test]
    fn test_malformed_data_urls() {
        assert!(matches!(decode_data_url("image/png;base64,AAAA"), Err(DataUrlError::MissingPrefix)));
        assert!(matches!(decode_data_url("data:image/png;base64"), Err(DataUrlError::MissingSeparator)));
        assert!(matches!(decode_data_url("data:text/plain,hello"), Err(DataUrlError::NotBase64)));
        assert!(matches!(decode_data_url("data:image/png;base64,@@@"), Err(DataUrlError::Base64(_))));
    }

    #[test]
    fn test_upload_bytes_accepts_both_forms() {
        let raw = vec![0x89, b'P', b'N', b'G'];
        assert_eq!(upload_bytes(raw.clone(), ImageRole::Original).unwrap(), raw);

        let url = to_data_url(JPEG_MIME, &raw);
        assert_eq!(upload_bytes(url.into_bytes(), ImageRole::Original).unwrap(), raw);

        let err = upload_bytes(b"data:image/png;base64,!!".to_vec(), ImageRole::Modified).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidDataUrl { input: ImageRole::Modified, .. }));
    }
}
