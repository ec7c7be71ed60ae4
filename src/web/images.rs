//! Download endpoint for generated images.

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION};
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose;
use image::ImageFormat;

use super::prelude::*;
use crate::constants::image_filename;

/// Content type for decoded image bytes, sniffed from the magic number.
pub(crate) fn content_type_for(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Decodes a base64 payload from the image service.
pub(crate) fn decode_payload(payload: &str) -> Result<Vec<u8>, ChitrakarError> {
    general_purpose::STANDARD
        .decode(payload)
        .map_err(|err| ChitrakarError::InternalServerError(format!("bad image payload: {err}")))
}

/// handles GET /images/{number}, serving image `number` (1-based) as a download
pub(crate) async fn download_handler(
    State(state): State<AppState>,
    Path(number): Path<usize>,
) -> Result<Response, ChitrakarError> {
    let snapshot = state.studio.snapshot().await;
    let payload = number
        .checked_sub(1)
        .and_then(|index| snapshot.visible_images().get(index))
        .ok_or_else(|| ChitrakarError::NotFound(format!("/images/{number}")))?;
    let bytes = decode_payload(payload)?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        image_filename(number)
    ))
    .map_err(|err| ChitrakarError::InternalServerError(err.to_string()))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type_for(&bytes))
        .header(CONTENT_DISPOSITION, disposition)
        .header(CACHE_CONTROL, "no-store")
        .body(Body::from(bytes))
        .map_err(ChitrakarError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn png_bytes_are_sniffed() {
        assert_eq!(content_type_for(PNG_MAGIC), "image/png");
    }

    #[test]
    fn unknown_bytes_fall_back_to_octet_stream() {
        assert_eq!(content_type_for(b"hello"), "application/octet-stream");
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert!(decode_payload("not base64!").is_err());
    }
}
