use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::ValidationError;

/// Image payload decoded from an embedded `data:image/<ext>;base64,<bytes>` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

pub fn decode_data_uri(payload: &str) -> Result<DecodedImage, ValidationError> {
    let rest = payload
        .trim()
        .strip_prefix("data:image/")
        .ok_or(ValidationError::InvalidImageEncoding)?;

    let (extension, encoded) = rest
        .split_once(";base64,")
        .ok_or(ValidationError::InvalidImageEncoding)?;

    if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidImageEncoding);
    }

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| ValidationError::InvalidImageEncoding)?;

    if bytes.is_empty() {
        return Err(ValidationError::InvalidImageEncoding);
    }

    Ok(DecodedImage {
        extension: extension.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // "data" base64-encoded
    const PAYLOAD: &str = "ZGF0YQ==";

    #[test]
    fn decodes_well_formed_data_uri() {
        let image = decode_data_uri(&format!("data:image/png;base64,{PAYLOAD}")).unwrap();
        assert_eq!(image.extension, "png");
        assert_eq!(image.bytes, b"data");
    }

    #[test]
    fn rejects_missing_prefix() {
        assert_eq!(
            decode_data_uri(&format!("image/png;base64,{PAYLOAD}")),
            Err(ValidationError::InvalidImageEncoding)
        );
    }

    #[test]
    fn rejects_missing_encoding_marker() {
        assert_eq!(
            decode_data_uri(&format!("data:image/png,{PAYLOAD}")),
            Err(ValidationError::InvalidImageEncoding)
        );
    }

    #[test]
    fn rejects_blank_extension() {
        assert_eq!(
            decode_data_uri(&format!("data:image/;base64,{PAYLOAD}")),
            Err(ValidationError::InvalidImageEncoding)
        );
    }

    #[test]
    fn rejects_undecodable_payload() {
        assert_eq!(
            decode_data_uri("data:image/png;base64,!!not-base64!!"),
            Err(ValidationError::InvalidImageEncoding)
        );
    }

    #[test]
    fn rejects_empty_payload() {
        assert_eq!(
            decode_data_uri("data:image/png;base64,"),
            Err(ValidationError::InvalidImageEncoding)
        );
    }
}
