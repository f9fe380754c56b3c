use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::shared::error::InputError;

const IMAGE_URI_PREFIX: &str = "data:image/";

/// Extracts the image bytes from a `data:image/<type>;base64,<payload>` URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, InputError> {
    let uri = uri.trim();
    if !uri.starts_with(IMAGE_URI_PREFIX) {
        return Err(InputError::NotDataUri);
    }
    let (_, payload) = uri.split_once(',').ok_or(InputError::MissingSeparator)?;
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if payload.is_empty() {
        return Err(InputError::Empty);
    }
    Ok(STANDARD.decode(payload)?)
}
