use draft_store_core::StoreError;

/// Map a store key to a portable file stem.
///
/// Keys made only of `[A-Za-z0-9._-]` map to themselves. Anything else is hex-encoded
/// behind an `x-` prefix, so two distinct keys never share a file.
pub fn file_key(key: &str) -> Result<String, StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidArgument(
            "Draft identifier must not be empty".to_string(),
        ));
    }

    let portable = !key.starts_with("x-")
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if portable {
        Ok(key.to_string())
    } else {
        Ok(format!("x-{}", hex::encode(key.as_bytes())))
    }
}
