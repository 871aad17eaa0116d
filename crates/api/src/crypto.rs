//! Random token generation.

use crate::ServiceError;

/// Length in bytes of an OAuth `state` token before hex encoding.
const STATE_BYTES: usize = 16;

/// Generate an opaque OAuth `state` token. Returns 32 lowercase hex chars.
pub fn generate_state() -> Result<String, ServiceError> {
    let mut bytes = [0u8; STATE_BYTES];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;
    Ok(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::generate_state;

    #[test]
    fn state_is_hex_and_unique() {
        let a = generate_state().expect("rng");
        let b = generate_state().expect("rng");
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }
}
