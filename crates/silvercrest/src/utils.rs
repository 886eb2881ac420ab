use serde::Serialize;
use silvercrest_core::{EnvelopeCipher, crypto};

/// Parse a 16-byte AES key or IV.
///
/// Accepts either 16 ASCII characters (the form the firmware key is usually
/// quoted in) or 32 hex digits.
pub fn parse_key(arg: &str) -> Result<[u8; 16], String> {
    if arg.len() == 16 && arg.is_ascii() {
        let mut key = [0u8; 16];
        key.copy_from_slice(arg.as_bytes());
        return Ok(key);
    }

    let bytes = hex::decode(arg).map_err(|e| format!("invalid hex: {}", e))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected 16 bytes, got {}", b.len()))
}

/// Build the envelope cipher from optional CLI overrides.
pub fn build_cipher(key: Option<[u8; 16]>, iv: Option<[u8; 16]>) -> EnvelopeCipher {
    EnvelopeCipher::new(
        key.unwrap_or(crypto::DEFAULT_KEY),
        iv.unwrap_or(crypto::DEFAULT_IV),
    )
}

/// Parse a raw command payload given as hex. Whitespace and `:` separators
/// are ignored.
pub fn parse_hex_payload(arg: &str) -> Result<Vec<u8>, String> {
    let cleaned: String = arg
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    if cleaned.is_empty() {
        return Err("payload is empty".to_string());
    }
    hex::decode(&cleaned).map_err(|e| format!("invalid hex payload: {}", e))
}

/// Render a value as compact JSON.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Failed to serialize output: {}", e))
}

/// Print a value as compact JSON on stdout, exiting 1 if it cannot be
/// serialized.
pub fn print_json<T: Serialize>(value: &T) {
    match to_json(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_ascii() {
        assert_eq!(parse_key("0123456789abcdef").unwrap(), *b"0123456789abcdef");
    }

    #[test]
    fn test_parse_key_hex() {
        let key = parse_key("000102030405060708090a0b0c0d0e0f").unwrap();
        assert_eq!(key[0], 0x00);
        assert_eq!(key[15], 0x0f);
    }

    #[test]
    fn test_parse_key_wrong_length() {
        assert!(parse_key("0011").unwrap_err().contains("expected 16 bytes"));
        assert!(parse_key("short").is_err());
        assert!(parse_key("zz").unwrap_err().contains("invalid hex"));
    }

    #[test]
    fn test_build_cipher_defaults_match_default() {
        let plain = [0x42u8; 16];
        let custom = build_cipher(None, None).encrypt(&plain).unwrap();
        let default = EnvelopeCipher::default().encrypt(&plain).unwrap();
        assert_eq!(custom, default);
    }

    #[test]
    fn test_build_cipher_override_changes_output() {
        let plain = [0x42u8; 16];
        let custom = build_cipher(Some([7u8; 16]), None).encrypt(&plain).unwrap();
        let default = EnvelopeCipher::default().encrypt(&plain).unwrap();
        assert_ne!(custom, default);
    }

    #[test]
    fn test_to_json() {
        assert_eq!(to_json(&vec![1, 2]).unwrap(), "[1,2]");

        let mut unserializable = std::collections::BTreeMap::new();
        unserializable.insert((1u8, 2u8), 3u8);
        assert!(to_json(&unserializable)
            .unwrap_err()
            .contains("Failed to serialize output"));
    }

    #[test]
    fn test_parse_hex_payload() {
        assert_eq!(
            parse_hex_payload("02 00 00 00 00 04 04 04 04").unwrap(),
            vec![0x02, 0, 0, 0, 0, 4, 4, 4, 4]
        );
        assert_eq!(parse_hex_payload("01:ff").unwrap(), vec![0x01, 0xFF]);
        assert!(parse_hex_payload("").is_err());
        assert!(parse_hex_payload("abc").is_err());
    }
}
