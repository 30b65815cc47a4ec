// Helpers for use in `#[serde(with)]`
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Strip everything that is not part of the standard base64 alphabet.
///
/// Key files and ciphertexts get copied through browsers, terminals and mail
/// clients, which like to add line breaks and spaces.
pub fn clean_base64(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '/' || *c == '=')
        .collect()
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(clean_base64(s))
}

/// Bytes as a standard base64 string
pub mod base64_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_base64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode_base64(&s).map_err(de::Error::custom)
    }
}

/// Bytes as a lowercase hex string
pub mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim()).map_err(de::Error::custom)
    }
}

/// A `u128` as a decimal string. Plain JSON numbers are accepted on input.
pub mod u128_string {
    use serde::{de, Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        deserializer.deserialize_any(U128Visitor)
    }

    pub(super) struct U128Visitor;

    impl<'de> de::Visitor<'de> for U128Visitor {
        type Value = u128;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an unsigned 128-bit integer or its decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
            Ok(v as u128)
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
            v.trim().parse().map_err(E::custom)
        }
    }
}

/// Three `u128`s (one per vote choice) as decimal strings
pub mod u128_triple {
    use serde::ser::SerializeTuple;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[u128; 3], serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        for value in values {
            tuple.serialize_element(&value.to_string())?;
        }
        tuple.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u128; 3], D::Error> {
        let values: Vec<Wrapped> = Vec::deserialize(deserializer)?;
        if values.len() != 3 {
            return Err(de::Error::invalid_length(values.len(), &"three values"));
        }
        Ok([values[0].0, values[1].0, values[2].0])
    }

    struct Wrapped(u128);

    impl<'de> Deserialize<'de> for Wrapped {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer
                .deserialize_any(super::u128_string::U128Visitor)
                .map(Wrapped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Sample {
        #[serde(with = "u128_string")]
        big: u128,
        #[serde(with = "u128_triple")]
        triple: [u128; 3],
        #[serde(with = "base64_bytes")]
        blob: Vec<u8>,
        #[serde(with = "hex_bytes")]
        digest: Vec<u8>,
    }

    #[test]
    fn u128_survives_json() {
        let sample = Sample {
            big: u128::MAX,
            triple: [1, 0, u128::MAX - 1],
            blob: vec![0xff, 0x00, 0x10],
            digest: vec![0xde, 0xad],
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains("\"340282366920938463463374607431768211455\""));
        assert!(json.contains("\"dead\""));
        assert_eq!(serde_json::from_str::<Sample>(&json).unwrap(), sample);
    }

    #[test]
    fn accepts_numbers_and_dirty_base64() {
        let json = r#"{"big": 42, "triple": [6, "0", 0], "blob": "/w\nA Q", "digest": "00"}"#;
        let sample: Sample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.big, 42);
        assert_eq!(sample.triple, [6, 0, 0]);
        assert_eq!(sample.blob, vec![0xff, 0x00, 0x10]);

        let short = r#"{"big": 1, "triple": ["1", "2"], "blob": "", "digest": ""}"#;
        assert!(serde_json::from_str::<Sample>(short).is_err());
    }
}
