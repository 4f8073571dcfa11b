//! Startup payload handling.
//!
//! The payload is opaque to this component. It crosses the provider wire
//! base64-encoded and must round-trip byte-for-byte.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{TaskError, TaskResult};

/// Hard provider ceiling on the launch payload, in bytes.
pub const MAX_USER_DATA_SIZE: usize = 16384;

/// Opaque startup payload for an instance.
///
/// Serialized as its base64 wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData(Bytes);

impl UserData {
    /// Wrap raw payload bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Decode a payload from its base64 wire form.
    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        Ok(Self(Bytes::from(BASE64.decode(encoded)?)))
    }

    /// Raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode for a launch request, enforcing the size ceiling.
    ///
    /// Oversized payloads are rejected outright; there is no compression
    /// fallback.
    pub fn encode_for_launch(&self) -> TaskResult<String> {
        if self.len() > MAX_USER_DATA_SIZE {
            return Err(TaskError::UserDataTooLarge {
                size: self.len(),
                limit: MAX_USER_DATA_SIZE,
            });
        }
        Ok(BASE64.encode(&self.0))
    }
}

impl Serialize for UserData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for UserData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_payload_at_ceiling_encodes() {
        let payload = UserData::from_bytes(vec![0u8; MAX_USER_DATA_SIZE]);
        assert!(payload.encode_for_launch().is_ok());
    }

    #[test]
    fn test_payload_over_ceiling_rejected() {
        let payload = UserData::from_bytes(vec![0u8; MAX_USER_DATA_SIZE + 1]);
        let err = payload.encode_for_launch().unwrap_err();
        assert!(matches!(
            err,
            TaskError::UserDataTooLarge {
                size,
                limit: MAX_USER_DATA_SIZE,
            } if size == MAX_USER_DATA_SIZE + 1
        ));
    }

    #[test]
    fn test_corrupt_base64_rejected() {
        assert!(UserData::from_base64("not base64!!!").is_err());
    }

    proptest! {
        #[test]
        fn test_payload_roundtrips(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let payload = UserData::from_bytes(data.clone());
            let encoded = payload.encode_for_launch().unwrap();
            let decoded = UserData::from_base64(&encoded).unwrap();
            prop_assert_eq!(decoded.as_bytes(), &data[..]);
        }
    }
}
