use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BytesValue(Vec<u8>);

impl BytesValue {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decodes standard or URL-safe base64, with or without padding.
    pub fn from_base64(value: &str) -> Result<Self, base64::DecodeError> {
        STANDARD
            .decode(value)
            .or_else(|_| STANDARD_NO_PAD.decode(value))
            .or_else(|_| URL_SAFE.decode(value))
            .or_else(|_| URL_SAFE_NO_PAD.decode(value))
            .map(Self)
    }

    /// Padded standard base64, the form the REST API emits.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for BytesValue {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&[u8]> for BytesValue {
    fn from(value: &[u8]) -> Self {
        Self::new(value.to_vec())
    }
}
