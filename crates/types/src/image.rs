use thiserror::Error;

use crate::{SerializeField, WORD_BYTES};

/// Bytes in the serialized header (`data_len` as u16 LE).
const HEADER_BYTES: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageFormatError {
    #[error("image is {0} bytes, shorter than its header")]
    MissingHeader(usize),

    #[error("code section of {0} bytes is not a whole number of 3-byte words")]
    RaggedCode(usize),

    #[error("image has no instructions")]
    Empty,
}

/// The compiler's output and the loader's input.
///
/// `code` is a flat run of fixed-width instruction words. `data_len` bytes of
/// zeroed working storage follow the code inside the process segment, so a
/// loaded image needs `segment_len()` contiguous bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableImage {
    code: Vec<u8>,
    data_len: u16,
}

impl ExecutableImage {
    pub fn new(code: Vec<u8>, data_len: u16) -> Result<Self, ImageFormatError> {
        if code.is_empty() {
            return Err(ImageFormatError::Empty);
        }
        if code.len() % WORD_BYTES != 0 {
            return Err(ImageFormatError::RaggedCode(code.len()));
        }
        Ok(Self { code, data_len })
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn data_len(&self) -> u16 {
        self.data_len
    }

    pub fn word_count(&self) -> usize {
        self.code.len() / WORD_BYTES
    }

    pub fn segment_len(&self) -> usize {
        self.code.len() + self.data_len as usize
    }

    /// Iterates the instruction words in order.
    pub fn words(&self) -> impl Iterator<Item = [u8; WORD_BYTES]> + '_ {
        self.code
            .chunks_exact(WORD_BYTES)
            .map(|w| [w[0], w[1], w[2]])
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_BYTES + self.code.len()];
        let mut offset = 0;
        self.data_len.serialize_field(&mut buf, &mut offset);
        self.code.as_slice().serialize_field(&mut buf, &mut offset);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageFormatError> {
        if bytes.len() < HEADER_BYTES {
            return Err(ImageFormatError::MissingHeader(bytes.len()));
        }
        let data_len = u16::from_le_bytes([bytes[0], bytes[1]]);
        Self::new(bytes[HEADER_BYTES..].to_vec(), data_len)
    }
}
