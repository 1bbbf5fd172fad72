//! Framed binary encoding of samples
//!
//! ```text
//! offset  size  field
//!      0     4  magic ("BREG", little endian)
//!      4     2  version
//!      6     1  kind (1 = single sample, 2 = sample list)
//!      7     1  reserved
//!      8     …  bincode body
//! ```

use crate::sample::Sample;
use thiserror::Error;

/// Magic number opening every frame
pub const FRAME_MAGIC: u32 = 0x4745_5242;

/// Frame format version
pub const FRAME_VERSION: u16 = 1;

/// Bytes in front of the body
pub const FRAME_HEADER_SIZE: usize = 8;

const KIND_SAMPLE: u8 = 1;
const KIND_SAMPLE_LIST: u8 = 2;

/// Error type for sample encoding and decoding
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame header is missing or does not match
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Body could not be (de)serialized
    #[error("Serialization failed: {0}")]
    Body(#[from] bincode::Error),
}

fn encode_frame<T: serde::Serialize + ?Sized>(kind: u8, body: &T) -> Result<Vec<u8>, CodecError> {
    let body_size = bincode::serialized_size(body)? as usize;
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + body_size);
    buf.extend_from_slice(&FRAME_MAGIC.to_le_bytes());
    buf.extend_from_slice(&FRAME_VERSION.to_le_bytes());
    buf.push(kind);
    buf.push(0);
    bincode::serialize_into(&mut buf, body)?;
    Ok(buf)
}

fn frame_body(bytes: &[u8], expected_kind: u8) -> Result<&[u8], CodecError> {
    if bytes.len() < FRAME_HEADER_SIZE {
        return Err(CodecError::InvalidFrame(format!(
            "{} bytes is shorter than the frame header",
            bytes.len()
        )));
    }

    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != FRAME_MAGIC {
        return Err(CodecError::InvalidFrame(format!("magic {magic:#x}")));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FRAME_VERSION {
        return Err(CodecError::InvalidFrame(format!("version {version}")));
    }
    if bytes[6] != expected_kind {
        return Err(CodecError::InvalidFrame(format!("kind {}", bytes[6])));
    }

    Ok(&bytes[FRAME_HEADER_SIZE..])
}

/// Encode one sample
pub fn encode_sample(sample: &Sample) -> Result<Vec<u8>, CodecError> {
    encode_frame(KIND_SAMPLE, sample)
}

/// Decode one sample
pub fn decode_sample(bytes: &[u8]) -> Result<Sample, CodecError> {
    Ok(bincode::deserialize(frame_body(bytes, KIND_SAMPLE)?)?)
}

/// Encode a batch of samples
pub fn encode_sample_list(samples: &[Sample]) -> Result<Vec<u8>, CodecError> {
    encode_frame(KIND_SAMPLE_LIST, samples)
}

/// Decode a batch of samples
pub fn decode_sample_list(bytes: &[u8]) -> Result<Vec<Sample>, CodecError> {
    Ok(bincode::deserialize(frame_body(bytes, KIND_SAMPLE_LIST)?)?)
}
