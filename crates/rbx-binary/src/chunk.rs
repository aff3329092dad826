// SPDX-License-Identifier: Apache-2.0
//! LZ4 chunk framing (§4.B).
//!
//! A raw chunk is `(sig, cLen, dLen, reserved, payload)`. When `cLen == 0`
//! the payload is stored uncompressed at length `dLen`; otherwise it is an
//! LZ4 block that must decompress to exactly `dLen` bytes.
//!
//! `lz4_flex`'s block API, unlike the liblz4 CLI the format's prose describes,
//! does not prepend the uncompressed length to its compressed output — so the
//! "strip the prepended length" step from the wire spec has nothing to strip
//! here. We still keep `decompressed_len` as an explicit, separately-written
//! field (it is load-bearing: it is the only thing that lets a decoder size
//! its output buffer and verify the block decompressed to the right length).

use rbx_model::{Diagnostics, WarningKind};
use thiserror::Error;

use crate::stream::{ByteReader, ByteWriter};

/// A chunk signature, e.g. `INST`, `PROP`, `PRNT`, `END\0`.
pub type Signature = [u8; 4];

/// Errors that can occur while framing or unframing a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// The stream ended before a complete chunk header/payload was read.
    #[error("truncated chunk stream")]
    Truncated,
    /// LZ4 block decompression failed or did not yield `decompressed_len`
    /// bytes.
    #[error("LZ4 decode failure: {0}")]
    Lz4(String),
}

/// One chunk's framing, with its payload already decompressed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawChunk {
    /// 4-byte chunk signature.
    pub sig: Signature,
    /// Decompressed (logical) payload.
    pub payload: Vec<u8>,
}

/// Read one chunk from `reader`, decompressing its payload if needed.
///
/// `reserved != 0` is recorded as a warning, not a failure (§7.7).
///
/// # Errors
///
/// Returns [`ChunkError::Truncated`] if the stream ends mid-header/payload,
/// or [`ChunkError::Lz4`] if LZ4 decompression fails or produces the wrong
/// length.
pub fn read_chunk(reader: &mut ByteReader<'_>, diagnostics: &mut Diagnostics) -> Result<RawChunk, ChunkError> {
    let start_pos = reader.position();
    let sig_bytes = reader.read_bytes(4);
    if reader.error().is_some() || sig_bytes.len() < 4 {
        return Err(ChunkError::Truncated);
    }
    let mut sig = [0u8; 4];
    sig.copy_from_slice(sig_bytes);

    let compressed_len = reader.read_u32();
    let decompressed_len = reader.read_u32();
    let reserved = reader.read_u32();
    if reserved != 0 {
        diagnostics.push(WarningKind::ReservedFieldNonZero, format!("chunk {} reserved", sig_label(sig)));
    }

    let payload_len = if compressed_len == 0 { decompressed_len } else { compressed_len };
    let raw_payload = reader.read_bytes(payload_len as usize);
    if reader.error().is_some() || raw_payload.len() < payload_len as usize {
        let _ = start_pos;
        return Err(ChunkError::Truncated);
    }

    let payload = if compressed_len == 0 {
        raw_payload.to_vec()
    } else {
        lz4_flex::block::decompress(raw_payload, decompressed_len as usize)
            .map_err(|e| ChunkError::Lz4(e.to_string()))?
    };
    if payload.len() != decompressed_len as usize {
        return Err(ChunkError::Lz4(format!(
            "expected {decompressed_len} decompressed bytes, got {}",
            payload.len()
        )));
    }

    Ok(RawChunk { sig, payload })
}

/// Write `chunk` to `writer`, compressing the payload with LZ4 when
/// `compress` is true.
pub fn write_chunk(writer: &mut ByteWriter, chunk: &RawChunk, compress: bool) {
    writer.write_bytes(&chunk.sig);
    #[allow(clippy::cast_possible_truncation)]
    let decompressed_len = chunk.payload.len() as u32;

    if compress {
        let compressed = lz4_flex::block::compress(&chunk.payload);
        #[allow(clippy::cast_possible_truncation)]
        writer.write_u32(compressed.len() as u32);
        writer.write_u32(decompressed_len);
        writer.write_u32(0); // reserved
        writer.write_bytes(&compressed);
    } else {
        writer.write_u32(0); // compressed_len == 0 means "uncompressed"
        writer.write_u32(decompressed_len);
        writer.write_u32(0); // reserved
        writer.write_bytes(&chunk.payload);
    }
}

fn sig_label(sig: Signature) -> String {
    String::from_utf8_lossy(&sig).trim_end_matches('\0').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(payload: &[u8], compress: bool) {
        let chunk = RawChunk { sig: *b"TEST", payload: payload.to_vec() };
        let mut writer = ByteWriter::new();
        write_chunk(&mut writer, &chunk, compress);
        let bytes = writer.into_bytes();

        let mut diagnostics = Diagnostics::new();
        let mut reader = ByteReader::new(&bytes);
        let decoded = read_chunk(&mut reader, &mut diagnostics).unwrap();
        assert_eq!(decoded, chunk);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn uncompressed_roundtrip() {
        roundtrip(b"hello world, this is a chunk payload", false);
    }

    #[test]
    fn compressed_roundtrip() {
        roundtrip(&[42u8; 4096], true);
    }

    #[test]
    fn empty_payload_roundtrip() {
        roundtrip(b"", false);
        roundtrip(b"", true);
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let mut diagnostics = Diagnostics::new();
        let mut reader = ByteReader::new(&[b'I', b'N', b'S']);
        assert_eq!(read_chunk(&mut reader, &mut diagnostics), Err(ChunkError::Truncated));
    }

    #[test]
    fn reserved_nonzero_warns_but_succeeds() {
        let mut writer = ByteWriter::new();
        writer.write_bytes(b"TEST");
        writer.write_u32(0);
        writer.write_u32(3);
        writer.write_u32(7); // reserved, nonzero
        writer.write_bytes(b"abc");
        let bytes = writer.into_bytes();

        let mut diagnostics = Diagnostics::new();
        let mut reader = ByteReader::new(&bytes);
        let chunk = read_chunk(&mut reader, &mut diagnostics).unwrap();
        assert_eq!(chunk.payload, b"abc");
        assert_eq!(diagnostics.warnings().len(), 1);
    }
}
