//! Byte-level codecs shared by the storage layer.
//!
//! Three small formats the dataset uses, owned here so the rest of the crate
//! only sees typed values:
//!
//! - Perl `pack 'w'` BER: base-128 variable-length unsigned integers,
//!   big-endian groups, continuation in the high bit. Blob archive offsets
//!   exceed 4 GiB, so everything decodes to `u64`.
//! - Perl `Compress::LZF` frames: a UTF-8-style uncompressed-size header
//!   followed by an LZF body. A leading `0x00` byte marks a stored
//!   (uncompressed) payload.
//! - 32-bit FNV-1a, which picks the shard for textual keys.

use crate::error::OscarError;

// ─── BER (Perl `pack 'w'`) ──────────────────────────────────────────

/// Decode a back-to-back sequence of BER integers.
///
/// Streaming form: a trailing byte with its continuation bit still set is
/// silently dropped, matching how the dataset's own tooling reads these.
pub fn ber_decode(data: &[u8]) -> Vec<u64> {
    let mut out = Vec::new();
    let mut acc: u64 = 0;
    for &b in data {
        acc = (acc << 7) | u64::from(b & 0x7f);
        if b & 0x80 == 0 {
            out.push(acc);
            acc = 0;
        }
    }
    out
}

/// Decode exactly two BER integers (the `blob_offset` value layout).
///
/// Unlike [`ber_decode`], a trailing continuation byte here means the record
/// is truncated and is reported as such.
pub fn ber_decode_pair(data: &[u8]) -> Result<(u64, u64), OscarError> {
    let mut values = [0u64; 2];
    let mut n = 0;
    let mut acc: u64 = 0;
    let mut pending = false;
    for &b in data {
        acc = (acc << 7) | u64::from(b & 0x7f);
        pending = b & 0x80 != 0;
        if !pending {
            if n == 2 {
                return Err(OscarError::CorruptFrame(
                    "expected two BER integers, got more".to_string(),
                ));
            }
            values[n] = acc;
            n += 1;
            acc = 0;
        }
    }
    if pending {
        return Err(OscarError::CorruptFrame(
            "BER integer truncated by trailing continuation byte".to_string(),
        ));
    }
    if n != 2 {
        return Err(OscarError::CorruptFrame(format!(
            "expected two BER integers, got {n}"
        )));
    }
    Ok((values[0], values[1]))
}

/// Encode a sequence of integers in BER form. Used by fixtures and to check
/// the decode round-trip.
pub fn ber_encode(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    for &v in values {
        let mut groups = [0u8; 10];
        let mut i = 0;
        let mut rest = v;
        loop {
            groups[i] = (rest & 0x7f) as u8;
            rest >>= 7;
            i += 1;
            if rest == 0 {
                break;
            }
        }
        while i > 1 {
            i -= 1;
            out.push(groups[i] | 0x80);
        }
        out.push(groups[0]);
    }
    out
}

// ─── LZF frames (Perl `Compress::LZF`) ──────────────────────────────

/// Parse the variable-length uncompressed-size header of an LZF frame.
///
/// Returns `(header_length, uncompressed_length)`. Bytes past the header are
/// ignored. The first continuation bit consumes two mask positions,
/// subsequent ones consume one.
pub fn lzf_frame_header(data: &[u8]) -> Result<(usize, usize), OscarError> {
    if data.is_empty() {
        return Err(OscarError::CorruptFrame("empty LZF frame".to_string()));
    }
    let lower = data[0];
    let mut mask: u8 = 0x80;
    let mut start: usize = 1;
    while mask != 0 && start < data.len() && lower & mask != 0 {
        mask >>= if mask == 0x80 { 2 } else { 1 };
        start += 1;
    }
    if mask == 0 || data.len() < start {
        return Err(OscarError::CorruptFrame(
            "LZF size header exhausted".to_string(),
        ));
    }
    let mut size = u64::from(lower & mask.wrapping_sub(1));
    for &b in &data[1..start] {
        size = (size << 6) | u64::from(b & 0x3f);
    }
    if size == 0 {
        return Err(OscarError::CorruptFrame(
            "LZF frame declares zero uncompressed length".to_string(),
        ));
    }
    Ok((start, size as usize))
}

/// Decompress one LZF frame into its raw payload.
///
/// A leading `0x00` byte signals a stored payload which follows verbatim
/// from byte 1 and never goes through the size header.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, OscarError> {
    if data.is_empty() {
        return Err(OscarError::CorruptFrame("empty LZF frame".to_string()));
    }
    if data[0] == 0 {
        return Ok(data[1..].to_vec());
    }
    let (start, expected) = lzf_frame_header(data)?;
    let body = lzf::decompress(&data[start..], expected)
        .map_err(|e| OscarError::CorruptFrame(format!("LZF body: {e:?}")))?;
    if body.len() != expected {
        return Err(OscarError::CorruptFrame(format!(
            "LZF frame declared {expected} bytes, decompressed to {}",
            body.len()
        )));
    }
    Ok(body)
}

/// Encode a payload as an LZF frame (size header + compressed body, or the
/// `0x00` stored form when LZF cannot shrink the input). Fixture-side
/// inverse of [`decompress`].
#[cfg(test)]
pub(crate) fn compress(payload: &[u8]) -> Vec<u8> {
    match lzf::compress(payload) {
        Ok(body) => {
            let mut out = encode_frame_size(payload.len());
            out.extend_from_slice(&body);
            out
        }
        Err(_) => {
            let mut out = Vec::with_capacity(payload.len() + 1);
            out.push(0);
            out.extend_from_slice(payload);
            out
        }
    }
}

#[cfg(test)]
fn encode_frame_size(size: usize) -> Vec<u8> {
    // UTF-8-style: lead byte carries the top bits under a shrinking mask,
    // continuation bytes carry 6 bits each.
    let n = size as u64;
    if n <= 0x7f {
        return vec![n as u8];
    }
    let mut tail = Vec::new();
    let mut rest = n;
    let mut lead_bits = 5u32; // after the first continuation the lead keeps 5 bits
    loop {
        tail.push(0x80 | (rest & 0x3f) as u8);
        rest >>= 6;
        if rest < (1 << lead_bits) {
            break;
        }
        lead_bits -= 1;
    }
    let marker = !((1u16 << (lead_bits + 1)) - 1) as u8;
    let mut out = vec![marker | rest as u8];
    tail.reverse();
    out.extend_from_slice(&tail);
    out
}

// ─── FNV-1a (32-bit) ────────────────────────────────────────────────

/// 32-bit FNV-1a over raw bytes. Shards relations keyed by arbitrary text.
pub fn fnv1a(data: &[u8]) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for &b in data {
        h = (h ^ u32::from(b)).wrapping_mul(0x0100_0193);
    }
    h
}

// ─── SHA helpers ────────────────────────────────────────────────────

/// Split a relation value into consecutive 20-byte SHA-1 chunks.
pub fn sha_chunks(data: &[u8]) -> Result<Vec<[u8; 20]>, OscarError> {
    if data.len() % 20 != 0 {
        return Err(OscarError::CorruptFrame(format!(
            "SHA list length {} is not a multiple of 20",
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(20)
        .map(|c| {
            let mut sha = [0u8; 20];
            sha.copy_from_slice(c);
            sha
        })
        .collect())
}

/// Decode a 40-character lowercase hex string into 20 raw bytes.
pub fn sha20_from_hex(kind: &'static str, s: &str) -> Result<[u8; 20], OscarError> {
    if s.len() != 40 {
        return Err(OscarError::Construction {
            kind,
            value: s.to_string(),
            reason: format!("expected 40 hex characters, got {}", s.len()),
        });
    }
    let mut sha = [0u8; 20];
    hex::decode_to_slice(s, &mut sha).map_err(|e| OscarError::Construction {
        kind,
        value: s.to_string(),
        reason: e.to_string(),
    })?;
    Ok(sha)
}


// ─── Property-based tests (proptest) ─────────────────────────────────
