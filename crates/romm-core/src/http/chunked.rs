//! Chunked transfer-encoding decoder.
//!
//! Used only by the buffered body path; the streamed (download) path
//! rejects chunked responses outright so the storage writer remains the
//! single length authority.

/// Never validate that a chunk size fits a pointer — clamp to a sane
/// maximum instead of trusting the peer.
pub const MAX_CHUNK_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChunkedError {
    #[error("parse: malformed chunk size line")]
    MalformedSize,
    #[error("parse: chunk size exceeds maximum")]
    ChunkTooLarge,
    #[error("parse: missing CRLF after chunk size")]
    MissingSizeCrlf,
    #[error("parse: missing CRLF after chunk data")]
    MissingDataCrlf,
    #[error("parse: truncated chunked body")]
    Truncated,
}

/// Decode a complete chunked body already held in memory. Returns the
/// concatenated chunk payloads.
pub fn decode(input: &[u8]) -> Result<Vec<u8>, ChunkedError> {
    let mut out = Vec::new();
    let mut pos = 0usize;

    loop {
        let line_end = find_crlf(input, pos).ok_or(ChunkedError::MissingSizeCrlf)?;
        let size_line = std::str::from_utf8(&input[pos..line_end]).map_err(|_| ChunkedError::MalformedSize)?;
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        if size_hex.is_empty() {
            return Err(ChunkedError::MalformedSize);
        }
        let size = u64::from_str_radix(size_hex, 16).map_err(|_| ChunkedError::MalformedSize)?;
        if size > MAX_CHUNK_SIZE {
            return Err(ChunkedError::ChunkTooLarge);
        }
        pos = line_end + 2;

        if size == 0 {
            // Trailing CRLF after the zero-size chunk.
            if pos + 2 > input.len() || &input[pos..pos + 2] != b"\r\n" {
                return Err(ChunkedError::Truncated);
            }
            break;
        }

        let data_end = pos + size as usize;
        if data_end > input.len() {
            return Err(ChunkedError::Truncated);
        }
        out.extend_from_slice(&input[pos..data_end]);
        pos = data_end;

        if pos + 2 > input.len() || &input[pos..pos + 2] != b"\r\n" {
            return Err(ChunkedError::MissingDataCrlf);
        }
        pos += 2;
    }

    Ok(out)
}

fn find_crlf(input: &[u8], from: usize) -> Option<usize> {
    input[from..].windows(2).position(|w| w == b"\r\n").map(|p| from + p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_lowercase_hex_chunks() {
        let body = b"5\r\nhello\r\n0\r\n\r\n";
        assert_eq!(decode(body).unwrap(), b"hello");
    }

    #[test]
    fn decodes_uppercase_hex_chunks() {
        let body = b"A\r\n0123456789\r\n0\r\n\r\n";
        assert_eq!(decode(body).unwrap(), b"0123456789");
    }

    #[test]
    fn decodes_multiple_chunks() {
        let body = b"3\r\nfoo\r\n3\r\nbar\r\n0\r\n\r\n";
        assert_eq!(decode(body).unwrap(), b"foobar");
    }

    #[test]
    fn accepts_chunk_extensions() {
        let body = b"5;ext=1\r\nhello\r\n0\r\n\r\n";
        assert_eq!(decode(body).unwrap(), b"hello");
    }

    #[test]
    fn rejects_missing_trailing_crlf() {
        let body = b"5\r\nhello\r\n0\r\n";
        assert!(decode(body).is_err());
    }

    #[test]
    fn rejects_truncated_final_chunk() {
        let body = b"5\r\nhel";
        assert_eq!(decode(body), Err(ChunkedError::Truncated));
    }

    #[test]
    fn rejects_oversized_chunk() {
        let body = b"ffffffff\r\n";
        assert_eq!(decode(body), Err(ChunkedError::ChunkTooLarge));
    }

    #[test]
    fn rejects_missing_data_crlf() {
        let body = b"3\r\nfooXX0\r\n\r\n";
        assert_eq!(decode(body), Err(ChunkedError::MissingDataCrlf));
    }
}
