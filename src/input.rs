//! Decoding of byte input.
//!
//! `encoding_rs_io` sniffs a byte-order mark (UTF-8, UTF-16LE, UTF-16BE) and decodes to UTF-8
//! on the fly; input without a BOM is taken as UTF-8.

use encoding_rs_io::DecodeReaderBytesBuilder;
use std::io::{self, BufReader, Read};

/// Read the whole of `reader` as text.
///
/// Arguments:
/// - `max_bytes`: optional hard cap on the decoded UTF-8 size; exceeding it is an
///   `InvalidData` error.
pub(crate) fn read_decoded<R: Read>(reader: R, max_bytes: Option<usize>) -> io::Result<String> {
    // None = sniff BOM; set Some(encoding) to force
    let decoder = DecodeReaderBytesBuilder::new()
        .encoding(None)
        .strip_bom(true)
        .build(reader);
    let mut reader = BufReader::new(decoder);

    let mut bytes = Vec::new();
    let mut chunk = vec![0u8; 8 * 1024];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        if let Some(limit) = max_bytes
            && bytes.len() > limit
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("input exceeds the limit of {limit} bytes"),
            ));
        }
    }
    // The decoder only ever yields valid UTF-8.
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
