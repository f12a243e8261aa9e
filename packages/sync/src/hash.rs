//! Streaming content hashing for local files.
//!
//! Uses MD5, the same function S3-compatible stores use for single-part
//! `ETag`s, so a local digest can be compared directly against a listed one.

use std::io::Read;
use std::path::Path;

use bucket_sync_models::Digest;

/// Read buffer size for hashing.
const CHUNK_SIZE: usize = 256 * 1024;

/// Computes the uppercase hex MD5 digest of everything `reader` yields.
///
/// # Errors
///
/// Returns any error raised while reading.
pub fn hash_reader(mut reader: impl Read) -> std::io::Result<Digest> {
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        context.consume(&buffer[..n]);
    }
    Ok(Digest::new(format!("{:X}", context.finalize())))
}

/// Computes the digest of a file by streaming it from disk.
///
/// The file is opened and closed within the call. This is blocking I/O;
/// async callers should run it on a blocking thread.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a read fails midway.
pub fn hash_file(path: &Path) -> std::io::Result<Digest> {
    let file = std::fs::File::open(path)?;
    hash_reader(file)
}
