//! Plain text files.

use super::{ExtractionMethod, Extracted};

/// Return the file content unchanged. Bytes that are not UTF-8 (a Latin-1
/// or Windows-1252 file, say) become U+FFFD instead of failing the upload.
pub(super) fn extract(bytes: &[u8]) -> Extracted {
    Extracted::new(String::from_utf8_lossy(bytes), ExtractionMethod::Plaintext)
}
