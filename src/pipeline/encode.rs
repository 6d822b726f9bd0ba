//! Image encoding: file bytes → base64 payload for the provider request.
//!
//! The bytes are sent exactly as they sit on disk; re-encoding a JPEG
//! screenshot would only add artefacts and cost. The MIME type is sniffed
//! from magic bytes rather than trusted from the extension, so a mislabeled
//! file fails here with a clear error instead of confusing the provider.

use crate::error::Shot2DataError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// A base64 payload ready for the provider request body.
pub struct EncodedImage {
    pub base64: String,
    pub mime_type: &'static str,
}

/// Read an image file and base64-encode its bytes.
pub fn encode_path(path: &Path) -> Result<EncodedImage, Shot2DataError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Shot2DataError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => Shot2DataError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Shot2DataError::Internal(format!("Failed to read '{}': {e}", path.display())),
    })?;

    let mime_type = sniff_mime(&bytes).ok_or_else(|| Shot2DataError::UnsupportedFormat {
        path: path.to_path_buf(),
        magic: leading_magic(&bytes),
    })?;

    let base64 = STANDARD.encode(&bytes);
    debug!(
        "Encoded {} ({} bytes raw, {} bytes base64)",
        path.display(),
        bytes.len(),
        base64.len()
    );
    Ok(EncodedImage { base64, mime_type })
}

/// Identify JPEG/PNG from magic bytes.
fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png")
    } else {
        None
    }
}

fn leading_magic(bytes: &[u8]) -> [u8; 4] {
    let mut magic = [0u8; 4];
    for (slot, byte) in magic.iter_mut().zip(bytes) {
        *slot = *byte;
    }
    magic
}
