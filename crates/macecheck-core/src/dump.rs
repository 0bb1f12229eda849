//! Raw tensor dumps written by the device under test.
//!
//! A dump is a headerless run of native-endian `f32` values stored at
//! `<prefix>_<sanitized node name>`. The shape lives on the command line.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::{Buf, Bytes};
use tracing::{debug, warn};

/// Replaces every maximal run of characters outside `[0-9a-zA-Z]` with a
/// single `_`.
///
/// Must match the scheme the dumping runtime uses or lookups miss silently.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

/// Path of the dump for node `name` under `prefix`.
pub fn dump_path(prefix: &str, name: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}_{}", sanitize_name(name)))
}

/// Reads a dump as a flat buffer.
///
/// A path that is not an existing regular file yields an empty buffer; the
/// comparator decides what an empty dump means.
pub fn load_dump(path: impl AsRef<Path>) -> Result<Vec<f32>> {
    let path = path.as_ref();
    if !path.is_file() {
        debug!(path = %path.display(), "dump not found, treating as empty");
        return Ok(Vec::new());
    }

    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read dump {}", path.display()))
        }
    };

    let values = f32_from_ne_bytes(Bytes::from(raw));
    debug!(path = %path.display(), elements = values.len(), "loaded dump");
    Ok(values)
}

fn f32_from_ne_bytes(mut bytes: Bytes) -> Vec<f32> {
    let mut values = Vec::with_capacity(bytes.len() / 4);
    while bytes.remaining() >= 4 {
        values.push(bytes.get_f32_ne());
    }
    if bytes.has_remaining() {
        warn!(
            trailing = bytes.remaining(),
            "dump length is not a multiple of 4 bytes, ignoring the tail"
        );
    }
    values
}
