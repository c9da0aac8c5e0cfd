use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

const TOKEN_PREFIX: &str = "p1.";

/// Encodes the last returned path as an opaque, URL-safe page token.
pub fn encode_page_token(path: &Path) -> String {
    format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(path_bytes(path)))
}

/// Decodes a page token back into the exact path it was built from.
/// Empty, corrupt or foreign tokens yield `None`.
pub fn decode_page_token(token: &str) -> Option<PathBuf> {
    let encoded = token.trim().strip_prefix(TOKEN_PREFIX)?;
    if encoded.is_empty() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(encoded.as_bytes()).ok()?;
    let path = path_from_bytes(bytes)?;
    path.is_absolute().then_some(path)
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
pub(crate) fn path_from_bytes(bytes: Vec<u8>) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStringExt;
    Some(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
pub(crate) fn path_from_bytes(bytes: Vec<u8>) -> Option<PathBuf> {
    String::from_utf8(bytes).ok().map(PathBuf::from)
}
