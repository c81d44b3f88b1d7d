//! Issuer logo handling.
//!
//! A picked file is read once and turned into an [`InlineImage`]; nothing
//! downstream ever sees the original path.

use std::fs;
use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LogoError;

/// Extensions offered by the file picker and accepted by [`InlineImage::from_file`].
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Self-contained base64 image, renderable as a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    mime: String,
    data: String,
}

impl InlineImage {
    pub fn from_bytes(mime: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime: mime.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Reads and encodes a logo file. Fails on unsupported extensions,
    /// unreadable files and empty files.
    pub fn from_file(path: &Path) -> Result<Self, LogoError> {
        let mime = mime_for(path)?;
        let bytes = fs::read(path).map_err(|source| LogoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(LogoError::Empty(path.to_path_buf()));
        }
        debug!(path = %path.display(), bytes = bytes.len(), mime, "encoded logo");
        Ok(Self::from_bytes(mime, &bytes))
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.data)
    }

    /// File extension matching the mime type, used when the image has to be
    /// written next to a compiled document.
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, LogoError> {
        Ok(BASE64.decode(&self.data)?)
    }
}

pub fn is_accepted(path: &Path) -> bool {
    mime_for(path).is_ok()
}

fn mime_for(path: &Path) -> Result<&'static str, LogoError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "webp" => Ok("image/webp"),
        _ => Err(LogoError::UnsupportedFormat(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn encodes_png_as_data_uri() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Logo.PNG");
        fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let img = InlineImage::from_file(&path).unwrap();
        assert_eq!(img.mime(), "image/png");
        assert_eq!(img.data_uri(), "data:image/png;base64,iVBORw==");
        assert_eq!(img.decode().unwrap(), vec![0x89, b'P', b'N', b'G']);
        assert_eq!(img.extension(), "png");
    }

    #[test]
    fn jpeg_extensions_share_a_mime_type() {
        assert!(is_accepted(Path::new("a.jpg")));
        assert!(is_accepted(Path::new("a.JPEG")));
        assert!(is_accepted(Path::new("a.webp")));
        assert!(!is_accepted(Path::new("a.gif")));
        assert!(!is_accepted(Path::new("logo")));
    }

    #[test]
    fn rejects_unsupported_format_before_reading() {
        let err = InlineImage::from_file(Path::new("/does/not/exist.svg")).unwrap_err();
        assert!(matches!(err, LogoError::UnsupportedFormat(name) if name == "exist.svg"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        let err = InlineImage::from_file(&dir.path().join("gone.webp")).unwrap_err();
        assert!(matches!(err, LogoError::Read { .. }));
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blank.jpg");
        fs::write(&path, b"").unwrap();
        assert!(matches!(InlineImage::from_file(&path), Err(LogoError::Empty(_))));
    }
}
