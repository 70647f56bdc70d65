//! Document formats and the immutable [`Document`] reference type.
//!
//! Formats are a closed enum rather than extension strings so routing can
//! match exhaustively over (source, target) pairs — an unsupported pair is a
//! visible gap in a `match`, not a silent string fallthrough.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Every file format the orchestrator recognises as an input.
///
/// Only a subset is valid as a conversion *target*; see
/// [`DocumentFormat::is_valid_target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Doc,
    Docx,
    Ppt,
    Pptx,
    Xls,
    Xlsx,
    Rtf,
    Odt,
    Odp,
    Ods,
    Epub,
    Mobi,
    Jpg,
    Png,
}

impl DocumentFormat {
    /// Derive the format from a path's extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self, ConvertError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| ConvertError::UnknownFormat {
                path: path.to_path_buf(),
            })?;
        Self::from_extension(&ext).ok_or_else(|| ConvertError::UnknownFormat {
            path: path.to_path_buf(),
        })
    }

    /// Map a lowercase extension to a format. `jpeg` is an alias for `jpg`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Some(match ext {
            "pdf" => Self::Pdf,
            "doc" => Self::Doc,
            "docx" => Self::Docx,
            "ppt" => Self::Ppt,
            "pptx" => Self::Pptx,
            "xls" => Self::Xls,
            "xlsx" => Self::Xlsx,
            "rtf" => Self::Rtf,
            "odt" => Self::Odt,
            "odp" => Self::Odp,
            "ods" => Self::Ods,
            "epub" => Self::Epub,
            "mobi" => Self::Mobi,
            "jpg" | "jpeg" => Self::Jpg,
            "png" => Self::Png,
            _ => return None,
        })
    }

    /// Canonical file extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Ppt => "ppt",
            Self::Pptx => "pptx",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Rtf => "rtf",
            Self::Odt => "odt",
            Self::Odp => "odp",
            Self::Ods => "ods",
            Self::Epub => "epub",
            Self::Mobi => "mobi",
            Self::Jpg => "jpg",
            Self::Png => "png",
        }
    }

    /// Whether this format belongs to the fixed set of conversion targets.
    ///
    /// The target set is deliberately narrower than the input set: legacy
    /// binary formats (doc, ppt, xls) and mobi are accepted as inputs but
    /// never produced.
    pub fn is_valid_target(self) -> bool {
        matches!(
            self,
            Self::Pdf
                | Self::Docx
                | Self::Pptx
                | Self::Xlsx
                | Self::Rtf
                | Self::Odt
                | Self::Epub
                | Self::Jpg
                | Self::Png
        )
    }

    /// Whether this is a raster image format.
    pub fn is_image(self) -> bool {
        matches!(self, Self::Jpg | Self::Png)
    }

    /// Whether this is one of the Word-processor formats handled specially
    /// by the routing table (DOC/DOCX rows).
    pub fn is_word(self) -> bool {
        matches!(self, Self::Doc | Self::Docx)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// An immutable reference to a file on disk: path, declared format, size.
///
/// Created when a request is accepted and never mutated afterwards. The
/// orchestrator never deletes a caller-supplied input; only intermediates it
/// created itself inside the [`crate::workspace::TempWorkspace`] are removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    path: PathBuf,
    format: DocumentFormat,
    size_bytes: u64,
}

impl Document {
    /// Open an existing file as a `Document`, validating existence,
    /// readability, and a recognised extension.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConvertError> {
        let path = path.into();

        let meta = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(ConvertError::PermissionDenied { path });
            }
            Err(_) => return Err(ConvertError::FileNotFound { path }),
        };
        if !meta.is_file() {
            return Err(ConvertError::FileNotFound { path });
        }

        // Metadata can succeed where open fails (mode 000 and similar).
        if let Err(e) = std::fs::File::open(&path) {
            return Err(match e.kind() {
                std::io::ErrorKind::PermissionDenied => ConvertError::PermissionDenied { path },
                _ => ConvertError::FileNotFound { path },
            });
        }

        let format = DocumentFormat::from_path(&path)?;
        Ok(Self {
            path,
            format,
            size_bytes: meta.len(),
        })
    }

    /// Describe a file the pipeline just produced. The caller guarantees the
    /// file exists; size is read best-effort.
    pub(crate) fn produced(path: PathBuf, format: DocumentFormat) -> Self {
        let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self {
            path,
            format,
            size_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}
