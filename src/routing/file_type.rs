//! File type detection
//!
//! Static extension lookup. No content sniffing: a `.pdf` that is really a
//! ZIP archive is still routed as a PDF.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Word,
    PowerPoint,
    Excel,
    Epub,
    Ebook,
    Html,
    Text,
    Image,
    Unknown,
}

impl FileType {
    /// Categorize a filename by its extension (case-insensitive)
    pub fn detect(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some(ext) => Self::from_extension(ext),
            None => FileType::Unknown,
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "pdf" => FileType::Pdf,
            "doc" | "docx" | "odt" | "rtf" => FileType::Word,
            "ppt" | "pptx" | "odp" => FileType::PowerPoint,
            "xls" | "xlsx" | "ods" | "csv" => FileType::Excel,
            "epub" => FileType::Epub,
            "mobi" | "azw" | "azw3" | "fb2" | "djvu" => FileType::Ebook,
            "html" | "htm" => FileType::Html,
            "txt" | "md" | "markdown" => FileType::Text,
            "png" | "jpg" | "jpeg" | "gif" | "tif" | "tiff" | "bmp" | "webp" => FileType::Image,
            _ => FileType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Word => "word",
            FileType::PowerPoint => "powerpoint",
            FileType::Excel => "excel",
            FileType::Epub => "epub",
            FileType::Ebook => "ebook",
            FileType::Html => "html",
            FileType::Text => "text",
            FileType::Image => "image",
            FileType::Unknown => "unknown",
        }
    }

    /// Office-style documents Tika handles well
    pub fn is_office_document(self) -> bool {
        matches!(
            self,
            FileType::Pdf | FileType::Word | FileType::PowerPoint | FileType::Excel
        )
    }

    /// Formats rendered by the reader itself rather than parsed server-side
    pub fn is_client_side(self) -> bool {
        matches!(self, FileType::Epub | FileType::Ebook)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
