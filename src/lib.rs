use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

pub mod batch;
pub mod config;
pub mod converter;
pub mod error;
pub mod generator;
pub mod interactive;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ConvertError;

use config::Settings;

/// Extensions eligible for conversion when a whole folder is processed.
pub const SUPPORTED_EXTENSIONS: [&str; 15] = [
    ".pdf", ".docx", ".pptx", ".xlsx", ".html", ".htm", ".jpg", ".jpeg", ".png", ".mp3", ".wav",
    ".csv", ".json", ".xml", ".epub",
];

/// Case-insensitive suffix match against [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub struct ConverterFile {
    pub file_path: Option<String>,
    pub file_stream: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Html,
    Image,
    Audio,
    Csv,
    Json,
    Xml,
    Epub,
}

impl Format {
    pub fn from_extension(ext: &str) -> Option<Self> {
        let format = match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Format::Pdf,
            "docx" => Format::Docx,
            "pptx" => Format::Pptx,
            "xlsx" => Format::Xlsx,
            "html" | "htm" => Format::Html,
            "jpg" | "jpeg" | "png" => Format::Image,
            "mp3" | "wav" => Format::Audio,
            "csv" => Format::Csv,
            "json" => Format::Json,
            "xml" => Format::Xml,
            "epub" => Format::Epub,
            _ => return None,
        };
        Some(format)
    }

    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let format = match mime_type {
            "application/pdf" => Format::Pdf,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Format::Docx
            }
            "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                Format::Pptx
            }
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Format::Xlsx,
            "application/epub+zip" => Format::Epub,
            "image/jpeg" | "image/png" | "image/gif" => Format::Image,
            "audio/mpeg" | "audio/x-wav" | "audio/wav" | "audio/wave" => Format::Audio,
            "text/html" => Format::Html,
            "text/xml" | "application/xml" => Format::Xml,
            "text/csv" | "application/csv" => Format::Csv,
            "application/json" => Format::Json,
            _ => return None,
        };
        Some(format)
    }

    fn name(self) -> &'static str {
        match self {
            Format::Pdf => "PDF",
            Format::Docx => "DOCX",
            Format::Pptx => "PPTX",
            Format::Xlsx => "XLSX",
            Format::Html => "HTML",
            Format::Image => "image",
            Format::Audio => "audio",
            Format::Csv => "CSV",
            Format::Json => "JSON",
            Format::Xml => "XML",
            Format::Epub => "EPUB",
        }
    }
}

fn extension_of(file_path: &str) -> Option<String> {
    Path::new(file_path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Extension first, content sniffing second.
fn detect_format(file: &ConverterFile) -> Result<Format, ConvertError> {
    if let Some(ext) = file.file_path.as_deref().and_then(extension_of) {
        if let Some(format) = Format::from_extension(&ext) {
            return Ok(format);
        }
        log::debug!("unknown extension '{}', sniffing content", ext);
    }

    let kind = infer::get(&file.file_stream).ok_or(ConvertError::UnknownType)?;
    let mime_type = kind.mime_type();
    log::debug!("sniffed mime type {}", mime_type);
    Format::from_mime(mime_type).ok_or_else(|| ConvertError::UnsupportedType(mime_type.to_string()))
}

// byte_stream -> String
pub fn convert(file: ConverterFile, settings: &Settings) -> Result<String, ConvertError> {
    if file.file_stream.is_empty() {
        return Err(ConvertError::EmptyInput);
    }

    let format = detect_format(&file)?;
    log::debug!(
        "converting {} ({} bytes) as {}",
        file.file_path.as_deref().unwrap_or("<stream>"),
        file.file_stream.len(),
        format.name()
    );

    // ooxml and docx-rust panic on some malformed archives
    let markdown = panic::catch_unwind(AssertUnwindSafe(|| run_generator(format, &file, settings)))
        .unwrap_or_else(|payload| {
            Err(format!("converter aborted: {}", error::panic_message(payload.as_ref())))
        })
        .map_err(ConvertError::format(format.name()))?;

    Ok(normalize_markdown(&markdown))
}

fn run_generator(format: Format, file: &ConverterFile, settings: &Settings) -> Result<String, String> {
    let bytes = &file.file_stream;
    match format {
        Format::Pdf => generator::pdf2md::run(bytes),
        Format::Docx => generator::docx2md::run(bytes, settings),
        Format::Pptx => generator::pptx2md::run(bytes, settings),
        Format::Xlsx => generator::xlsx2md::run(bytes),
        Format::Html => generator::html2md::run(bytes),
        Format::Image => generator::image2md::run(bytes, settings),
        Format::Audio => {
            let ext = file.file_path.as_deref().and_then(extension_of);
            generator::audio2md::run(bytes, ext.as_deref())
        }
        Format::Csv => generator::csv2md::run(bytes),
        Format::Json => generator::json2md::run(bytes),
        Format::Xml => generator::xml2md::run(bytes),
        Format::Epub => generator::epub2md::run(bytes),
    }
}

pub fn convert_from_path(file_path: &str, settings: &Settings) -> Result<String, ConvertError> {
    let file_stream = std::fs::read(file_path).map_err(|source| ConvertError::Io {
        path: file_path.to_string(),
        source,
    })?;

    let file = ConverterFile {
        file_path: Some(file_path.to_string()),
        file_stream,
    };

    convert(file, settings)
}

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Strips trailing whitespace from every line and collapses runs of blank lines.
pub fn normalize_markdown(markdown: &str) -> String {
    let trimmed = markdown
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUNS.replace_all(&trimmed, "\n\n").trim().to_string()
}

/// Anything that can turn a file on disk into Markdown text.
pub trait DocumentConverter {
    fn convert(&self, path: &Path) -> Result<String, ConvertError>;
}

impl<T: DocumentConverter + ?Sized> DocumentConverter for &T {
    fn convert(&self, path: &Path) -> Result<String, ConvertError> {
        (**self).convert(path)
    }
}

/// The conversion handle: stateless apart from its settings, reused for every file.
#[derive(Debug, Clone, Default)]
pub struct MarkItUp {
    settings: Settings,
}

impl MarkItUp {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

impl DocumentConverter for MarkItUp {
    fn convert(&self, path: &Path) -> Result<String, ConvertError> {
        convert_from_path(&path.to_string_lossy(), &self.settings)
    }
}
