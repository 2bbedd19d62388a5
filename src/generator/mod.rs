//! One module per source format, each turning raw bytes into Markdown.

pub mod audio2md;
pub mod csv2md;
pub mod docx2md;
pub mod epub2md;
pub mod html2md;
pub mod image2md;
pub mod json2md;
pub mod pdf2md;
pub mod pptx2md;
pub mod xlsx2md;
pub mod xml2md;
