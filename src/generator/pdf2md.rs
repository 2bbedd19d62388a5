use gag::Gag;
use pdf_extract::extract_text_from_mem;
use std::panic::{self, AssertUnwindSafe};

pub fn run(file_stream: &[u8]) -> Result<String, String> {
    let text = extract_quiet(file_stream)?;

    // Pages come back separated by form feeds.
    let markdown = text
        .split('\u{c}')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if markdown.is_empty() {
        return Err("No extractable text found (scanned PDF?)".to_string());
    }

    Ok(markdown)
}

fn extract_quiet(file_stream: &[u8]) -> Result<String, String> {
    // pdf-extract writes parser noise to stdout/stderr and panics on some fonts.
    let _gag_out = Gag::stdout().ok();
    let _gag_err = Gag::stderr().ok();

    panic::catch_unwind(AssertUnwindSafe(|| extract_text_from_mem(file_stream)))
        .map_err(|_| "pdf-extract aborted while parsing the document".to_string())?
        .map_err(|e| format!("pdf-extract could not read document: {}", e))
}
