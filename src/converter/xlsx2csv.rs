use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

static TEMP_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Configuration for xlsx to csv conversion
pub struct Xlsx2CsvConfig {
    /// Delimiter for CSV output (default: comma)
    pub delimiter: u8,
    /// Whether to use first row as header for column sizing
    pub use_header: bool,
}

impl Default for Xlsx2CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            use_header: false,
        }
    }
}

/// Result of xlsx to csv conversion
pub struct Xlsx2CsvResult {
    /// Sheet names in order
    pub sheet_names: Vec<String>,
    /// CSV content for each sheet
    pub csv_data: Vec<String>,
}

impl Xlsx2CsvResult {
    /// Sheet name paired with its CSV text, in workbook order.
    pub fn sheets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sheet_names
            .iter()
            .map(String::as_str)
            .zip(self.csv_data.iter().map(String::as_str))
    }
}

// ooxml only opens files, so the bytes take a detour through the temp dir.
struct TempWorkbook(PathBuf);

impl TempWorkbook {
    fn write(data: &[u8]) -> Result<Self, String> {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "markitup_xlsx_{}_{}.xlsx",
            std::process::id(),
            seq
        ));
        std::fs::write(&path, data).map_err(|e| format!("Failed to write temp file: {}", e))?;
        Ok(Self(path))
    }
}

impl Drop for TempWorkbook {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Convert xlsx byte data to CSV strings
pub fn xlsx_to_csv(data: &[u8], config: Option<Xlsx2CsvConfig>) -> Result<Xlsx2CsvResult, String> {
    let config = config.unwrap_or_default();

    let temp_file = TempWorkbook::write(data)?;

    let xlsx = ooxml::document::SpreadsheetDocument::open(&temp_file.0)
        .map_err(|e| format!("Failed to open xlsx: {}", e))?;

    let workbook = xlsx.get_workbook();
    let sheet_names = workbook.worksheet_names();

    if sheet_names.is_empty() {
        return Err("No sheets found in xlsx file".to_string());
    }

    let mut csv_data = Vec::new();

    for sheet_name in &sheet_names {
        let csv_string = worksheet_to_csv_string(&workbook, sheet_name, &config)
            .map_err(|e| format!("Failed to convert sheet '{}': {}", sheet_name, e))?;
        csv_data.push(csv_string);
    }

    Ok(Xlsx2CsvResult {
        sheet_names,
        csv_data,
    })
}

/// Convert a single worksheet to CSV string
fn worksheet_to_csv_string(
    workbook: &ooxml::document::Workbook,
    sheet_name: &str,
    config: &Xlsx2CsvConfig,
) -> Result<String, String> {
    let worksheet = workbook
        .get_worksheet_by_name(sheet_name)
        .ok_or_else(|| format!("Sheet '{}' not found", sheet_name))?;

    let mut output = Vec::new();
    {
        // rows of a sheet do not all have the same length
        let mut writer = csv::WriterBuilder::new()
            .delimiter(config.delimiter)
            .flexible(true)
            .from_writer(&mut output);

        let mut rows_iter = worksheet.rows();

        if config.use_header {
            if let Some(header_row) = rows_iter.next() {
                let header_cells: Vec<_> = header_row.collect();
                let column_count = header_cells
                    .iter()
                    .position(|cell| cell.is_empty())
                    .unwrap_or(header_cells.len());

                let cols: Vec<String> = header_cells
                    .iter()
                    .take(column_count)
                    .map(|cell| cell.to_string().unwrap_or_default())
                    .collect();
                writer
                    .write_record(&cols)
                    .map_err(|e| format!("Failed to write header: {}", e))?;

                // Write remaining rows with fixed column count
                for row in rows_iter {
                    let row_cells: Vec<_> = row.collect();
                    let cols: Vec<String> = row_cells
                        .iter()
                        .take(column_count)
                        .map(|cell| cell.to_string().unwrap_or_default())
                        .collect();
                    writer
                        .write_record(&cols)
                        .map_err(|e| format!("Failed to write row: {}", e))?;
                }
            }
        } else {
            for row in rows_iter {
                let row_cells: Vec<_> = row.collect();
                let cols: Vec<String> = row_cells
                    .iter()
                    .map(|cell| cell.to_string().unwrap_or_default())
                    .collect();
                writer
                    .write_record(&cols)
                    .map_err(|e| format!("Failed to write row: {}", e))?;
            }
        }

        writer
            .flush()
            .map_err(|e| format!("Failed to flush writer: {}", e))?;
    } // writer is dropped here, releasing the borrow on output

    String::from_utf8(output).map_err(|e| format!("Failed to convert to UTF-8: {}", e))
}
