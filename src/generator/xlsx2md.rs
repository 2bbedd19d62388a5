use crate::converter::xlsx2csv;
use crate::generator::csv2md;

pub fn run(file_stream: &[u8]) -> Result<String, String> {
    let csvs = xlsx2csv::xlsx_to_csv(file_stream, None)?;
    render_sheets(csvs.sheets())
}

/// One `## <sheet>` section per worksheet, first row used as the table header.
fn render_sheets<'a>(sheets: impl Iterator<Item = (&'a str, &'a str)>) -> Result<String, String> {
    let mut markdown = String::new();

    for (name, csv) in sheets {
        log::debug!("rendering sheet '{}'", name);
        markdown.push_str(&format!("## {}\n\n", name));
        if csv.trim().is_empty() {
            markdown.push_str("_Empty sheet_\n\n");
            continue;
        }
        let table = csv2md::run(csv.as_bytes())
            .map_err(|e| format!("Failed to convert CSV for sheet '{}': {}", name, e))?;
        markdown.push_str(&table);
        markdown.push('\n');
    }

    if markdown.is_empty() {
        return Err("No sheets found in XLSX file".to_string());
    }
    Ok(markdown)
}
