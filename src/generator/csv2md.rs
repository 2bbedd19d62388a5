use csv::ReaderBuilder;
use std::io::Cursor;

pub fn run(bytes: &[u8]) -> Result<String, String> {
    let cursor = Cursor::new(bytes);
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(cursor);

    // Extract headers before iterating over records
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| format!("CSV parsing error: {}", e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|err| format!("CSV parsing error: {}", err))?;
        rows.push(
            record
                .iter()
                .map(|cell| cell.trim().to_string())
                .collect::<Vec<_>>(),
        );
    }

    if headers.iter().all(|h| h.is_empty()) && rows.is_empty() {
        return Err("Empty or invalid CSV data".to_string());
    }

    Ok(markdown_table(&headers, &rows))
}

/// Renders a header plus rows as a pipe table. Short rows are padded, long rows
/// widen the table.
pub(crate) fn markdown_table(header: &[String], rows: &[Vec<String>]) -> String {
    let width = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let mut markdown = String::new();
    push_row(&mut markdown, header, width);

    // Add separator row
    markdown.push_str("| ");
    markdown.push_str(&vec!["---"; width].join(" | "));
    markdown.push_str(" |\n");

    for row in rows {
        push_row(&mut markdown, row, width);
    }
    markdown
}

fn push_row(markdown: &mut String, cells: &[String], width: usize) {
    let row = (0..width)
        .map(|i| cells.get(i).map(|c| escape_cell(c)).unwrap_or_default())
        .collect::<Vec<String>>()
        .join(" | ");
    markdown.push_str("| ");
    markdown.push_str(&row);
    markdown.push_str(" |\n");
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace(['\r', '\n'], " ")
}
