use std::io::{Cursor, Read};
use zip::ZipArchive;
use docx_rust::{
    document::{BodyContent, ParagraphContent, RunContent, TableCellContent, TableRowContent},
    DocxFile,
};
use crate::config::Settings;
use crate::converter;
use crate::generator::csv2md::markdown_table;
use crate::generator::image2md::{self, ImageProcessingMode};

pub fn run(file_stream: &[u8], settings: &Settings) -> Result<String, String> {
    if settings.use_pandoc && converter::docx2md::is_pandoc_available(&settings.pandoc_path) {
        log::debug!("converting DOCX with {}", settings.pandoc_path);
        let media_dir = settings.saves_images().then_some(settings.image_path.as_path());
        return converter::docx2md::run(file_stream, &settings.pandoc_path, media_dir);
    }
    run_with_images(file_stream, settings)
}

/// Media parts of the package, handed out in document order.
struct DocxImages {
    images: Vec<(String, Vec<u8>)>,
    next: usize,
}

impl DocxImages {
    fn extract(file_stream: &[u8]) -> Result<Self, String> {
        let mut archive = ZipArchive::new(Cursor::new(file_stream))
            .map_err(|e| format!("Failed to open DOCX archive: {}", e))?;

        let mut images = Vec::new();
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| format!("Failed to access file in ZIP archive: {}", e))?;

            if file.name().starts_with("word/media/") {
                let mut image_data = Vec::new();
                file.read_to_end(&mut image_data)
                    .map_err(|e| format!("Failed to read image data: {}", e))?;
                images.push((file.name().to_string(), image_data));
            }
        }
        // image1.png, image2.png, ... follow insertion order in Word output
        images.sort_by(|a, b| natural_key(&a.0).cmp(&natural_key(&b.0)));

        Ok(Self { images, next: 0 })
    }

    fn next_markdown(&mut self, settings: &Settings) -> Result<Option<String>, String> {
        while let Some((filename, data)) = self.images.get(self.next) {
            self.next += 1;
            if is_web_image(filename) {
                let md = image2md::run_with_mode(
                    data,
                    ImageProcessingMode::for_settings(settings),
                    &settings.image_path,
                )?;
                return Ok(Some(md));
            }
        }
        Ok(None)
    }
}

fn natural_key(name: &str) -> (usize, String) {
    let digits: String = name.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.parse().unwrap_or(usize::MAX), name.to_string())
}

fn is_web_image(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    [".png", ".jpg", ".jpeg", ".gif", ".webp"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

fn run_with_images(file_stream: &[u8], settings: &Settings) -> Result<String, String> {
    let mut images = DocxImages::extract(file_stream)?;

    let docx_file = DocxFile::from_reader(Cursor::new(file_stream))
        .map_err(|e| format!("Failed to read DOCX file: {}", e))?;
    let doc = docx_file
        .parse()
        .map_err(|e| format!("Failed to parse DOCX file: {}", e))?;

    let mut markdown = String::new();

    for content in &doc.document.body.content {
        match content {
            BodyContent::Paragraph(paragraph) => {
                let paragraph_md = process_paragraph(paragraph, &mut images, settings)?;
                if !paragraph_md.trim().is_empty() {
                    markdown.push_str(&paragraph_md);
                    markdown.push_str("\n\n");
                }
            }
            BodyContent::Table(table) => {
                let table_md = process_table(table);
                if !table_md.trim().is_empty() {
                    markdown.push_str(&table_md);
                    markdown.push('\n');
                }
            }
            _ => {}
        }
    }

    Ok(markdown)
}

fn process_paragraph(
    paragraph: &docx_rust::document::Paragraph,
    images: &mut DocxImages,
    settings: &Settings,
) -> Result<String, String> {
    let mut text_content = String::new();
    let mut style = ParagraphStyle::Body;

    if let Some(property) = &paragraph.property {
        if let Some(style_id) = &property.style_id {
            style = check_style(&style_id.value);
        }
    }

    let mut has_bold = false;
    let mut font_size: Option<f32> = None;
    let mut image_md = Vec::new();

    for content in &paragraph.content {
        if let ParagraphContent::Run(run) = content {
            if let Some(props) = &run.property {
                if props.bold.is_some() {
                    has_bold = true;
                }
                if let Some(size) = &props.size {
                    font_size = Some(size.value as f32 / 2.0); // half-points to points
                }
            }

            for run_content in &run.content {
                match run_content {
                    RunContent::Text(text) => text_content.push_str(&text.text),
                    RunContent::Drawing(_) => {
                        if let Some(md) = images.next_markdown(settings)? {
                            image_md.push(md);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    let text = text_content.trim();
    let mut markdown = match style {
        ParagraphStyle::List if !text.is_empty() => format!("- {}", text),
        ParagraphStyle::Heading(level) if !text.is_empty() => {
            format!("{} {}", "#".repeat(level.clamp(1, 6)), text)
        }
        _ => match guess_heading_level(has_bold, font_size, text) {
            Some(level) => format!("{} {}", "#".repeat(level), text),
            None => text.to_string(),
        },
    };

    for md in image_md {
        if !markdown.is_empty() {
            markdown.push_str("\n\n");
        }
        markdown.push_str(&md);
    }
    Ok(markdown)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParagraphStyle {
    Body,
    List,
    Heading(usize),
}

fn check_style(style_name: &str) -> ParagraphStyle {
    let style_lower = style_name.to_lowercase();
    let level_or = |default: usize| {
        style_name
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse::<usize>()
            .unwrap_or(default)
    };

    if style_lower == "title" {
        ParagraphStyle::Heading(1)
    } else if style_lower.contains("subtitle") {
        ParagraphStyle::Heading(2)
    } else if style_lower.starts_with("heading") || style_lower.starts_with("title") {
        ParagraphStyle::Heading(level_or(1))
    } else if style_lower.contains("header") {
        ParagraphStyle::Heading(level_or(3))
    } else if style_lower.contains("list") {
        ParagraphStyle::List
    } else {
        ParagraphStyle::Body
    }
}

/// Font size and bold heuristics for documents that don't use heading styles.
fn guess_heading_level(has_bold: bool, font_size: Option<f32>, content: &str) -> Option<usize> {
    if content.is_empty() {
        return None;
    }

    if let Some(size) = font_size {
        let level = match size as u32 {
            s if s >= 18 => Some(1),
            s if s >= 16 => Some(2),
            s if s >= 14 => Some(3),
            _ => None,
        };
        if level.is_some() && content.len() < 100 && !content.ends_with('.') {
            return level;
        }
    }

    // short, bold lines without closing punctuation
    if has_bold
        && content.len() < 80
        && !content.ends_with(['.', '!', '?', ':'])
        && content.chars().any(|c| c.is_alphabetic())
    {
        return Some(if content.len() < 30 { 2 } else { 3 });
    }

    None
}

fn process_table(table: &docx_rust::document::Table) -> String {
    let mut rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            row.cells
                .iter()
                .map(|cell| match cell {
                    TableRowContent::TableCell(tc) => extract_cell_text(tc),
                    _ => String::new(),
                })
                .collect()
        })
        .collect();

    if rows.is_empty() {
        return String::new();
    }
    let header = rows.remove(0);
    markdown_table(&header, &rows)
}

fn extract_cell_text(cell: &docx_rust::document::TableCell) -> String {
    let mut text = String::new();

    for content in &cell.content {
        let TableCellContent::Paragraph(paragraph) = content;
        for para_content in &paragraph.content {
            if let ParagraphContent::Run(run) = para_content {
                for run_content in &run.content {
                    if let RunContent::Text(text_elem) = run_content {
                        text.push_str(&text_elem.text);
                    }
                }
            }
        }
        if !text.is_empty() && !text.ends_with(' ') {
            text.push(' ');
        }
    }

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_detection() {
        assert_eq!(check_style("Title"), ParagraphStyle::Heading(1));
        assert_eq!(check_style("Subtitle"), ParagraphStyle::Heading(2));
        assert_eq!(check_style("Heading3"), ParagraphStyle::Heading(3));
        assert_eq!(check_style("ListParagraph"), ParagraphStyle::List);
        assert_eq!(check_style("Normal"), ParagraphStyle::Body);
    }

    #[test]
    fn test_heading_heuristics() {
        assert_eq!(guess_heading_level(false, Some(20.0), "Introduction"), Some(1));
        assert_eq!(guess_heading_level(false, Some(11.0), "Introduction"), None);
        assert_eq!(guess_heading_level(true, None, "Results"), Some(2));
        assert_eq!(guess_heading_level(true, None, "A full sentence in bold."), None);
        assert_eq!(guess_heading_level(true, None, ""), None);
    }

    #[test]
    fn test_media_is_ordered_numerically() {
        let mut names = vec!["word/media/image10.png", "word/media/image2.png", "word/media/image1.png"];
        names.sort_by_key(|n| natural_key(n));
        assert_eq!(
            names,
            vec!["word/media/image1.png", "word/media/image2.png", "word/media/image10.png"]
        );
    }

    #[test]
    fn test_cell_paragraphs_are_joined() {
        use docx_rust::document::{Paragraph, TableCell};

        let mut cell = TableCell::paragraph(Paragraph::default().push_text("Lisboa"));
        cell.content
            .push(TableCellContent::Paragraph(Paragraph::default().push_text("Porto")));
        assert_eq!(extract_cell_text(&cell), "Lisboa Porto");
        assert_eq!(extract_cell_text(&TableCell::default()), "");
    }

    #[test]
    fn test_not_a_docx() {
        assert!(run(b"not a zip archive", &Settings::default()).is_err());
    }
}
