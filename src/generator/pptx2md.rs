use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;
use crate::config::Settings;
use crate::generator::csv2md::markdown_table;
use crate::generator::image2md::{self, ImageProcessingMode};

type PptxArchive<'a> = ZipArchive<Cursor<&'a [u8]>>;

pub fn run(file_stream: &[u8], settings: &Settings) -> Result<String, String> {
    let mut archive = ZipArchive::new(Cursor::new(file_stream))
        .map_err(|e| format!("Failed to open PPTX archive: {}", e))?;

    let mut slides: Vec<(usize, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect();
    slides.sort();

    if slides.is_empty() {
        return Err("No slides found in PPTX archive".to_string());
    }

    let mut markdown = String::new();
    for (slide_num, slide_path) in slides {
        markdown.push_str(&format!("<!-- Slide number: {} -->\n\n", slide_num));

        let rels = read_relationships(&mut archive, &slide_path)?;
        let content = read_entry(&mut archive, &slide_path)?;
        let slide_markdown = parse_slide_content(&content, &rels, &mut archive, settings)?;
        markdown.push_str(&slide_markdown);

        if let Some(notes_path) = rels.values().find(|target| target.contains("notesSlides/")) {
            let notes_xml = read_entry(&mut archive, notes_path)?;
            let notes = extract_notes(&notes_xml)?;
            if !notes.trim().is_empty() {
                markdown.push_str("### Notes:\n");
                markdown.push_str(&notes);
                markdown.push('\n');
            }
        }
        markdown.push_str("\n---\n\n");
    }

    Ok(markdown)
}

// ppt/slides/slide12.xml -> 12
fn slide_number(name: &str) -> Option<usize> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

fn read_entry(archive: &mut PptxArchive<'_>, name: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| format!("Failed to access '{}' in ZIP archive: {}", name, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", name, e))?;
    Ok(content)
}

fn read_bytes(archive: &mut PptxArchive<'_>, name: &str) -> Result<Vec<u8>, String> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| format!("Failed to access '{}' in ZIP archive: {}", name, e))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|e| format!("Failed to read '{}': {}", name, e))?;
    Ok(data)
}

/// Maps relationship ids (`rId2`) of a slide to archive paths (`ppt/media/image1.png`).
fn read_relationships(
    archive: &mut PptxArchive<'_>,
    slide_path: &str,
) -> Result<HashMap<String, String>, String> {
    let (dir, file) = slide_path.rsplit_once('/').unwrap_or(("", slide_path));
    let rels_path = format!("{}/_rels/{}.rels", dir, file);
    if archive.by_name(&rels_path).is_err() {
        return Ok(HashMap::new());
    }
    let xml = read_entry(archive, &rels_path)?;

    let mut reader = Reader::from_str(&xml);
    let mut rels = HashMap::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"Relationship" => {
                let id = attribute(&e, b"Id")?;
                let target = attribute(&e, b"Target")?;
                if let (Some(id), Some(target)) = (id, target) {
                    rels.insert(id, resolve_target(dir, &target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Error parsing relationships: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

// ("ppt/slides", "../media/image1.png") -> "ppt/media/image1.png"
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn attribute(element: &BytesStart, key: &[u8]) -> Result<Option<String>, String> {
    for attr_result in element.attributes() {
        let attr = attr_result.map_err(|e| format!("Error reading attribute: {}", e))?;
        if attr.key.as_ref() == key {
            return Ok(Some(String::from_utf8_lossy(&attr.value).into_owned()));
        }
    }
    Ok(None)
}

fn parse_slide_content(
    xml_content: &str,
    rels: &HashMap<String, String>,
    archive: &mut PptxArchive<'_>,
    settings: &Settings,
) -> Result<String, String> {
    let mut reader = Reader::from_str(xml_content);
    let mut markdown = String::new();
    let mut buf = Vec::new();
    let mut shape_is_title = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => match element.name().as_ref() {
                b"p:sp" => shape_is_title = false,
                b"p:ph" => shape_is_title |= is_title_placeholder(&element)?,
                b"p:txBody" => {
                    let text_content = extract_text_body(&mut reader, shape_is_title)?;
                    if !text_content.trim().is_empty() {
                        markdown.push_str(&text_content);
                        markdown.push('\n');
                    }
                }
                b"a:tbl" => {
                    let table_content = extract_table(&mut reader)?;
                    markdown.push_str(&table_content);
                    markdown.push('\n');
                }
                b"a:blip" => {
                    if let Some(image_md) = process_image_element(&element, rels, archive, settings)? {
                        markdown.push_str(&image_md);
                        markdown.push_str("\n\n");
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(element)) => match element.name().as_ref() {
                b"p:ph" => shape_is_title |= is_title_placeholder(&element)?,
                b"a:blip" => {
                    if let Some(image_md) = process_image_element(&element, rels, archive, settings)? {
                        markdown.push_str(&image_md);
                        markdown.push_str("\n\n");
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Error parsing slide XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(markdown)
}

fn is_title_placeholder(element: &BytesStart) -> Result<bool, String> {
    Ok(matches!(
        attribute(element, b"type")?.as_deref(),
        Some("title") | Some("ctrTitle")
    ))
}

fn process_image_element(
    element: &BytesStart,
    rels: &HashMap<String, String>,
    archive: &mut PptxArchive<'_>,
    settings: &Settings,
) -> Result<Option<String>, String> {
    let Some(embed_id) = attribute(element, b"r:embed")? else {
        return Ok(None);
    };
    let Some(target) = rels.get(&embed_id) else {
        return Ok(Some(format!("![Image not found]({})", embed_id)));
    };

    let image_data = read_bytes(archive, target)?;
    match image2md::run_with_mode(
        &image_data,
        ImageProcessingMode::for_settings(settings),
        &settings.image_path,
    ) {
        Ok(md) => Ok(Some(md)),
        Err(e) => {
            // emf/wmf and friends are not images a Markdown viewer can show
            log::debug!("skipping image {}: {}", target, e);
            Ok(Some(format!("![{}]({})", embed_id, target)))
        }
    }
}

fn extract_text_body(reader: &mut Reader<&[u8]>, is_title: bool) -> Result<String, String> {
    let mut text_content = String::new();
    let mut buf = Vec::new();
    let mut current_paragraph = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => {
                if element.name().as_ref() == b"a:t" {
                    let text = extract_text_run(reader)?;
                    current_paragraph.push_str(&text);
                }
            }
            Ok(Event::Empty(element)) => {
                if element.name().as_ref() == b"a:br" {
                    current_paragraph.push(' ');
                }
            }
            Ok(Event::End(element)) => match element.name().as_ref() {
                b"a:p" => {
                    let paragraph = current_paragraph.trim();
                    if !paragraph.is_empty() {
                        if is_title {
                            text_content.push_str(&format!("# {}\n", paragraph));
                        } else {
                            text_content.push_str(&format!("- {}\n", paragraph));
                        }
                    }
                    current_paragraph.clear();
                }
                b"p:txBody" => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Error extracting text body: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(text_content)
}

fn extract_text_run(reader: &mut Reader<&[u8]>) -> Result<String, String> {
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => {
                let unescaped = e
                    .unescape()
                    .map_err(|e| format!("Error decoding text run: {}", e))?;
                text.push_str(&unescaped);
            }
            Ok(Event::End(element)) => {
                if element.name().as_ref() == b"a:t" {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Error extracting text run: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

fn extract_table(reader: &mut Reader<&[u8]>) -> Result<String, String> {
    let mut rows: Vec<Vec<String>> = vec![];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => match element.name().as_ref() {
                b"a:tr" => rows.push(vec![]),
                b"a:tc" => {
                    let cell_content = extract_table_cell(reader)?;
                    if let Some(row) = rows.last_mut() {
                        row.push(cell_content);
                    }
                }
                _ => {}
            },
            Ok(Event::End(element)) => {
                if element.name().as_ref() == b"a:tbl" {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Error extracting table: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    if rows.is_empty() {
        return Ok(String::new());
    }
    let header = rows.remove(0);
    Ok(markdown_table(&header, &rows))
}

fn extract_table_cell(reader: &mut Reader<&[u8]>) -> Result<String, String> {
    let mut cell_content = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => {
                let unescaped = e
                    .unescape()
                    .map_err(|e| format!("Error decoding table cell: {}", e))?;
                cell_content.push_str(&unescaped);
            }
            Ok(Event::End(element)) => match element.name().as_ref() {
                b"a:p" => cell_content.push(' '),
                b"a:tc" => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Error extracting table cell: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(cell_content.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Text of a notes slide, skipping the slide-image and slide-number placeholders.
fn extract_notes(xml_content: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml_content);
    let mut notes = String::new();
    let mut buf = Vec::new();
    let mut in_body = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => match element.name().as_ref() {
                b"p:sp" => in_body = false,
                b"p:txBody" if in_body => {
                    for line in extract_text_body(&mut reader, false)?.lines() {
                        notes.push_str(line.trim_start_matches("- "));
                        notes.push('\n');
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(element)) if element.name().as_ref() == b"p:ph" => {
                in_body = attribute(&element, b"type")?.as_deref() == Some("body");
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Error parsing notes XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    const SLIDE: &str = r#"<p:sld xmlns:a="a" xmlns:p="p" xmlns:r="r"><p:cSld><p:spTree>
        <p:sp><p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
          <p:txBody><a:p><a:r><a:t>Quarterly &amp; Yearly</a:t></a:r></a:p></p:txBody></p:sp>
        <p:sp><p:nvSpPr><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr>
          <p:txBody><a:p><a:r><a:t>Revenue up</a:t></a:r></a:p><a:p><a:r><a:t>Costs down</a:t></a:r></a:p></p:txBody></p:sp>
        <p:graphicFrame><a:graphic><a:graphicData><a:tbl>
          <a:tr><a:tc><a:txBody><a:p><a:r><a:t>Q</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:p><a:r><a:t>Total</a:t></a:r></a:p></a:txBody></a:tc></a:tr>
          <a:tr><a:tc><a:txBody><a:p><a:r><a:t>Q1</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:p><a:r><a:t>10</a:t></a:r></a:p></a:txBody></a:tc></a:tr>
        </a:tbl></a:graphicData></a:graphic></p:graphicFrame>
        </p:spTree></p:cSld></p:sld>"#;

    const NOTES: &str = r#"<p:notes xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>
        <p:sp><p:nvSpPr><p:nvPr><p:ph type="sldImg"/></p:nvPr></p:nvSpPr></p:sp>
        <p:sp><p:nvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr>
          <p:txBody><a:p><a:r><a:t>Mention the hiring freeze</a:t></a:r></a:p></p:txBody></p:sp>
        </p:spTree></p:cSld></p:notes>"#;

    const RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
        <Relationship Id="rId2" Type="notesSlide" Target="../notesSlides/notesSlide1.xml"/>
        </Relationships>"#;

    fn build_pptx(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buffer));
            for (name, body) in entries {
                zip.start_file(*name, FileOptions::default()).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer
    }

    #[test]
    fn test_slide_number() {
        assert_eq!(slide_number("ppt/slides/slide12.xml"), Some(12));
        assert_eq!(slide_number("ppt/slides/_rels/slide1.xml.rels"), None);
        assert_eq!(slide_number("ppt/slideLayouts/slideLayout1.xml"), None);
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("ppt/slides", "../media/image1.png"), "ppt/media/image1.png");
        assert_eq!(resolve_target("ppt/slides", "/ppt/media/a.png"), "ppt/media/a.png");
    }

    #[test]
    fn test_slides_are_ordered_and_rendered() {
        let pptx = build_pptx(&[
            ("ppt/slides/slide2.xml", "<p:sld xmlns:p=\"p\"/>"),
            ("ppt/slides/slide1.xml", SLIDE),
            ("ppt/slides/_rels/slide1.xml.rels", RELS),
            ("ppt/notesSlides/notesSlide1.xml", NOTES),
        ]);
        let md = run(&pptx, &Settings::default()).unwrap();

        let first = md.find("<!-- Slide number: 1 -->").unwrap();
        let second = md.find("<!-- Slide number: 2 -->").unwrap();
        assert!(first < second);
        assert!(md.contains("# Quarterly & Yearly\n"));
        assert!(md.contains("- Revenue up\n- Costs down\n"));
        assert!(md.contains("| Q | Total |\n| --- | --- |\n| Q1 | 10 |\n"));
        assert!(md.contains("### Notes:\nMention the hiring freeze\n"));
    }

    #[test]
    fn test_archive_without_slides() {
        let pptx = build_pptx(&[("docProps/app.xml", "<Properties/>")]);
        assert!(run(&pptx, &Settings::default()).is_err());
    }
}
