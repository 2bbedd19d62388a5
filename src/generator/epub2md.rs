use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;
use crate::generator::html2md::html_to_markdown;

type EpubArchive<'a> = ZipArchive<Cursor<&'a [u8]>>;

#[derive(Debug, Default)]
struct EpubMetadata {
    title: Option<String>,
    authors: Vec<String>,
    publisher: Option<String>,
    language: Option<String>,
    date: Option<String>,
    description: Option<String>,
}

/// What the OPF package document tells us: metadata plus chapter paths in reading order.
#[derive(Debug, Default)]
struct Package {
    metadata: EpubMetadata,
    spine: Vec<String>,
}

pub fn run(file_stream: &[u8]) -> Result<String, String> {
    let mut archive = ZipArchive::new(Cursor::new(file_stream))
        .map_err(|e| format!("Failed to open EPUB archive: {}", e))?;

    let container = read_entry(&mut archive, "META-INF/container.xml")?;
    let opf_path = find_rootfile(&container)?;
    let opf = read_entry(&mut archive, &opf_path)?;
    let package = parse_package(&opf, opf_dir(&opf_path))?;

    let mut markdown = format_metadata(&package.metadata);
    for chapter_path in &package.spine {
        let html = match read_entry(&mut archive, chapter_path) {
            Ok(html) => html,
            Err(e) => {
                log::warn!("skipping chapter {}: {}", chapter_path, e);
                continue;
            }
        };
        let chapter = html_to_markdown(&html);
        if chapter.trim().is_empty() {
            continue;
        }
        markdown.push_str(chapter.trim());
        markdown.push_str("\n\n");
    }

    if markdown.trim().is_empty() {
        return Err("EPUB contains no readable content".to_string());
    }
    Ok(markdown)
}

fn read_entry(archive: &mut EpubArchive<'_>, name: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| format!("Failed to access '{}' in EPUB: {}", name, e))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|e| format!("Failed to read '{}': {}", name, e))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

fn attribute(element: &BytesStart, key: &[u8]) -> Result<Option<String>, String> {
    for attr_result in element.attributes() {
        let attr = attr_result.map_err(|e| format!("Error reading attribute: {}", e))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| format!("Error decoding attribute: {}", e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn find_rootfile(container_xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(container_xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path")? {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => return Err("container.xml names no rootfile".to_string()),
            Err(e) => return Err(format!("Error parsing container.xml: {}", e)),
            _ => {}
        }
        buf.clear();
    }
}

// OEBPS/content.opf -> OEBPS
fn opf_dir(opf_path: &str) -> &str {
    opf_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn join_href(dir: &str, href: &str) -> String {
    // drop fragment, hrefs are relative to the OPF
    let href = href.split('#').next().unwrap_or(href);
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in href.split('/') {
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

fn parse_package(opf_xml: &str, dir: &str) -> Result<Package, String> {
    let mut reader = Reader::from_str(opf_xml);
    let mut buf = Vec::new();

    let mut metadata = EpubMetadata::default();
    let mut manifest: HashMap<String, String> = HashMap::new();
    let mut spine_ids: Vec<String> = Vec::new();
    let mut current_field: Option<Vec<u8>> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if name.starts_with(b"dc:") {
                    current_field = Some(name);
                    text.clear();
                } else {
                    collect_item(&e, &mut manifest, &mut spine_ids)?;
                }
            }
            Ok(Event::Empty(e)) => collect_item(&e, &mut manifest, &mut spine_ids)?,
            Ok(Event::Text(e)) if current_field.is_some() => {
                let unescaped = e
                    .unescape()
                    .map_err(|e| format!("Error decoding metadata: {}", e))?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) if current_field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::End(e)) => {
                if current_field.as_deref() == Some(e.name().as_ref()) {
                    let value = text.trim().to_string();
                    if !value.is_empty() {
                        store_field(&mut metadata, e.name().as_ref(), value);
                    }
                    current_field = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Error parsing package document: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    let spine = spine_ids
        .iter()
        .filter_map(|id| manifest.get(id))
        .map(|href| join_href(dir, href))
        .collect();

    Ok(Package { metadata, spine })
}

fn collect_item(
    element: &BytesStart,
    manifest: &mut HashMap<String, String>,
    spine_ids: &mut Vec<String>,
) -> Result<(), String> {
    match element.local_name().as_ref() {
        b"item" => {
            if let (Some(id), Some(href)) = (attribute(element, b"id")?, attribute(element, b"href")?) {
                manifest.insert(id, href);
            }
        }
        b"itemref" => {
            // non-linear items (covers, footnotes) are out of the reading order
            let linear = attribute(element, b"linear")?;
            if let Some(idref) = attribute(element, b"idref")? {
                if linear.as_deref() != Some("no") {
                    spine_ids.push(idref);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn store_field(metadata: &mut EpubMetadata, name: &[u8], value: String) {
    match name {
        b"dc:title" if metadata.title.is_none() => metadata.title = Some(value),
        b"dc:creator" => metadata.authors.push(value),
        b"dc:publisher" => metadata.publisher = Some(value),
        b"dc:language" => metadata.language = Some(value),
        b"dc:date" => metadata.date = Some(value),
        b"dc:description" => metadata.description = Some(value),
        _ => {}
    }
}

fn format_metadata(metadata: &EpubMetadata) -> String {
    let mut lines = Vec::new();

    if let Some(title) = &metadata.title {
        lines.push(format!("# {}", title));
        lines.push(String::new());
    }
    if !metadata.authors.is_empty() {
        lines.push(format!("**Author:** {}", metadata.authors.join(", ")));
    }
    if let Some(publisher) = &metadata.publisher {
        lines.push(format!("**Publisher:** {}", publisher));
    }
    if let Some(date) = &metadata.date {
        lines.push(format!("**Published:** {}", date));
    }
    if let Some(language) = &metadata.language {
        lines.push(format!("**Language:** {}", language));
    }
    if let Some(description) = &metadata.description {
        lines.push(String::new());
        lines.push(format!("> {}", html_to_markdown(description).trim()));
    }

    if lines.is_empty() {
        return String::new();
    }
    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(String::new());
    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

    const OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Dom Casmurro</dc:title>
    <dc:creator>Machado de Assis</dc:creator>
    <dc:language>pt</dc:language>
  </metadata>
  <manifest>
    <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="c1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="cover" linear="no"/>
    <itemref idref="c1"/>
    <itemref idref="c2"/>
  </spine>
</package>"#;

    fn build_epub(entries: &[(&str, &str)]) -> Vec<u8> {
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
    fn test_chapters_follow_spine_order() {
        let epub = build_epub(&[
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF),
            ("OEBPS/cover.xhtml", "<html><body><p>COVER PAGE</p></body></html>"),
            ("OEBPS/text/ch1.xhtml", "<html><body><p>Uma noite destas</p></body></html>"),
            ("OEBPS/text/ch2.xhtml", "<html><body><p>Agora que expliquei o titulo</p></body></html>"),
        ]);
        let md = run(&epub).unwrap();

        assert!(md.starts_with("# Dom Casmurro\n\n**Author:** Machado de Assis"));
        assert!(md.contains("**Language:** pt"));
        assert!(!md.contains("COVER PAGE"));
        let ch1 = md.find("Uma noite destas").unwrap();
        let ch2 = md.find("Agora que expliquei").unwrap();
        assert!(ch1 < ch2);
    }

    #[test]
    fn test_join_href() {
        assert_eq!(join_href("OEBPS", "text/ch1.xhtml#start"), "OEBPS/text/ch1.xhtml");
        assert_eq!(join_href("OEBPS/text", "../images/a.png"), "OEBPS/images/a.png");
        assert_eq!(join_href("", "ch1.xhtml"), "ch1.xhtml");
    }

    #[test]
    fn test_missing_container() {
        let epub = build_epub(&[("mimetype", "application/epub+zip")]);
        let err = run(&epub).unwrap_err();
        assert!(err.contains("META-INF/container.xml"));
    }
}
