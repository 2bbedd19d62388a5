use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use crate::generator::html2md::html_to_markdown;

#[derive(Debug, Default)]
struct FeedEntry {
    title: String,
    link: String,
    date: String,
    summary: String,
}

/// RSS channel or Atom feed.
#[derive(Debug, Default)]
struct Feed {
    title: String,
    description: String,
    entries: Vec<FeedEntry>,
}

pub fn run(bytes: &[u8]) -> Result<String, String> {
    let xml = String::from_utf8_lossy(bytes);
    let (root, feed) = scan(&xml)?;

    match root.as_str() {
        "rss" | "feed" | "RDF" => Ok(render_feed(&feed)),
        _ => Ok(format!("```xml\n{}\n```\n", xml.trim())),
    }
}

fn local_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn href(element: &BytesStart) -> Result<Option<String>, String> {
    for attr_result in element.attributes() {
        let attr = attr_result.map_err(|e| format!("Error reading attribute: {}", e))?;
        if attr.key.as_ref() == b"href" {
            return Ok(Some(String::from_utf8_lossy(&attr.value).into_owned()));
        }
    }
    Ok(None)
}

/// Walks the whole document (rejecting malformed XML) and collects feed fields on the way.
fn scan(xml: &str) -> Result<(String, Feed), String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut root: Option<String> = None;
    let mut feed = Feed::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                root.get_or_insert_with(|| name.clone());
                if name == "item" || name == "entry" {
                    feed.entries.push(FeedEntry::default());
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                root.get_or_insert_with(|| name.clone());
                if name == "link" {
                    if let (Some(entry), Some(link)) = (current_entry(&mut feed, &stack), href(&e)?) {
                        if entry.link.is_empty() {
                            entry.link = link;
                        }
                    }
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(e)) => {
                // HTML entities (&nbsp; ...) are not XML entities; keep them raw
                let text = match e.unescape() {
                    Ok(text) => text.into_owned(),
                    Err(_) => String::from_utf8_lossy(&e).into_owned(),
                };
                collect_text(&mut feed, &stack, text.trim());
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                collect_text(&mut feed, &stack, text.trim());
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "Malformed XML at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(format!("Malformed XML: unclosed element <{}>", stack.join("><")));
    }
    let root = root.ok_or_else(|| "XML document has no root element".to_string())?;
    Ok((root, feed))
}

fn in_entry(stack: &[String]) -> bool {
    stack.iter().any(|name| name == "item" || name == "entry")
}

fn current_entry<'a>(feed: &'a mut Feed, stack: &[String]) -> Option<&'a mut FeedEntry> {
    if in_entry(stack) {
        feed.entries.last_mut()
    } else {
        None
    }
}

fn collect_text(feed: &mut Feed, stack: &[String], text: &str) {
    if text.is_empty() {
        return;
    }
    let Some(field) = stack.last().map(String::as_str) else {
        return;
    };

    if let Some(entry) = current_entry(feed, stack) {
        let target = match field {
            "title" => &mut entry.title,
            "link" => &mut entry.link,
            "pubDate" | "updated" | "published" | "date" => &mut entry.date,
            "description" | "summary" | "content" | "encoded" => &mut entry.summary,
            _ => return,
        };
        if target.is_empty() {
            target.push_str(text);
        }
        return;
    }

    // channel/feed level: only direct children of <channel> or <feed>
    let parent = stack.iter().rev().nth(1).map(String::as_str);
    if matches!(parent, Some("channel") | Some("feed")) {
        let target = match field {
            "title" => &mut feed.title,
            "description" | "subtitle" => &mut feed.description,
            _ => return,
        };
        if target.is_empty() {
            target.push_str(text);
        }
    }
}

fn render_feed(feed: &Feed) -> String {
    let mut markdown = String::new();
    if !feed.title.is_empty() {
        markdown.push_str(&format!("# {}\n\n", feed.title));
    }
    if !feed.description.is_empty() {
        markdown.push_str(&format!("{}\n\n", feed.description));
    }

    for entry in &feed.entries {
        if !entry.title.is_empty() {
            markdown.push_str(&format!("## {}\n", entry.title));
        }
        if !entry.date.is_empty() {
            markdown.push_str(&format!("Published on: {}\n", entry.date));
        }
        if !entry.summary.is_empty() {
            markdown.push('\n');
            markdown.push_str(html_to_markdown(&entry.summary).trim());
            markdown.push('\n');
        }
        if !entry.link.is_empty() {
            markdown.push_str(&format!("\n[Link]({})\n", entry.link));
        }
        markdown.push('\n');
    }
    markdown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rss_feed() {
        let rss = br#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Blog do Zeca</title>
  <description>Notas semanais</description>
  <item>
    <title>Primeiro post</title>
    <link>https://example.org/1</link>
    <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate>
    <description><![CDATA[<p>Ol&aacute; <b>mundo</b></p>]]></description>
  </item>
</channel></rss>"#;
        let md = run(rss).unwrap();
        assert!(md.starts_with("# Blog do Zeca\n\nNotas semanais\n\n## Primeiro post\n"));
        assert!(md.contains("Published on: Mon, 06 Jan 2025 10:00:00 GMT\n"));
        assert!(md.contains("mundo"));
        assert!(md.contains("[Link](https://example.org/1)"));
    }

    #[test]
    fn test_atom_feed_links_from_attributes() {
        let atom = br#"<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Changelog</title>
  <entry><title>v1.2</title><link href="https://example.org/v1.2"/><updated>2025-02-01</updated></entry>
</feed>"#;
        let md = run(atom).unwrap();
        assert!(md.starts_with("# Changelog\n\n## v1.2\nPublished on: 2025-02-01\n"));
        assert!(md.contains("[Link](https://example.org/v1.2)"));
    }

    #[test]
    fn test_plain_xml_is_fenced() {
        let md = run(b"<config><port>8080</port></config>").unwrap();
        assert_eq!(md, "```xml\n<config><port>8080</port></config>\n```\n");
    }

    #[test]
    fn test_malformed_xml() {
        assert!(run(b"<a><b></a>").is_err());
        assert!(run(b"<a><b></b>").is_err());
        assert!(run(b"just text").is_err());
    }
}
