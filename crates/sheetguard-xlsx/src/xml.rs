//! Shared helpers for the event-stream patching passes.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::XlsxResult;

/// Escape text/attribute content for XML output
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Escape text content only (attribute quoting not needed)
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// SpreadsheetML boolean attribute values
pub fn parse_xml_bool(v: &str) -> bool {
    v == "1" || v == "true"
}

/// Collect an element's attributes as (key, unescaped value) pairs,
/// preserving order
pub fn attrs_of(e: &BytesStart) -> XlsxResult<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| quick_xml::Error::InvalidAttr(err))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(attrs)
}

/// Render an attribute list back into a tag body
pub fn push_attrs(out: &mut String, attrs: &[(String, String)]) {
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_xml(value));
        out.push('"');
    }
}

/// Serialize a single tag (without children) into `out`
fn push_tag(out: &mut String, e: &BytesStart, self_closing: bool) -> XlsxResult<()> {
    out.push('<');
    out.push_str(&String::from_utf8_lossy(e.name().as_ref()));
    push_attrs(out, &attrs_of(e)?);
    out.push_str(if self_closing { "/>" } else { ">" });
    Ok(())
}

/// Serialize a single tag (without children) to a string
pub fn render_tag(e: &BytesStart, self_closing: bool) -> XlsxResult<String> {
    let mut out = String::new();
    push_tag(&mut out, e, self_closing)?;
    Ok(out)
}

/// Capture everything between a just-read `Start` event and its matching end
/// tag as raw XML, leaving the reader positioned after the end tag.
///
/// `end_name` is the full (possibly prefixed) tag name of the enclosing
/// element.
pub fn capture_inner<R: std::io::BufRead>(
    reader: &mut Reader<R>,
    end_name: &[u8],
) -> XlsxResult<String> {
    let mut out = String::new();
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if e.name().as_ref() == end_name {
                    depth += 1;
                }
                push_tag(&mut out, &e, false)?;
            }
            Event::Empty(e) => push_tag(&mut out, &e, true)?,
            Event::End(e) => {
                if e.name().as_ref() == end_name {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                out.push_str("</");
                out.push_str(&String::from_utf8_lossy(e.name().as_ref()));
                out.push('>');
            }
            Event::Text(t) => {
                // Raw bytes are still escaped; write them back verbatim.
                out.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            Event::CData(t) => {
                out.push_str("<![CDATA[");
                out.push_str(&String::from_utf8_lossy(t.as_ref()));
                out.push_str("]]>");
            }
            Event::Comment(t) => {
                out.push_str("<!--");
                out.push_str(&String::from_utf8_lossy(t.as_ref()));
                out.push_str("-->");
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

/// Skip everything up to and including the end tag matching a just-read
/// `Start` event.
pub fn skip_to_end<R: std::io::BufRead>(
    reader: &mut Reader<R>,
    end_name: &[u8],
) -> XlsxResult<()> {
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == end_name => depth += 1,
            Event::End(e) if e.name().as_ref() == end_name => {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
            Event::Eof => return Ok(()),
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b&\"c\""), "a&lt;b&amp;&quot;c&quot;");
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn test_capture_inner() {
        let xml = br#"<c r="A1" t="inlineStr"><is><t>hi &amp; bye</t></is></c><c r="B1"/>"#;
        let mut reader = Reader::from_reader(&xml[..]);
        let mut buf = Vec::new();

        // Read past the opening <c>
        match reader.read_event_into(&mut buf).unwrap() {
            Event::Start(e) => assert_eq!(e.name().as_ref(), b"c"),
            other => panic!("unexpected event: {:?}", other),
        }
        buf.clear();

        let inner = capture_inner(&mut reader, b"c").unwrap();
        assert_eq!(inner, "<is><t>hi &amp; bye</t></is>");
    }

    #[test]
    fn test_capture_inner_nested_same_tag() {
        let xml = br#"<a><a>inner</a>tail</a>"#;
        let mut reader = Reader::from_reader(&xml[..]);
        let mut buf = Vec::new();
        reader.read_event_into(&mut buf).unwrap();
        buf.clear();

        let inner = capture_inner(&mut reader, b"a").unwrap();
        assert_eq!(inner, "<a>inner</a>tail");
    }
}
