//! Stylesheet (`xl/styles.xml`) parsing and patching.
//!
//! Only the three sections that cell protection touches are modeled:
//! `cellStyleXfs`, `cellXfs` and `cellStyles`. Each `xf` keeps its attributes
//! and non-protection children verbatim, so unlocking a cell format never
//! disturbs its number format, font, fill, border or alignment. Every other
//! section of the stylesheet passes through untouched.

use std::collections::{BTreeSet, HashMap};

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

use crate::error::XlsxResult;
use crate::xml::{attrs_of, capture_inner, parse_xml_bool, push_attrs, render_tag, skip_to_end};

/// Name of the shared unlocked named style. At most one style with this name
/// exists per workbook; it is reused when already present.
pub const UNLOCKED_STYLE_NAME: &str = "unlocked_style";

/// Relationship type of the stylesheet part
pub const STYLES_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

/// Content type of the stylesheet part
pub const STYLES_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";

/// Stylesheet used when the container carries no `xl/styles.xml`
const MINIMAL_STYLES_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
  <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
  <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>
"#;

/// Cell-level protection flags of an `xf`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellProtection {
    /// Cell is locked while the sheet is protected
    pub locked: bool,
    /// Formula is hidden while the sheet is protected
    pub hidden: bool,
}

impl Default for CellProtection {
    fn default() -> Self {
        // SpreadsheetML defaults when the element or attribute is absent.
        Self {
            locked: true,
            hidden: false,
        }
    }
}

/// A child element of an `xf` other than `<protection>`, kept verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct XfChild {
    tag: String,
    raw: String,
}

/// One `xf` record from `cellStyleXfs` or `cellXfs`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Xf {
    attrs: Vec<(String, String)>,
    children: Vec<XfChild>,
    protection: Option<CellProtection>,
}

impl Xf {
    /// The default cell format (Normal)
    fn base() -> Self {
        Self {
            attrs: vec![
                ("numFmtId".into(), "0".into()),
                ("fontId".into(), "0".into()),
                ("fillId".into(), "0".into()),
                ("borderId".into(), "0".into()),
            ],
            children: Vec::new(),
            protection: None,
        }
    }

    /// Look up an attribute value
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set_attr(&mut self, key: &str, value: String) {
        if let Some(entry) = self.attrs.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.attrs.push((key.to_string(), value));
        }
    }

    /// Effective lock state (locked when no `<protection>` is present)
    pub fn is_locked(&self) -> bool {
        self.protection.unwrap_or_default().locked
    }

    /// A copy of this format with protection turned off and everything else
    /// (number format, font, fill, border, alignment) intact
    fn unlocked(&self) -> Self {
        let mut xf = self.clone();
        xf.protection = Some(CellProtection {
            locked: false,
            hidden: self.protection.unwrap_or_default().hidden,
        });
        xf.set_attr("applyProtection", "1".to_string());
        xf
    }

    fn render(&self, out: &mut String) {
        out.push_str("<xf");
        push_attrs(out, &self.attrs);

        let protection_xml = self.protection.map(render_protection);
        if self.children.is_empty() && protection_xml.is_none() {
            out.push_str("/>");
            return;
        }
        out.push('>');

        // Schema order within xf: alignment, protection, then anything else.
        for child in self.children.iter().filter(|c| c.tag == "alignment") {
            out.push_str(&child.raw);
        }
        if let Some(protection) = protection_xml {
            out.push_str(&protection);
        }
        for child in self.children.iter().filter(|c| c.tag != "alignment") {
            out.push_str(&child.raw);
        }
        out.push_str("</xf>");
    }
}

fn render_protection(p: CellProtection) -> String {
    let mut s = String::from("<protection");
    if !p.locked {
        s.push_str(" locked=\"0\"");
    }
    if p.hidden {
        s.push_str(" hidden=\"1\"");
    }
    s.push_str("/>");
    s
}

/// One `<cellStyle>` entry (a named style)
#[derive(Debug, Clone, Default)]
pub struct CellStyleEntry {
    attrs: Vec<(String, String)>,
    children_raw: String,
}

impl CellStyleEntry {
    /// Look up an attribute value
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn render(&self, out: &mut String) {
        out.push_str("<cellStyle");
        push_attrs(out, &self.attrs);
        if self.children_raw.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            out.push_str(&self.children_raw);
            out.push_str("</cellStyle>");
        }
    }
}

/// Parsed-and-patchable view of `xl/styles.xml`
#[derive(Debug)]
pub struct Stylesheet {
    source: Vec<u8>,
    style_xfs: Vec<Xf>,
    cell_xfs: Vec<Xf>,
    cell_styles: Vec<CellStyleEntry>,
    synthesized: bool,
    dirty: bool,
}

/// Mapping from a sheet's original `s=` indices to unlocked cell formats
#[derive(Debug)]
pub struct StyleRemap {
    /// Index of the shared `unlocked_style` cell format; applied to cells
    /// with the default style and to materialized empty cells
    pub default_unlocked: u32,
    map: HashMap<u32, u32>,
}

impl StyleRemap {
    /// The unlocked cell format index for a cell's original `s=` attribute
    pub fn target(&self, s: Option<u32>) -> u32 {
        match s {
            None => self.default_unlocked,
            Some(s) => self.map.get(&s).copied().unwrap_or(self.default_unlocked),
        }
    }
}

impl Stylesheet {
    /// Parse a stylesheet part; `None` synthesizes a minimal one (the
    /// container carried no `xl/styles.xml`)
    pub fn parse(source: Option<&[u8]>) -> XlsxResult<Self> {
        let (bytes, synthesized) = match source {
            Some(b) => (b.to_vec(), false),
            None => (MINIMAL_STYLES_XML.to_vec(), true),
        };

        let mut style_xfs = Vec::new();
        let mut cell_xfs = Vec::new();
        let mut cell_styles = Vec::new();

        let mut reader = Reader::from_reader(bytes.as_slice());
        reader.trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"cellStyleXfs" => {
                        let end = e.name().as_ref().to_vec();
                        style_xfs = read_xfs(&mut reader, &end)?;
                    }
                    b"cellXfs" => {
                        let end = e.name().as_ref().to_vec();
                        cell_xfs = read_xfs(&mut reader, &end)?;
                    }
                    b"cellStyles" => {
                        let end = e.name().as_ref().to_vec();
                        cell_styles = read_cell_styles(&mut reader, &end)?;
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(Self {
            source: bytes,
            style_xfs,
            cell_xfs,
            cell_styles,
            synthesized,
            dirty: false,
        })
    }

    /// Whether this stylesheet was synthesized because the part was absent
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }

    /// Whether any format was added since parsing
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of cell formats (`cellXfs` entries)
    pub fn cell_xf_count(&self) -> usize {
        self.cell_xfs.len()
    }

    /// Number of named styles (`cellStyles` entries)
    pub fn named_style_count(&self) -> usize {
        self.cell_styles.len()
    }

    /// Look up a cell format
    pub fn cell_xf(&self, index: u32) -> Option<&Xf> {
        self.cell_xfs.get(index as usize)
    }

    /// Get the cell-format index of the shared `unlocked_style` named style,
    /// reusing an existing definition or creating one. Never creates a
    /// duplicate named style.
    pub fn ensure_unlocked_style(&mut self) -> u32 {
        if let Some(style) = self
            .cell_styles
            .iter()
            .find(|s| s.attr("name") == Some(UNLOCKED_STYLE_NAME))
        {
            let style_xf_id: u32 = style
                .attr("xfId")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let style_xf_id_str = style_xf_id.to_string();

            if let Some(i) = self.cell_xfs.iter().position(|xf| {
                xf.attr("xfId") == Some(style_xf_id_str.as_str()) && !xf.is_locked()
            }) {
                log::debug!("reusing existing {} cell format {}", UNLOCKED_STYLE_NAME, i);
                return i as u32;
            }

            // The named style exists but no unlocked cell format references
            // it yet; add one based on its style xf.
            let mut xf = self
                .style_xfs
                .get(style_xf_id as usize)
                .cloned()
                .unwrap_or_else(Xf::base);
            xf.set_attr("xfId", style_xf_id_str);
            let xf = xf.unlocked();
            self.cell_xfs.push(xf);
            self.dirty = true;
            return (self.cell_xfs.len() - 1) as u32;
        }

        // Create the named style from the default style xf.
        let style_xf = self
            .style_xfs
            .first()
            .cloned()
            .unwrap_or_else(Xf::base)
            .unlocked();
        self.style_xfs.push(style_xf);
        let style_xf_id = (self.style_xfs.len() - 1) as u32;

        self.cell_styles.push(CellStyleEntry {
            attrs: vec![
                ("name".into(), UNLOCKED_STYLE_NAME.into()),
                ("xfId".into(), style_xf_id.to_string()),
            ],
            children_raw: String::new(),
        });

        let mut cell_xf = self
            .style_xfs
            .first()
            .cloned()
            .unwrap_or_else(Xf::base);
        cell_xf.set_attr("xfId", style_xf_id.to_string());
        let cell_xf = cell_xf.unlocked();
        self.cell_xfs.push(cell_xf);
        self.dirty = true;
        log::debug!(
            "created {} named style (style xf {})",
            UNLOCKED_STYLE_NAME,
            style_xf_id
        );
        (self.cell_xfs.len() - 1) as u32
    }

    /// Get a cell format identical to `index` except unlocked, deduplicated
    /// against existing formats. An index out of range maps to the shared
    /// unlocked style.
    pub fn unlocked_variant(&mut self, index: u32) -> u32 {
        let Some(xf) = self.cell_xfs.get(index as usize) else {
            return self.ensure_unlocked_style();
        };
        if !xf.is_locked() {
            return index;
        }

        let unlocked = xf.unlocked();
        if let Some(i) = self.cell_xfs.iter().position(|x| *x == unlocked) {
            return i as u32;
        }
        self.cell_xfs.push(unlocked);
        self.dirty = true;
        (self.cell_xfs.len() - 1) as u32
    }

    /// Build the remap for every `s=` index used by the target sheet.
    /// Index 0 (the default format) maps to the shared unlocked style.
    pub fn build_remap(&mut self, used: &BTreeSet<u32>) -> StyleRemap {
        let default_unlocked = self.ensure_unlocked_style();
        let mut map = HashMap::new();
        for &s in used {
            let target = if s == 0 {
                default_unlocked
            } else {
                self.unlocked_variant(s)
            };
            map.insert(s, target);
        }
        StyleRemap {
            default_unlocked,
            map,
        }
    }

    /// Re-render the stylesheet: the three modeled sections are rebuilt,
    /// everything else passes through from the original part untouched.
    pub fn render(&self) -> XlsxResult<Vec<u8>> {
        let mut reader = Reader::from_reader(self.source.as_slice());
        reader.trim_text(false);
        let mut buf = Vec::new();
        let mut writer = Writer::new(Vec::with_capacity(self.source.len() + 256));

        let mut emitted_style_xfs = false;
        let mut emitted_cell_xfs = false;
        let mut emitted_cell_styles = false;

        loop {
            let event = reader.read_event_into(&mut buf)?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e)
                    if e.local_name().as_ref() == b"cellStyleXfs" =>
                {
                    if !emitted_style_xfs {
                        let mut section = String::new();
                        self.render_style_xfs(&mut section);
                        writer.get_mut().extend_from_slice(section.as_bytes());
                        emitted_style_xfs = true;
                    }
                    if matches!(event, Event::Start(_)) {
                        skip_to_end(&mut reader, e.name().as_ref())?;
                    }
                }
                Event::Start(ref e) | Event::Empty(ref e)
                    if e.local_name().as_ref() == b"cellXfs" =>
                {
                    let mut section = String::new();
                    // A stylesheet without cellStyleXfs still needs the
                    // section once we reference a style xf from it.
                    if !emitted_style_xfs && !self.style_xfs.is_empty() {
                        self.render_style_xfs(&mut section);
                        emitted_style_xfs = true;
                    }
                    if !emitted_cell_xfs {
                        self.render_cell_xfs(&mut section);
                        emitted_cell_xfs = true;
                    }
                    writer.get_mut().extend_from_slice(section.as_bytes());
                    if matches!(event, Event::Start(_)) {
                        skip_to_end(&mut reader, e.name().as_ref())?;
                    }
                }
                Event::Start(ref e) | Event::Empty(ref e)
                    if e.local_name().as_ref() == b"cellStyles" =>
                {
                    if !emitted_cell_styles {
                        let mut section = String::new();
                        self.render_cell_styles(&mut section);
                        writer.get_mut().extend_from_slice(section.as_bytes());
                        emitted_cell_styles = true;
                    }
                    if matches!(event, Event::Start(_)) {
                        skip_to_end(&mut reader, e.name().as_ref())?;
                    }
                }
                Event::End(ref e) if e.local_name().as_ref() == b"styleSheet" => {
                    // Sections the source never carried get appended here.
                    let mut section = String::new();
                    if !emitted_style_xfs && !self.style_xfs.is_empty() {
                        self.render_style_xfs(&mut section);
                    }
                    if !emitted_cell_xfs && !self.cell_xfs.is_empty() {
                        self.render_cell_xfs(&mut section);
                    }
                    if !emitted_cell_styles && !self.cell_styles.is_empty() {
                        self.render_cell_styles(&mut section);
                    }
                    writer.get_mut().extend_from_slice(section.as_bytes());
                    writer.write_event(event.clone().into_owned())?;
                }
                Event::Eof => break,
                ev => writer.write_event(ev.into_owned())?,
            }
            buf.clear();
        }

        Ok(writer.into_inner())
    }

    fn render_style_xfs(&self, out: &mut String) {
        out.push_str(&format!("<cellStyleXfs count=\"{}\">", self.style_xfs.len()));
        for xf in &self.style_xfs {
            xf.render(out);
        }
        out.push_str("</cellStyleXfs>");
    }

    fn render_cell_xfs(&self, out: &mut String) {
        out.push_str(&format!("<cellXfs count=\"{}\">", self.cell_xfs.len()));
        for xf in &self.cell_xfs {
            xf.render(out);
        }
        out.push_str("</cellXfs>");
    }

    fn render_cell_styles(&self, out: &mut String) {
        out.push_str(&format!("<cellStyles count=\"{}\">", self.cell_styles.len()));
        for style in &self.cell_styles {
            style.render(out);
        }
        out.push_str("</cellStyles>");
    }
}

/// Read the `xf` records of a `cellStyleXfs`/`cellXfs` section
fn read_xfs(reader: &mut Reader<&[u8]>, container_end: &[u8]) -> XlsxResult<Vec<Xf>> {
    let mut xfs = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Empty(ref e) if e.local_name().as_ref() == b"xf" => {
                xfs.push(Xf {
                    attrs: attrs_of(e)?,
                    children: Vec::new(),
                    protection: None,
                });
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"xf" => {
                let attrs = attrs_of(e)?;
                let end = e.name().as_ref().to_vec();
                let (children, protection) = read_xf_children(reader, &end)?;
                xfs.push(Xf {
                    attrs,
                    children,
                    protection,
                });
            }
            Event::End(ref e) if e.name().as_ref() == container_end => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(xfs)
}

/// Read an xf's children, splitting out `<protection>` from the rest
fn read_xf_children(
    reader: &mut Reader<&[u8]>,
    xf_end: &[u8],
) -> XlsxResult<(Vec<XfChild>, Option<CellProtection>)> {
    let mut children = Vec::new();
    let mut protection = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Empty(ref e) | Event::Start(ref e)
                if e.local_name().as_ref() == b"protection" =>
            {
                let mut p = CellProtection::default();
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value()?;
                    match attr.key.as_ref() {
                        b"locked" => p.locked = parse_xml_bool(&value),
                        b"hidden" => p.hidden = parse_xml_bool(&value),
                        _ => {}
                    }
                }
                protection = Some(p);
                if matches!(event, Event::Start(_)) {
                    skip_to_end(reader, e.name().as_ref())?;
                }
            }
            Event::Empty(ref e) => {
                children.push(XfChild {
                    tag: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    raw: render_tag(e, true)?,
                });
            }
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let name = e.name().as_ref().to_vec();
                let mut raw = render_tag(e, false)?;
                raw.push_str(&capture_inner(reader, &name)?);
                raw.push_str("</");
                raw.push_str(&String::from_utf8_lossy(&name));
                raw.push('>');
                children.push(XfChild { tag, raw });
            }
            Event::End(ref e) if e.name().as_ref() == xf_end => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((children, protection))
}

/// Read the entries of a `cellStyles` section
fn read_cell_styles(
    reader: &mut Reader<&[u8]>,
    container_end: &[u8],
) -> XlsxResult<Vec<CellStyleEntry>> {
    let mut styles = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Empty(ref e) if e.local_name().as_ref() == b"cellStyle" => {
                styles.push(CellStyleEntry {
                    attrs: attrs_of(e)?,
                    children_raw: String::new(),
                });
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"cellStyle" => {
                let attrs = attrs_of(e)?;
                let end = e.name().as_ref().to_vec();
                let children_raw = capture_inner(reader, &end)?;
                styles.push(CellStyleEntry {
                    attrs,
                    children_raw,
                });
            }
            Event::End(ref e) if e.name().as_ref() == container_end => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(styles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STYLES_WITH_FORMATS: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts>
  <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="3">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="14" fontId="1" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"><alignment wrapText="1"/></xf>
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyProtection="1"><protection locked="0"/></xf>
  </cellXfs>
  <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#;

    const STYLES_WITH_UNLOCKED_STYLE: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
  <fills count="1"><fill><patternFill patternType="none"/></fill></fills>
  <borders count="1"><border/></borders>
  <cellStyleXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/><xf numFmtId="0" fontId="0" fillId="0" borderId="0" applyProtection="1"><protection locked="0"/></xf></cellStyleXfs>
  <cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="1" applyProtection="1"><protection locked="0"/></xf></cellXfs>
  <cellStyles count="2"><cellStyle name="Normal" xfId="0" builtinId="0"/><cellStyle name="unlocked_style" xfId="1"/></cellStyles>
</styleSheet>"#;

    #[test]
    fn test_parse_counts() {
        let styles = Stylesheet::parse(Some(STYLES_WITH_FORMATS)).unwrap();
        assert_eq!(styles.cell_xf_count(), 3);
        assert_eq!(styles.named_style_count(), 1);
        assert!(!styles.is_synthesized());
        assert!(!styles.is_dirty());
    }

    #[test]
    fn test_locked_state() {
        let styles = Stylesheet::parse(Some(STYLES_WITH_FORMATS)).unwrap();
        assert!(styles.cell_xf(0).unwrap().is_locked());
        assert!(styles.cell_xf(1).unwrap().is_locked());
        assert!(!styles.cell_xf(2).unwrap().is_locked());
    }

    #[test]
    fn test_ensure_creates_named_style_once() {
        let mut styles = Stylesheet::parse(Some(STYLES_WITH_FORMATS)).unwrap();
        let first = styles.ensure_unlocked_style();
        let second = styles.ensure_unlocked_style();

        assert_eq!(first, second);
        assert_eq!(styles.named_style_count(), 2);
        assert!(!styles.cell_xf(first).unwrap().is_locked());
    }

    #[test]
    fn test_ensure_reuses_existing_named_style() {
        let mut styles = Stylesheet::parse(Some(STYLES_WITH_UNLOCKED_STYLE)).unwrap();
        let index = styles.ensure_unlocked_style();

        assert_eq!(index, 1);
        assert_eq!(styles.named_style_count(), 2);
        assert!(!styles.is_dirty());
    }

    #[test]
    fn test_unlocked_variant_preserves_formatting() {
        let mut styles = Stylesheet::parse(Some(STYLES_WITH_FORMATS)).unwrap();
        let variant = styles.unlocked_variant(1);

        assert_ne!(variant, 1);
        let xf = styles.cell_xf(variant).unwrap();
        assert!(!xf.is_locked());
        assert_eq!(xf.attr("numFmtId"), Some("14"));
        assert_eq!(xf.attr("fontId"), Some("1"));
        assert_eq!(xf.attr("applyProtection"), Some("1"));

        // Dedupe: asking again yields the same index
        assert_eq!(styles.unlocked_variant(1), variant);
    }

    #[test]
    fn test_unlocked_variant_of_already_unlocked() {
        let mut styles = Stylesheet::parse(Some(STYLES_WITH_FORMATS)).unwrap();
        assert_eq!(styles.unlocked_variant(2), 2);
        assert!(!styles.is_dirty());
    }

    #[test]
    fn test_build_remap() {
        let mut styles = Stylesheet::parse(Some(STYLES_WITH_FORMATS)).unwrap();
        let used: BTreeSet<u32> = [0u32, 1, 2].into_iter().collect();
        let remap = styles.build_remap(&used);

        assert_eq!(remap.target(None), remap.default_unlocked);
        assert_eq!(remap.target(Some(0)), remap.default_unlocked);
        assert_eq!(remap.target(Some(2)), 2);

        let formatted = remap.target(Some(1));
        assert_eq!(styles.cell_xf(formatted).unwrap().attr("numFmtId"), Some("14"));
        assert!(!styles.cell_xf(formatted).unwrap().is_locked());
    }

    #[test]
    fn test_render_updates_counts_and_preserves_fonts() {
        let mut styles = Stylesheet::parse(Some(STYLES_WITH_FORMATS)).unwrap();
        styles.ensure_unlocked_style();
        let rendered = String::from_utf8(styles.render().unwrap()).unwrap();

        assert!(rendered.contains(r#"<cellXfs count="4">"#));
        assert!(rendered.contains(r#"<cellStyles count="2">"#));
        assert!(rendered.contains(r#"<cellStyle name="unlocked_style""#));
        assert!(rendered.contains(r#"<protection locked="0"/>"#));
        // Untouched sections pass through
        assert!(rendered.contains(r#"<fonts count="2">"#));
        assert!(rendered.contains("<b/>"));
        // Alignment children survive the rebuild
        assert!(rendered.contains(r#"<alignment wrapText="1"/>"#));
    }

    #[test]
    fn test_synthesized_minimal_stylesheet() {
        let mut styles = Stylesheet::parse(None).unwrap();
        assert!(styles.is_synthesized());

        let index = styles.ensure_unlocked_style();
        assert_eq!(index, 1);
        let rendered = String::from_utf8(styles.render().unwrap()).unwrap();
        assert!(rendered.contains(r#"<cellStyle name="unlocked_style""#));
    }
}
