//! Workbook-level metadata: sheet registry and defined names.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::package::{XlsxPackage, WORKBOOK_PART, WORKBOOK_RELS_PART};

/// One worksheet entry from `xl/workbook.xml`
#[derive(Debug, Clone)]
pub struct SheetEntry {
    /// Sheet tab name
    pub name: String,
    /// Relationship id (`r:id`) linking to the sheet part
    pub rel_id: String,
}

/// Sheet registry and defined-names mapping for a package
#[derive(Debug)]
pub struct WorkbookMeta {
    sheets: Vec<SheetEntry>,
    /// rId -> part path (e.g. "xl/worksheets/sheet1.xml")
    rels: HashMap<String, String>,
    /// Defined name -> stored range text (e.g. "Sheet1!$A$1:$A$5")
    defined_names: HashMap<String, String>,
}

impl WorkbookMeta {
    /// Parse workbook metadata out of a package
    pub fn parse(package: &XlsxPackage) -> XlsxResult<Self> {
        let workbook_xml = package
            .part(WORKBOOK_PART)
            .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_PART.into()))?;
        let rels_xml = package
            .part(WORKBOOK_RELS_PART)
            .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_RELS_PART.into()))?;

        let (sheets, defined_names) = read_workbook_xml(workbook_xml)?;
        let rels = read_workbook_rels(rels_xml)?;

        Ok(Self {
            sheets,
            rels,
            defined_names,
        })
    }

    /// Number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Iterate over sheet names in workbook order
    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.name.as_str())
    }

    /// Resolve a sheet name (exact, case-sensitive) to its part path
    pub fn sheet_part(&self, name: &str) -> Option<&str> {
        let entry = self.sheets.iter().find(|s| s.name == name)?;
        self.rels.get(&entry.rel_id).map(|p| p.as_str())
    }

    /// Look up a defined name
    pub fn defined_name(&self, name: &str) -> Option<&str> {
        self.defined_names.get(name).map(|s| s.as_str())
    }

    /// The full defined-names mapping
    pub fn defined_names(&self) -> &HashMap<String, String> {
        &self.defined_names
    }
}

/// Read sheet entries and defined names from `xl/workbook.xml`
#[allow(clippy::type_complexity)]
fn read_workbook_xml(xml: &[u8]) -> XlsxResult<(Vec<SheetEntry>, HashMap<String, String>)> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut defined_names = HashMap::new();

    // definedName capture state
    let mut current_name: Option<String> = None;
    let mut current_text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut rel_id = None;

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => {
                            name = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                        b"r:id" => {
                            rel_id = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                        _ => {}
                    }
                }

                if let (Some(name), Some(rel_id)) = (name, rel_id) {
                    sheets.push(SheetEntry { name, rel_id });
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"definedName" => {
                current_name = None;
                current_text.clear();
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"name" {
                        current_name = attr.unescape_value().ok().map(|s| s.to_string());
                    }
                }
            }
            Event::Text(t) if current_name.is_some() => {
                if let Ok(text) = t.unescape() {
                    current_text.push_str(&text);
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"definedName" => {
                // Later definitions win, matching a flat name -> text dictionary.
                if let Some(name) = current_name.take() {
                    defined_names.insert(name, current_text.clone());
                }
                current_text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((sheets, defined_names))
}

/// Read worksheet relationships from `xl/_rels/workbook.xml.rels`
fn read_workbook_rels(xml: &[u8]) -> XlsxResult<HashMap<String, String>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                let mut rel_type = None;

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => {
                            id = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                        b"Target" => {
                            target = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                        b"Type" => {
                            rel_type = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                        _ => {}
                    }
                }

                // Only worksheet relationships matter here
                if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                    if rel_type.ends_with("/worksheet") {
                        // Target is relative to the xl/ folder
                        let full_path = if let Some(stripped) = target.strip_prefix('/') {
                            stripped.to_string()
                        } else {
                            format!("xl/{}", target)
                        };
                        rels.insert(id, full_path);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    const WORKBOOK: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
    <sheets>
        <sheet name="Data" sheetId="1" r:id="rId1"/>
        <sheet name="Lookups" sheetId="2" r:id="rId2"/>
    </sheets>
    <definedNames>
        <definedName name="Colors">Lookups!$A$1:$A$5</definedName>
        <definedName name="Sizes" localSheetId="0">Lookups!$B$1:$B$3</definedName>
    </definedNames>
</workbook>"#;

    const RELS: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
    <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
    <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

    fn package() -> XlsxPackage {
        XlsxPackage::read(std::io::Cursor::new(build_zip())).unwrap()
    }

    fn build_zip() -> Vec<u8> {
        let mut parts = BTreeMap::new();
        parts.insert("[Content_Types].xml", b"<Types/>".to_vec());
        parts.insert("xl/workbook.xml", WORKBOOK.to_vec());
        parts.insert("xl/_rels/workbook.xml.rels", RELS.to_vec());

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            for (name, bytes) in parts {
                zip.start_file(name, options).unwrap();
                std::io::Write::write_all(&mut zip, &bytes).unwrap();
            }
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_sheets_and_rels() {
        let meta = WorkbookMeta::parse(&package()).unwrap();

        assert_eq!(meta.sheet_count(), 2);
        assert_eq!(
            meta.sheet_names().collect::<Vec<_>>(),
            vec!["Data", "Lookups"]
        );
        assert_eq!(meta.sheet_part("Data"), Some("xl/worksheets/sheet1.xml"));
        assert_eq!(meta.sheet_part("Lookups"), Some("xl/worksheets/sheet2.xml"));

        // Exact, case-sensitive lookup
        assert_eq!(meta.sheet_part("data"), None);
        assert_eq!(meta.sheet_part("Missing"), None);
    }

    #[test]
    fn test_defined_names() {
        let meta = WorkbookMeta::parse(&package()).unwrap();

        assert_eq!(meta.defined_name("Colors"), Some("Lookups!$A$1:$A$5"));
        // Sheet-scoped names participate too
        assert_eq!(meta.defined_name("Sizes"), Some("Lookups!$B$1:$B$3"));
        assert_eq!(meta.defined_name("Ghost"), None);
    }
}
