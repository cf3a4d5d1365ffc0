//! Whole-container access to an XLSX/XLSM package.
//!
//! The package is held as a part-name -> bytes map. Only the parts the
//! transformation actually rewrites are replaced; everything else (other
//! sheets, macros, themes, pivot caches, ...) round-trips byte-for-byte.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use crate::error::{XlsxError, XlsxResult};

/// Path of the workbook part inside the container
pub const WORKBOOK_PART: &str = "xl/workbook.xml";

/// Path of the workbook relationships part
pub const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

/// Path of the stylesheet part
pub const STYLES_PART: &str = "xl/styles.xml";

/// An XLSX container loaded fully into memory
#[derive(Debug, Clone)]
pub struct XlsxPackage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Default for XlsxPackage {
    fn default() -> Self {
        Self::new()
    }
}

impl XlsxPackage {
    /// Create an empty package (parts added via [`XlsxPackage::set_part`])
    pub fn new() -> Self {
        Self {
            parts: BTreeMap::new(),
        }
    }

    /// Read a package from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Read a package from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;

        let mut parts = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            parts.insert(name, data);
        }

        let package = Self { parts };

        // Verify this is an XLSX container
        if !package.has_part("[Content_Types].xml") {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }
        if !package.has_part(WORKBOOK_PART) {
            return Err(XlsxError::MissingPart(WORKBOOK_PART.into()));
        }

        Ok(package)
    }

    /// Write the package to a file path
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> XlsxResult<()> {
        let file = File::create(path)?;
        self.write(file)
    }

    /// Write the package to a writer
    pub fn write<W: Write + Seek>(&self, writer: W) -> XlsxResult<()> {
        let mut zip = zip::ZipWriter::new(writer);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (name, bytes) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }

        zip.finish()?;
        Ok(())
    }

    /// Check whether a part exists
    pub fn has_part(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// Get a part's bytes
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(|b| b.as_slice())
    }

    /// Insert or replace a part
    pub fn set_part<S: Into<String>>(&mut self, name: S, bytes: Vec<u8>) {
        self.parts.insert(name.into(), bytes);
    }

    /// Number of parts in the package
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Iterate over (name, bytes) pairs in deterministic order
    pub fn parts(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts.iter().map(|(n, b)| (n.as_str(), b.as_slice()))
    }

    /// Make sure `[Content_Types].xml` declares `content_type` for
    /// `part_name`, adding an `<Override>` if absent. Existing entries are
    /// left untouched.
    pub fn ensure_content_types_override(
        &mut self,
        part_name: &str,
        content_type: &str,
    ) -> XlsxResult<()> {
        let Some(existing) = self.parts.get("[Content_Types].xml") else {
            return Ok(());
        };
        let mut xml = String::from_utf8(existing.clone())
            .map_err(|e| XlsxError::InvalidFormat(format!("[Content_Types].xml: {}", e)))?;
        if xml.contains(&format!(r#"PartName="{}""#, part_name)) {
            return Ok(());
        }
        if let Some(idx) = xml.rfind("</Types>") {
            let insert = format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                part_name, content_type
            );
            xml.insert_str(idx, &insert);
        }
        self.parts
            .insert("[Content_Types].xml".to_string(), xml.into_bytes());
        Ok(())
    }

    /// Make sure `xl/_rels/workbook.xml.rels` carries a relationship of
    /// `rel_type`, adding one with the next free `rIdN` if absent.
    pub fn ensure_workbook_rels_relationship(
        &mut self,
        rel_type: &str,
        target: &str,
    ) -> XlsxResult<()> {
        let Some(existing) = self.parts.get(WORKBOOK_RELS_PART) else {
            return Ok(());
        };
        let mut xml = String::from_utf8(existing.clone())
            .map_err(|e| XlsxError::InvalidFormat(format!("{}: {}", WORKBOOK_RELS_PART, e)))?;
        if xml.contains(rel_type) {
            return Ok(());
        }
        let next = next_relationship_id(&xml);
        let rel = format!(
            r#"<Relationship Id="rId{}" Type="{}" Target="{}"/>"#,
            next, rel_type, target
        );
        if let Some(idx) = xml.rfind("</Relationships>") {
            xml.insert_str(idx, &rel);
        }
        self.parts
            .insert(WORKBOOK_RELS_PART.to_string(), xml.into_bytes());
        Ok(())
    }
}

/// Smallest `rIdN` not yet used in a relationships part
fn next_relationship_id(xml: &str) -> u32 {
    let mut max_id = 0u32;
    let mut rest = xml;
    while let Some(idx) = rest.find("Id=\"rId") {
        let after = &rest[idx + "Id=\"rId".len()..];
        let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(n) = digits.parse::<u32>() {
            max_id = max_id.max(n);
        }
        rest = &after[digits.len()..];
    }
    max_id + 1
}
