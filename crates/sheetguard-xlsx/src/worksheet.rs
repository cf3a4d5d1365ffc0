//! Worksheet part scanning and patching.
//!
//! Three passes over a sheet's XML, all event-streaming with pass-through of
//! everything that is not being rewritten:
//!
//! - [`scan`] collects the used-range bounding box, the distinct cell format
//!   indices in use, and validation/protection facts.
//! - [`apply_unlock`] rebuilds `sheetData` with every cell's `s=` remapped to
//!   an unlocked format, materializes empty positions inside the box, and
//!   resolves defined-name references in list validation formulas.
//! - [`apply_protection`] replaces or inserts the `sheetProtection` element.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

use sheetguard_core::{CellAddress, CellRange, SheetProtection};

use crate::error::XlsxResult;
use crate::styles::StyleRemap;
use crate::xml::{attrs_of, capture_inner, escape_text, push_attrs, skip_to_end};

/// Facts gathered from a worksheet part before patching
#[derive(Debug, Default)]
pub struct SheetScan {
    /// Bounding box of the in-use area: union of the `dimension` ref and
    /// every cell actually present
    pub used_range: Option<CellRange>,
    /// Distinct `s=` indices referenced by cells
    pub style_ids: BTreeSet<u32>,
    /// Total data validation rules on the sheet
    pub validation_rules: usize,
    /// Rules of type `list`
    pub list_rules: usize,
    /// Sheet already carries a `sheetProtection` element
    pub has_protection: bool,
}

/// Counters from the unlock pass
#[derive(Debug, Default)]
pub struct UnlockStats {
    /// Cells visited (existing and materialized) in the used-range box
    pub cells_visited: u64,
    /// List validation formulas rewritten to literal range text
    pub dropdowns_rewritten: usize,
}

/// Resolve a list validation formula against the defined-names mapping.
///
/// Returns `Some(replacement)` only when the formula is a `=Name` reference
/// to an existing defined name; literals and dangling references yield `None`
/// (left untouched).
pub fn resolve_list_formula(
    formula: &str,
    defined_names: &HashMap<String, String>,
) -> Option<String> {
    let name = formula.strip_prefix('=')?;
    defined_names.get(name).cloned()
}

/// Scan a worksheet part
pub fn scan(xml: &[u8]) -> XlsxResult<SheetScan> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut result = SheetScan::default();
    let mut ext_depth = 0usize;

    // Position inference for rows/cells missing their r attribute
    let mut last_row: Option<u32> = None;
    let mut next_col: u16 = 0;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"dimension" && ext_depth == 0 =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"ref" {
                        if let Ok(value) = attr.unescape_value() {
                            if let Ok(range) = CellRange::parse(&value) {
                                result.used_range = Some(match result.used_range {
                                    Some(existing) => existing.union(&range),
                                    None => range,
                                });
                            }
                        }
                    }
                }
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"row" && ext_depth == 0 =>
            {
                let mut row_num = last_row.map(|r| r + 1).unwrap_or(0);
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"r" {
                        if let Some(r) = attr
                            .unescape_value()
                            .ok()
                            .and_then(|v| v.parse::<u32>().ok())
                        {
                            row_num = r.saturating_sub(1);
                        }
                    }
                }
                last_row = Some(row_num);
                next_col = 0;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"c" && ext_depth == 0 =>
            {
                let mut addr = CellAddress::new(last_row.unwrap_or(0), next_col);
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"r" => {
                            if let Ok(value) = attr.unescape_value() {
                                if let Ok(parsed) = CellAddress::parse(&value) {
                                    addr = parsed;
                                }
                            }
                        }
                        b"s" => {
                            if let Some(s) = attr
                                .unescape_value()
                                .ok()
                                .and_then(|v| v.parse::<u32>().ok())
                            {
                                result.style_ids.insert(s);
                            }
                        }
                        _ => {}
                    }
                }
                next_col = addr.col.saturating_add(1);
                match result.used_range {
                    Some(ref mut range) => range.expand(addr),
                    None => result.used_range = Some(CellRange::single(addr)),
                }
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"dataValidation" && ext_depth == 0 =>
            {
                result.validation_rules += 1;
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"type"
                        && matches!(attr.unescape_value().as_deref(), Ok("list"))
                    {
                        result.list_rules += 1;
                    }
                }
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"sheetProtection" && ext_depth == 0 =>
            {
                result.has_protection = true;
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"extLst" => ext_depth += 1,
            Event::End(ref e) if e.local_name().as_ref() == b"extLst" => {
                ext_depth = ext_depth.saturating_sub(1)
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(result)
}

/// A captured `<c>` element, minus its position and style attributes
#[derive(Debug)]
struct CellCapture {
    /// Attributes other than `r` and `s`, in original order
    attrs: Vec<(String, String)>,
    /// Original `s=` index
    s: Option<u32>,
    /// Raw inner XML; `None` for a self-closing cell
    inner: Option<String>,
}

/// A captured `<row>` element
#[derive(Debug, Default)]
struct RowCapture {
    /// Row attributes with `r` guaranteed present
    attrs: Vec<(String, String)>,
    /// Cells keyed by 0-based column
    cells: BTreeMap<u16, CellCapture>,
}

/// Rewrite a worksheet part: unlock every cell in `used_range` (materializing
/// missing positions) and resolve defined-name references in list validation
/// formulas. `progress` receives `(visited, total)` once per cell.
pub fn apply_unlock(
    xml: &[u8],
    remap: &StyleRemap,
    defined_names: &HashMap<String, String>,
    used_range: Option<CellRange>,
    progress: &mut dyn FnMut(u64, u64),
) -> XlsxResult<(Vec<u8>, UnlockStats)> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 1024));

    let mut stats = UnlockStats::default();
    let total = used_range.map(|r| r.cell_count()).unwrap_or(0);
    let mut ext_depth = 0usize;
    let mut in_list_validation = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"dimension" && ext_depth == 0 =>
            {
                // Refresh the ref: materialization may have grown the box
                // beyond a stale dimension.
                if let Some(range) = used_range {
                    let out = format!("<dimension ref=\"{}\"/>", range.to_a1_string());
                    writer.get_mut().extend_from_slice(out.as_bytes());
                    if matches!(event, Event::Start(_)) {
                        skip_to_end(&mut reader, e.name().as_ref())?;
                    }
                } else {
                    writer.write_event(event.into_owned())?;
                }
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"sheetData" && ext_depth == 0 => {
                let rows = read_sheet_rows(&mut reader, e.name().as_ref())?;
                let section = render_sheet_data(
                    &rows,
                    used_range,
                    remap,
                    total,
                    &mut stats.cells_visited,
                    progress,
                );
                writer.get_mut().extend_from_slice(section.as_bytes());
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"sheetData" && ext_depth == 0 => {
                let section = render_sheet_data(
                    &BTreeMap::new(),
                    used_range,
                    remap,
                    total,
                    &mut stats.cells_visited,
                    progress,
                );
                writer.get_mut().extend_from_slice(section.as_bytes());
            }
            Event::Start(ref e)
                if e.local_name().as_ref() == b"dataValidation" && ext_depth == 0 =>
            {
                in_list_validation = validation_is_list(e)?;
                writer.write_event(event.into_owned())?;
            }
            Event::End(ref e) if e.local_name().as_ref() == b"dataValidation" => {
                in_list_validation = false;
                writer.write_event(event.into_owned())?;
            }
            Event::Start(ref e)
                if e.local_name().as_ref() == b"formula1" && in_list_validation =>
            {
                let end = e.name().as_ref().to_vec();
                let text = read_element_text(&mut reader, &end)?;
                let text = match resolve_list_formula(&text, defined_names) {
                    Some(resolved) => {
                        log::debug!("resolved dropdown source '{}' -> '{}'", text, resolved);
                        stats.dropdowns_rewritten += 1;
                        resolved
                    }
                    None => text,
                };
                let tag = String::from_utf8_lossy(&end).into_owned();
                let out = format!("<{}>{}</{}>", tag, escape_text(&text), tag);
                writer.get_mut().extend_from_slice(out.as_bytes());
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"extLst" => {
                ext_depth += 1;
                writer.write_event(event.into_owned())?;
            }
            Event::End(ref e) if e.local_name().as_ref() == b"extLst" => {
                ext_depth = ext_depth.saturating_sub(1);
                writer.write_event(event.into_owned())?;
            }
            Event::Eof => break,
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    Ok((writer.into_inner(), stats))
}

fn validation_is_list(e: &quick_xml::events::BytesStart) -> XlsxResult<bool> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"type" {
            return Ok(matches!(attr.unescape_value().as_deref(), Ok("list")));
        }
    }
    Ok(false)
}

/// Capture every row (and its cells) of a `sheetData` section
fn read_sheet_rows(
    reader: &mut Reader<&[u8]>,
    sheet_data_end: &[u8],
) -> XlsxResult<BTreeMap<u32, RowCapture>> {
    let mut rows: BTreeMap<u32, RowCapture> = BTreeMap::new();
    let mut buf = Vec::new();

    let mut last_row: Option<u32> = None;
    let mut current_row: u32 = 0;
    let mut next_col: u16 = 0;
    let mut in_row = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"row" => {
                let mut attrs = attrs_of(e)?;
                current_row = last_row.map(|r| r + 1).unwrap_or(0);
                if let Some((_, v)) = attrs.iter().find(|(k, _)| k == "r") {
                    if let Ok(r) = v.parse::<u32>() {
                        current_row = r.saturating_sub(1);
                    }
                } else {
                    attrs.insert(0, ("r".to_string(), (current_row + 1).to_string()));
                }
                last_row = Some(current_row);
                next_col = 0;
                in_row = matches!(event, Event::Start(_));

                let entry = rows.entry(current_row).or_default();
                entry.attrs = attrs;
            }
            Event::End(ref e) if e.local_name().as_ref() == b"row" => {
                in_row = false;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"c" && in_row =>
            {
                let mut s = None;
                let mut col = next_col;
                let mut attrs = Vec::new();
                for (key, value) in attrs_of(e)? {
                    match key.as_str() {
                        "r" => {
                            if let Ok(addr) = CellAddress::parse(&value) {
                                col = addr.col;
                            }
                        }
                        "s" => s = value.parse::<u32>().ok(),
                        _ => attrs.push((key, value)),
                    }
                }
                next_col = col.saturating_add(1);

                let inner = if matches!(event, Event::Start(_)) {
                    let end = e.name().as_ref().to_vec();
                    Some(capture_inner(reader, &end)?)
                } else {
                    None
                };

                rows.entry(current_row)
                    .or_default()
                    .cells
                    .insert(col, CellCapture { attrs, s, inner });
            }
            Event::End(ref e) if e.name().as_ref() == sheet_data_end => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

/// Rebuild `sheetData`: every position in the box gets a cell with an
/// unlocked format; captured rows outside the box (height-only stragglers)
/// are kept as-is.
fn render_sheet_data(
    rows: &BTreeMap<u32, RowCapture>,
    used_range: Option<CellRange>,
    remap: &StyleRemap,
    total: u64,
    visited: &mut u64,
    progress: &mut dyn FnMut(u64, u64),
) -> String {
    let range = match used_range {
        Some(range) => range,
        None => return "<sheetData/>".to_string(),
    };

    let mut out = String::from("<sheetData>");

    for (_, capture) in rows.range(..range.start.row) {
        render_captured_row(&mut out, capture, remap);
    }

    for row in range.start.row..=range.end.row {
        let capture = rows.get(&row);

        out.push_str("<row");
        match capture {
            Some(rc) => push_attrs(&mut out, &rc.attrs),
            None => out.push_str(&format!(" r=\"{}\"", row + 1)),
        }
        out.push('>');

        for col in range.start.col..=range.end.col {
            let addr = CellAddress::new(row, col);
            match capture.and_then(|rc| rc.cells.get(&col)) {
                Some(cell) => render_cell(&mut out, &addr, cell, remap),
                None => {
                    out.push_str(&format!(
                        "<c r=\"{}\" s=\"{}\"/>",
                        addr.to_a1_string(),
                        remap.target(None)
                    ));
                }
            }
            *visited += 1;
            progress(*visited, total);
        }

        out.push_str("</row>");
    }

    if range.end.row < u32::MAX {
        for (_, capture) in rows.range(range.end.row + 1..) {
            render_captured_row(&mut out, capture, remap);
        }
    }

    out.push_str("</sheetData>");
    out
}

fn render_captured_row(out: &mut String, capture: &RowCapture, remap: &StyleRemap) {
    out.push_str("<row");
    push_attrs(out, &capture.attrs);
    if capture.cells.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    let row_attr = capture
        .attrs
        .iter()
        .find(|(k, _)| k == "r")
        .and_then(|(_, v)| v.parse::<u32>().ok())
        .unwrap_or(1);
    for (col, cell) in &capture.cells {
        let addr = CellAddress::new(row_attr.saturating_sub(1), *col);
        render_cell(out, &addr, cell, remap);
    }
    out.push_str("</row>");
}

fn render_cell(out: &mut String, addr: &CellAddress, cell: &CellCapture, remap: &StyleRemap) {
    out.push_str("<c r=\"");
    out.push_str(&addr.to_a1_string());
    out.push('"');
    out.push_str(&format!(" s=\"{}\"", remap.target(cell.s)));
    push_attrs(out, &cell.attrs);
    match &cell.inner {
        Some(inner) if !inner.is_empty() => {
            out.push('>');
            out.push_str(inner);
            out.push_str("</c>");
        }
        _ => out.push_str("/>"),
    }
}

/// Accumulate the unescaped text content of an element
fn read_element_text(reader: &mut Reader<&[u8]>, end_name: &[u8]) -> XlsxResult<String> {
    let mut text = String::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::End(e) if e.name().as_ref() == end_name => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

/// Hash-bearing and selection attributes that are replaced (not preserved)
/// when a new password is applied
const REPLACED_PROTECTION_ATTRS: &[&str] = &[
    "sheet",
    "password",
    "algorithmName",
    "hashValue",
    "saltValue",
    "spinCount",
    "selectLockedCells",
    "selectUnlockedCells",
];

/// Check whether a worksheet already carries a `sheetProtection` element
fn has_sheet_protection(xml: &[u8]) -> XlsxResult<bool> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"sheetProtection" =>
            {
                return Ok(true)
            }
            Event::Eof => return Ok(false),
            _ => {}
        }
        buf.clear();
    }
}

/// Replace or insert the `sheetProtection` element. With protection disabled
/// any existing element is removed instead.
pub fn apply_protection(xml: &[u8], protection: &SheetProtection) -> XlsxResult<Vec<u8>> {
    // Replacement happens at the element's existing position; insertion (after
    // sheetData) only when no element exists anywhere in the part.
    let replace_existing = has_sheet_protection(xml)?;

    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 128));

    let mut placed = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"sheetProtection" =>
            {
                let is_start = matches!(event, Event::Start(_));
                if !protection.enabled || placed {
                    // Remove the element (protection disabled, or a second
                    // occurrence in a malformed part).
                    if is_start {
                        skip_to_end(&mut reader, e.name().as_ref())?;
                    }
                    placed = true;
                    buf.clear();
                    continue;
                }

                let preserved = attrs_of(e)?;
                let rendered = render_sheet_protection(protection, &preserved);
                if is_start {
                    // Keep children (extension lists) intact.
                    let end = e.name().as_ref().to_vec();
                    let inner = capture_inner(&mut reader, &end)?;
                    let mut out = rendered;
                    out.pop(); // drop '>'
                    out.pop(); // drop '/'
                    out.push('>');
                    out.push_str(&inner);
                    out.push_str("</sheetProtection>");
                    writer.get_mut().extend_from_slice(out.as_bytes());
                } else {
                    writer.get_mut().extend_from_slice(rendered.as_bytes());
                }
                placed = true;
            }
            Event::End(ref e) if e.local_name().as_ref() == b"sheetData" => {
                writer.write_event(event.clone().into_owned())?;
                if !placed && !replace_existing && protection.enabled {
                    let rendered = render_sheet_protection(protection, &[]);
                    writer.get_mut().extend_from_slice(rendered.as_bytes());
                    placed = true;
                }
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"sheetData" => {
                writer.write_event(event.clone().into_owned())?;
                if !placed && !replace_existing && protection.enabled {
                    let rendered = render_sheet_protection(protection, &[]);
                    writer.get_mut().extend_from_slice(rendered.as_bytes());
                    placed = true;
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"worksheet" => {
                // Fallback for a sheet with no sheetData element.
                if !placed && !replace_existing && protection.enabled {
                    let rendered = render_sheet_protection(protection, &[]);
                    writer.get_mut().extend_from_slice(rendered.as_bytes());
                    placed = true;
                }
                writer.write_event(event.clone().into_owned())?;
            }
            Event::Eof => break,
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

/// Render a self-closing `sheetProtection` element: enforcement + password
/// first, preserved permission attributes after.
fn render_sheet_protection(protection: &SheetProtection, existing: &[(String, String)]) -> String {
    let mut out = String::from("<sheetProtection sheet=\"1\"");
    if let Some(hex) = protection.password_hex() {
        out.push_str(&format!(" password=\"{}\"", hex));
    }
    for (key, value) in existing {
        if !REPLACED_PROTECTION_ATTRS.contains(&key.as_str()) {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&crate::xml::escape_xml(value));
            out.push('"');
        }
    }
    // ECMA-376: these attributes mean "prevented" and default to false.
    if !protection.select_locked_cells {
        out.push_str(" selectLockedCells=\"1\"");
    }
    if !protection.select_unlocked_cells {
        out.push_str(" selectUnlockedCells=\"1\"");
    }
    out.push_str("/>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SHEET: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <dimension ref="A1:C2"/>
    <sheetData>
        <row r="1" ht="20" customHeight="1">
            <c r="A1" t="inlineStr"><is><t>Name</t></is></c>
            <c r="C1" s="1"><v>42</v></c>
        </row>
        <row r="2">
            <c r="B2"><f>SUM(C1)</f><v>42</v></c>
        </row>
    </sheetData>
    <dataValidations count="3">
        <dataValidation type="list" allowBlank="1" sqref="A2:A10">
            <formula1>=Colors</formula1>
        </dataValidation>
        <dataValidation type="list" allowBlank="1" sqref="B2:B10">
            <formula1>"Yes,No"</formula1>
        </dataValidation>
        <dataValidation type="whole" operator="greaterThan" sqref="C2">
            <formula1>=Colors</formula1>
        </dataValidation>
    </dataValidations>
</worksheet>"#;

    fn names() -> HashMap<String, String> {
        let mut names = HashMap::new();
        names.insert("Colors".to_string(), "Lookups!$A$1:$A$5".to_string());
        names
    }

    fn remap_for(scan: &SheetScan) -> (crate::styles::Stylesheet, StyleRemap) {
        let mut styles = crate::styles::Stylesheet::parse(None).unwrap();
        // Give the minimal stylesheet an extra format so s="1" exists.
        styles.ensure_unlocked_style();
        let remap = styles.build_remap(&scan.style_ids);
        (styles, remap)
    }

    #[test]
    fn test_scan() {
        let scan = scan(SHEET).unwrap();
        assert_eq!(scan.used_range.unwrap().to_a1_string(), "A1:C2");
        assert_eq!(scan.style_ids.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(scan.validation_rules, 3);
        assert_eq!(scan.list_rules, 2);
        assert!(!scan.has_protection);
    }

    #[test]
    fn test_scan_unions_cells_beyond_dimension() {
        let xml = br#"<worksheet><dimension ref="A1:A1"/><sheetData><row r="3"><c r="D3"><v>1</v></c></row></sheetData></worksheet>"#;
        let scan = scan(xml).unwrap();
        assert_eq!(scan.used_range.unwrap().to_a1_string(), "A1:D3");
    }

    #[test]
    fn test_resolve_list_formula() {
        let names = names();
        assert_eq!(
            resolve_list_formula("=Colors", &names),
            Some("Lookups!$A$1:$A$5".to_string())
        );
        assert_eq!(resolve_list_formula("\"Yes,No\"", &names), None);
        assert_eq!(resolve_list_formula("=Ghost", &names), None);
    }

    #[test]
    fn test_apply_unlock_remaps_and_materializes() {
        let scan = scan(SHEET).unwrap();
        let (_, remap) = remap_for(&scan);

        let mut ticks = 0u64;
        let (out, stats) = apply_unlock(
            SHEET,
            &remap,
            &names(),
            scan.used_range,
            &mut |_, _| ticks += 1,
        )
        .unwrap();
        let xml = String::from_utf8(out).unwrap();

        // 2 rows x 3 cols, every cell visited once
        assert_eq!(stats.cells_visited, 6);
        assert_eq!(ticks, 6);

        // Existing cells keep their content, gain an unlocked format
        assert!(xml.contains(r#"<c r="A1" s="1" t="inlineStr"><is><t>Name</t></is></c>"#));
        assert!(xml.contains("<f>SUM(C1)</f>"));
        // The gap cells (B1, A2, C2) are materialized
        assert!(xml.contains(&format!(r#"<c r="B1" s="{}"/>"#, remap.default_unlocked)));
        assert!(xml.contains(&format!(r#"<c r="A2" s="{}"/>"#, remap.default_unlocked)));
        assert!(xml.contains(&format!(r#"<c r="C2" s="{}"/>"#, remap.default_unlocked)));
        // Row attributes survive
        assert!(xml.contains(r#"<row r="1" ht="20" customHeight="1">"#));
    }

    #[test]
    fn test_apply_unlock_rewrites_dropdowns() {
        let scan = scan(SHEET).unwrap();
        let (_, remap) = remap_for(&scan);

        let (out, stats) =
            apply_unlock(SHEET, &remap, &names(), scan.used_range, &mut |_, _| {}).unwrap();
        let xml = String::from_utf8(out).unwrap();

        // =Colors resolved, literal list untouched, non-list rule untouched
        assert_eq!(stats.dropdowns_rewritten, 1);
        assert!(xml.contains("<formula1>Lookups!$A$1:$A$5</formula1>"));
        assert!(xml.contains("<formula1>\"Yes,No\"</formula1>"));
        assert!(xml.contains("<formula1>=Colors</formula1>"));
    }

    #[test]
    fn test_apply_unlock_dangling_name_untouched() {
        let xml = br#"<worksheet><sheetData/><dataValidations count="1"><dataValidation type="list" sqref="A1"><formula1>=Ghost</formula1></dataValidation></dataValidations></worksheet>"#;
        let scan = scan(xml).unwrap();
        let (_, remap) = remap_for(&scan);

        let (out, stats) =
            apply_unlock(xml, &remap, &names(), scan.used_range, &mut |_, _| {}).unwrap();
        assert_eq!(stats.dropdowns_rewritten, 0);
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("<formula1>=Ghost</formula1>"));
    }

    #[test]
    fn test_apply_protection_inserts_after_sheet_data() {
        let scan = scan(SHEET).unwrap();
        let protection = SheetProtection::with_password("secret");
        let out = apply_protection(SHEET, &protection).unwrap();
        let xml = String::from_utf8(out).unwrap();

        assert!(!scan.has_protection);
        let hex = protection.password_hex().unwrap();
        let element = format!(r#"<sheetProtection sheet="1" password="{}"/>"#, hex);
        assert!(xml.contains(&element));

        let data_end = xml.find("</sheetData>").unwrap();
        let prot_pos = xml.find("<sheetProtection").unwrap();
        assert!(prot_pos > data_end);
        let validations = xml.find("<dataValidations").unwrap();
        assert!(prot_pos < validations);
    }

    #[test]
    fn test_apply_protection_replaces_existing() {
        let xml = br#"<worksheet><sheetData/><sheetProtection sheet="1" password="ABCD" formatCells="0" algorithmName="SHA-512" hashValue="xxx" saltValue="yyy" spinCount="100000"/></worksheet>"#;
        let protection = SheetProtection::with_password("secret");
        let out = apply_protection(xml, &protection).unwrap();
        let text = String::from_utf8(out).unwrap();

        // Exactly one element, stale hash attributes gone, permissions kept
        assert_eq!(text.matches("<sheetProtection").count(), 1);
        assert!(!text.contains("ABCD"));
        assert!(!text.contains("algorithmName"));
        assert!(!text.contains("hashValue"));
        assert!(text.contains(r#"formatCells="0""#));
        assert!(text.contains(&format!(
            r#"password="{}""#,
            protection.password_hex().unwrap()
        )));
    }

    #[test]
    fn test_apply_protection_disabled_removes() {
        let xml =
            br#"<worksheet><sheetData/><sheetProtection sheet="1" password="ABCD"/></worksheet>"#;
        let out = apply_protection(xml, &SheetProtection::default()).unwrap();
        assert!(!String::from_utf8(out).unwrap().contains("sheetProtection"));
    }
}
