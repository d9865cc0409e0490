//! In-place cell patching for xlsx/xlsm packages.
//!
//! Only the target worksheet part (and `xl/workbook.xml` when unhiding) is
//! re-serialized. Every other zip entry is raw-copied, so styles, shared
//! strings, drawings and other sheets come through byte-for-byte. Patched
//! cells keep their style index and any attribute other than the value type.
//!
//! Text is written as inline strings so the shared string table never
//! changes.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::cell_ref::{cell_address, parse_cell_ref};
use crate::error::PatchError;
use crate::table::CellValue;
use crate::xlsx::{attr_string, worksheet_parts, Visibility};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

/// A value to write at an absolute 0-indexed cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellPatch {
    pub row: usize,
    pub col: usize,
    pub value: CellValue,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PatchOptions {
    /// Clear a hidden/veryHidden state on the patched sheet.
    pub unhide: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    /// Existing `<c>` elements whose value was replaced.
    pub cells_replaced: usize,
    /// Cells added to existing or new rows.
    pub cells_inserted: usize,
    pub rows_inserted: usize,
    pub unhidden: bool,
}

impl PatchReport {
    pub fn cells_written(&self) -> usize {
        self.cells_replaced + self.cells_inserted
    }
}

fn xml_err<E: fmt::Display>(e: E) -> PatchError {
    PatchError::Xml(e.to_string())
}

fn package_err<E: fmt::Display>(e: E) -> PatchError {
    PatchError::Package(e.to_string())
}

fn write_err<E: fmt::Display>(path: &Path) -> impl Fn(E) -> PatchError + '_ {
    move |e| PatchError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Write `patches` into `sheet` of the workbook at `src`, saving to `dest`.
///
/// `dest` may equal `src`. The package is written to a temporary file next to
/// `dest` and renamed into place, so a failure never leaves a partial file.
pub fn patch_workbook(
    src: &Path,
    dest: &Path,
    sheet: &str,
    patches: &[CellPatch],
    options: &PatchOptions,
) -> Result<PatchReport, PatchError> {
    let file = File::open(src).map_err(|e| PatchError::Read {
        path: src.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut archive = ZipArchive::new(file).map_err(package_err)?;

    let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?;
    let rels_xml = read_part(&mut archive, WORKBOOK_RELS_PART)?;
    let parts = worksheet_parts(&workbook_xml, &rels_xml);
    let part = parts
        .iter()
        .find(|p| p.name == sheet)
        .or_else(|| parts.iter().find(|p| p.name.eq_ignore_ascii_case(sheet)))
        .ok_or_else(|| PatchError::SheetNotFound(sheet.to_string()))?;

    let sheet_xml = read_part(&mut archive, &part.path)?;
    let (patched_sheet, mut report) = patch_sheet_xml(&sheet_xml, patches)?;

    let patched_workbook = if options.unhide && part.visibility != Visibility::Visible {
        report.unhidden = true;
        Some(unhide_sheet_xml(&workbook_xml, &part.name)?)
    } else {
        None
    };

    let tmp = temp_path(dest);
    let written = write_package(
        &mut archive,
        &tmp,
        &part.path,
        patched_sheet.as_bytes(),
        patched_workbook.as_deref(),
    );
    drop(archive);
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(dest)(e));
    }

    tracing::debug!(
        dest = %dest.display(),
        sheet = %part.name,
        part = %part.path,
        replaced = report.cells_replaced,
        inserted = report.cells_inserted,
        rows_inserted = report.rows_inserted,
        "patched workbook"
    );
    Ok(report)
}

fn temp_path(dest: &Path) -> PathBuf {
    let ext = dest
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("xlsx");
    dest.with_extension(format!("{}.tmp", ext))
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, PatchError> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| PatchError::Package(format!("{}: {}", name, e)))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| PatchError::Package(format!("{}: {}", name, e)))?;
    Ok(content)
}

fn write_package<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    tmp: &Path,
    sheet_part: &str,
    sheet_xml: &[u8],
    workbook_xml: Option<&str>,
) -> Result<(), PatchError> {
    let out = File::create(tmp).map_err(write_err(tmp))?;
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let file = archive.by_index_raw(i).map_err(package_err)?;
        let name = file.name().to_string();

        let replacement = if name == sheet_part {
            Some(sheet_xml)
        } else if name == WORKBOOK_PART {
            workbook_xml.map(str::as_bytes)
        } else {
            None
        };

        match replacement {
            Some(bytes) => {
                drop(file);
                zip.start_file(name, options).map_err(write_err(tmp))?;
                zip.write_all(bytes).map_err(write_err(tmp))?;
            }
            // Raw copy keeps untouched parts byte-identical, no recompression
            None => zip.raw_copy_file(file).map_err(write_err(tmp))?,
        }
    }

    zip.finish().map_err(write_err(tmp))?;
    Ok(())
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}

fn element_prefix(name: &[u8]) -> Option<String> {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| String::from_utf8_lossy(&name[..i]).into_owned())
}

fn prefixed_tag(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Copy of `e` with the named attributes removed.
fn without_attrs(e: &BytesStart<'_>, skip: &[&[u8]]) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in e.attributes().flatten() {
        if !skip.contains(&attr.key.as_ref()) {
            out.push_attribute(attr);
        }
    }
    out
}

/// 0-indexed row from `r="12"`, else the implicit next row.
fn row_index(e: &BytesStart<'_>, implicit: usize) -> Result<usize, PatchError> {
    match attr_value(e, b"r") {
        Some(r) => r
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .map(|n| n - 1)
            .ok_or_else(|| PatchError::Xml(format!("invalid row number {:?}", r))),
        None => Ok(implicit),
    }
}

/// 0-indexed column from `r="B12"`, else the implicit next column.
fn cell_col(e: &BytesStart<'_>, implicit: usize) -> Result<usize, PatchError> {
    match attr_value(e, b"r") {
        Some(r) => parse_cell_ref(&r)
            .map(|(_, col)| col)
            .ok_or_else(|| PatchError::Xml(format!("invalid cell reference {:?}", r))),
        None => Ok(implicit),
    }
}

type RowCells<'p> = BTreeMap<usize, &'p CellValue>;
type Bounds = ((usize, usize), (usize, usize));

struct SheetPatcher<'p> {
    writer: Writer<Vec<u8>>,
    /// Patches not yet written, by row then column.
    pending: BTreeMap<usize, RowCells<'p>>,
    bounds: Option<Bounds>,
    prefix: Option<String>,
    report: PatchReport,
    in_sheet_data: bool,
    /// Open `<row>` and its patches not yet written.
    current_row: Option<(usize, RowCells<'p>)>,
    next_row: usize,
    next_col: usize,
    /// Depth inside a replaced `<c>` whose old children are dropped.
    skip_depth: Option<usize>,
}

impl<'p> SheetPatcher<'p> {
    fn new(patches: &'p [CellPatch], capacity: usize) -> Self {
        let mut pending: BTreeMap<usize, RowCells<'p>> = BTreeMap::new();
        for patch in patches {
            pending
                .entry(patch.row)
                .or_default()
                .insert(patch.col, &patch.value);
        }
        let bounds = patches.iter().fold(None, |acc: Option<Bounds>, p| match acc {
            None => Some(((p.row, p.col), (p.row, p.col))),
            Some(((r0, c0), (r1, c1))) => {
                Some(((r0.min(p.row), c0.min(p.col)), (r1.max(p.row), c1.max(p.col))))
            }
        });

        Self {
            writer: Writer::new(Vec::with_capacity(capacity)),
            pending,
            bounds,
            prefix: None,
            report: PatchReport::default(),
            in_sheet_data: false,
            current_row: None,
            next_row: 0,
            next_col: 0,
            skip_depth: None,
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), PatchError> {
        self.writer.write_event(event).map_err(xml_err)
    }

    /// Write a cell. `existing` is the element being replaced, if any.
    fn write_cell(
        &mut self,
        row: usize,
        col: usize,
        value: &CellValue,
        existing: Option<&BytesStart<'_>>,
    ) -> Result<(), PatchError> {
        let tag = prefixed_tag(self.prefix.as_deref(), "c");
        let mut cell = BytesStart::new(tag.as_str());
        let address = cell_address(row, col);
        cell.push_attribute(("r", address.as_str()));
        if let Some(existing) = existing {
            for attr in existing.attributes().flatten() {
                if !matches!(attr.key.as_ref(), b"r" | b"t" | b"cm" | b"vm") {
                    cell.push_attribute(attr);
                }
            }
        }

        let v_tag = prefixed_tag(self.prefix.as_deref(), "v");
        match value {
            CellValue::Empty => return self.write(Event::Empty(cell)),
            CellValue::Number(n) => {
                self.write(Event::Start(cell))?;
                self.write_text_element(&v_tag, &n.to_string(), false)?;
            }
            CellValue::Bool(b) => {
                cell.push_attribute(("t", "b"));
                self.write(Event::Start(cell))?;
                self.write_text_element(&v_tag, if *b { "1" } else { "0" }, false)?;
            }
            CellValue::Text(s) => {
                cell.push_attribute(("t", "inlineStr"));
                self.write(Event::Start(cell))?;
                let is_tag = prefixed_tag(self.prefix.as_deref(), "is");
                let t_tag = prefixed_tag(self.prefix.as_deref(), "t");
                self.write(Event::Start(BytesStart::new(is_tag.as_str())))?;
                let preserve = s.trim() != s;
                self.write_text_element(&t_tag, s, preserve)?;
                self.write(Event::End(BytesEnd::new(is_tag.as_str())))?;
            }
        }
        self.write(Event::End(BytesEnd::new(tag.as_str())))
    }

    fn write_text_element(&mut self, tag: &str, text: &str, preserve: bool) -> Result<(), PatchError> {
        let mut start = BytesStart::new(tag);
        if preserve {
            start.push_attribute(("xml:space", "preserve"));
        }
        self.write(Event::Start(start))?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.write(Event::End(BytesEnd::new(tag)))
    }

    fn insert_cells(&mut self, row: usize, cells: RowCells<'p>) -> Result<(), PatchError> {
        for (col, value) in cells {
            self.write_cell(row, col, value, None)?;
            self.report.cells_inserted += 1;
        }
        Ok(())
    }

    fn insert_row(&mut self, row: usize, cells: RowCells<'p>) -> Result<(), PatchError> {
        let tag = prefixed_tag(self.prefix.as_deref(), "row");
        let mut start = BytesStart::new(tag.as_str());
        let r = (row + 1).to_string();
        start.push_attribute(("r", r.as_str()));
        self.write(Event::Start(start))?;
        self.insert_cells(row, cells)?;
        self.write(Event::End(BytesEnd::new(tag.as_str())))?;
        self.report.rows_inserted += 1;
        Ok(())
    }

    /// Insert every pending row that sorts before `row` (all rows for `None`).
    fn flush_rows_before(&mut self, row: Option<usize>) -> Result<(), PatchError> {
        let earlier = match row {
            Some(row) => {
                let later = self.pending.split_off(&row);
                std::mem::replace(&mut self.pending, later)
            }
            None => std::mem::take(&mut self.pending),
        };
        for (row, cells) in earlier {
            self.insert_row(row, cells)?;
        }
        Ok(())
    }

    /// Enter a `<row>`; returns its pending cells.
    fn open_row(&mut self, e: &BytesStart<'_>) -> Result<(usize, Option<RowCells<'p>>), PatchError> {
        let row = row_index(e, self.next_row)?;
        self.next_row = row + 1;
        self.next_col = 0;
        self.flush_rows_before(Some(row))?;
        Ok((row, self.pending.remove(&row)))
    }

    /// Handle a `<c>` inside an open row. Returns true when it was replaced.
    fn cell(&mut self, e: &BytesStart<'_>) -> Result<bool, PatchError> {
        let col = cell_col(e, self.next_col)?;
        self.next_col = col + 1;
        let Some((row, cells)) = self.current_row.as_mut() else {
            return Ok(false);
        };
        let row = *row;
        let later = cells.split_off(&col);
        let earlier = std::mem::replace(cells, later);
        let replacement = cells.remove(&col);

        self.insert_cells(row, earlier)?;
        match replacement {
            Some(value) => {
                self.write_cell(row, col, value, Some(e))?;
                self.report.cells_replaced += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Process one event. Returns false at end of input.
    fn handle(&mut self, event: Event<'_>) -> Result<bool, PatchError> {
        if let Some(depth) = self.skip_depth {
            self.skip_depth = match event {
                Event::Start(_) => Some(depth + 1),
                Event::End(_) if depth == 0 => None,
                Event::End(_) => Some(depth - 1),
                Event::Eof => return Err(PatchError::Xml("unterminated <c> element".into())),
                _ => Some(depth),
            };
            return Ok(true);
        }

        match event {
            Event::Eof => return Ok(false),

            Event::Start(e) if !self.in_sheet_data && is(&e, b"dimension") => {
                let updated = self.widened(e);
                self.write(Event::Start(updated))?;
            }
            Event::Empty(e) if !self.in_sheet_data && is(&e, b"dimension") => {
                let updated = self.widened(e);
                self.write(Event::Empty(updated))?;
            }

            Event::Start(e) if is(&e, b"sheetData") => {
                self.prefix = element_prefix(e.name().as_ref());
                self.in_sheet_data = true;
                self.write(Event::Start(e))?;
            }
            Event::Empty(e) if is(&e, b"sheetData") => {
                if self.pending.is_empty() {
                    self.write(Event::Empty(e))?;
                } else {
                    // Expand `<sheetData/>` into `<sheetData>...</sheetData>`
                    self.prefix = element_prefix(e.name().as_ref());
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    self.write(Event::Start(e))?;
                    self.flush_rows_before(None)?;
                    self.write(Event::End(BytesEnd::new(tag)))?;
                }
            }
            Event::End(e) if self.in_sheet_data && local_name(e.name().as_ref()) == b"sheetData" => {
                self.flush_rows_before(None)?;
                self.in_sheet_data = false;
                self.write(Event::End(e))?;
            }

            Event::Start(e) if self.in_sheet_data && is(&e, b"row") => {
                let (row, cells) = self.open_row(&e)?;
                match cells {
                    Some(cells) => {
                        // spans is only a hint and may no longer be accurate
                        self.write(Event::Start(without_attrs(&e, &[b"spans"])))?;
                        self.current_row = Some((row, cells));
                    }
                    None => {
                        self.write(Event::Start(e))?;
                        self.current_row = Some((row, BTreeMap::new()));
                    }
                }
            }
            Event::Empty(e) if self.in_sheet_data && is(&e, b"row") => {
                let (row, cells) = self.open_row(&e)?;
                match cells {
                    Some(cells) => {
                        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        self.write(Event::Start(without_attrs(&e, &[b"spans"])))?;
                        self.insert_cells(row, cells)?;
                        self.write(Event::End(BytesEnd::new(tag)))?;
                    }
                    None => self.write(Event::Empty(e))?,
                }
            }
            Event::End(e) if self.in_sheet_data && local_name(e.name().as_ref()) == b"row" => {
                if let Some((row, rest)) = self.current_row.take() {
                    self.insert_cells(row, rest)?;
                }
                self.write(Event::End(e))?;
            }

            Event::Start(e) if self.current_row.is_some() && is(&e, b"c") => {
                if self.cell(&e)? {
                    self.skip_depth = Some(0);
                } else {
                    self.write(Event::Start(e))?;
                }
            }
            Event::Empty(e) if self.current_row.is_some() && is(&e, b"c") => {
                if !self.cell(&e)? {
                    self.write(Event::Empty(e))?;
                }
            }

            other => self.write(other)?,
        }
        Ok(true)
    }

    fn widened(&self, e: BytesStart<'_>) -> BytesStart<'static> {
        match self.bounds {
            Some(bounds) => widen_dimension(&e, bounds),
            None => e.into_owned(),
        }
    }
}

fn is(e: &BytesStart<'_>, local: &[u8]) -> bool {
    local_name(e.name().as_ref()) == local
}

/// Widen a `<dimension ref="A1:C9"/>` element to also cover `bounds`.
fn widen_dimension(e: &BytesStart<'_>, bounds: Bounds) -> BytesStart<'static> {
    let Some(current) = attr_value(e, b"ref") else {
        return e.to_owned();
    };
    let (first, last) = current.split_once(':').unwrap_or((&current, &current));
    let (Some(lo), Some(hi)) = (parse_cell_ref(first), parse_cell_ref(last)) else {
        return e.to_owned();
    };
    let ((min_r, min_c), (max_r, max_c)) = bounds;
    let lo = (lo.0.min(min_r), lo.1.min(min_c));
    let hi = (hi.0.max(max_r), hi.1.max(max_c));
    let widened = if lo == hi {
        cell_address(lo.0, lo.1)
    } else {
        format!("{}:{}", cell_address(lo.0, lo.1), cell_address(hi.0, hi.1))
    };

    let mut out = without_attrs(e, &[b"ref"]);
    out.push_attribute(("ref", widened.as_str()));
    out
}

/// Rewrite one worksheet XML part with the given cell values.
pub(crate) fn patch_sheet_xml(
    xml: &str,
    patches: &[CellPatch],
) -> Result<(String, PatchReport), PatchError> {
    let mut patcher = SheetPatcher::new(patches, xml.len() + patches.len() * 64);

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_err)?;
        if !patcher.handle(event)? {
            break;
        }
        buf.clear();
    }

    if !patcher.pending.is_empty() {
        return Err(PatchError::Xml("worksheet has no <sheetData> element".into()));
    }

    let report = patcher.report;
    let xml = String::from_utf8(patcher.writer.into_inner()).map_err(xml_err)?;
    Ok((xml, report))
}

/// Drop the `state` attribute from the named `<sheet>` in workbook.xml.
pub(crate) fn unhide_sheet_xml(xml: &str, sheet: &str) -> Result<String, PatchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Eof => break,
            Event::Empty(e) if is(&e, b"sheet") && is_named(&e, sheet) => writer
                .write_event(Event::Empty(without_attrs(&e, &[b"state"])))
                .map_err(xml_err)?,
            Event::Start(e) if is(&e, b"sheet") && is_named(&e, sheet) => writer
                .write_event(Event::Start(without_attrs(&e, &[b"state"])))
                .map_err(xml_err)?,
            other => writer.write_event(other).map_err(xml_err)?,
        }
        buf.clear();
    }

    String::from_utf8(writer.into_inner()).map_err(xml_err)
}

fn is_named(e: &BytesStart<'_>, sheet: &str) -> bool {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"name")
        .is_some_and(|a| attr_string(&a) == sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto, Data, Reader as _};
    use rust_xlsxwriter::{Format, Workbook};
    use tempfile::tempdir;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:B3"/><sheetData><row r="1" spans="1:2"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row><row r="2" spans="1:2"><c r="A2" t="s"><v>2</v></c><c r="B2" s="3"/></row><row r="3" spans="1:1"><c r="A3" t="s"><v>3</v></c></row></sheetData></worksheet>"#;

    fn patch(row: usize, col: usize, value: CellValue) -> CellPatch {
        CellPatch { row, col, value }
    }

    #[test]
    fn replaces_empty_styled_cell() {
        let (xml, report) =
            patch_sheet_xml(SHEET, &[patch(1, 1, CellValue::Number(1998.0))]).unwrap();
        assert!(xml.contains(r#"<c r="B2" s="3"><v>1998</v></c>"#), "{xml}");
        assert_eq!(report.cells_replaced, 1);
        assert_eq!(report.cells_inserted, 0);
        // row with a patch loses its spans hint; others keep theirs
        assert!(xml.contains(r#"<row r="2">"#));
        assert!(xml.contains(r#"<row r="1" spans="1:2">"#));
    }

    #[test]
    fn inserts_missing_cell_and_rows_in_order() {
        let patches = [
            patch(2, 1, CellValue::Text("N64".into())),
            patch(4, 1, CellValue::Bool(true)),
            patch(3, 0, CellValue::Text(" padded ".into())),
        ];
        let (xml, report) = patch_sheet_xml(SHEET, &patches).unwrap();

        assert_eq!(report.cells_inserted, 3);
        assert_eq!(report.rows_inserted, 2);
        assert!(xml.contains(
            r#"<c r="A3" t="s"><v>3</v></c><c r="B3" t="inlineStr"><is><t>N64</t></is></c></row>"#
        ));
        let row4 = xml.find(r#"<row r="4">"#).unwrap();
        let row5 = xml.find(r#"<row r="5">"#).unwrap();
        assert!(row4 < row5);
        assert!(xml.contains(r#"<t xml:space="preserve"> padded </t>"#));
        assert!(xml.contains(r#"<c r="B5" t="b"><v>1</v></c>"#));
        assert!(xml.contains(r#"<dimension ref="A1:B5"/>"#));
        assert!(xml.ends_with("</sheetData></worksheet>"));
    }

    #[test]
    fn replaces_shared_string_cell_and_drops_old_children() {
        let (xml, _) =
            patch_sheet_xml(SHEET, &[patch(0, 0, CellValue::Text("R&D".into()))]).unwrap();
        assert!(xml.contains(r#"<c r="A1" t="inlineStr"><is><t>R&amp;D</t></is></c><c r="B1""#));
        assert!(!xml.contains("<v>0</v>"));
    }

    #[test]
    fn expands_empty_sheet_data() {
        let xml = r#"<worksheet><sheetData/></worksheet>"#;
        let (out, report) = patch_sheet_xml(xml, &[patch(0, 2, CellValue::Number(2.5))]).unwrap();
        assert_eq!(
            out,
            r#"<worksheet><sheetData><row r="1"><c r="C1"><v>2.5</v></c></row></sheetData></worksheet>"#
        );
        assert_eq!(report.rows_inserted, 1);
    }

    #[test]
    fn unhide_drops_state_of_named_sheet_only() {
        let xml = r#"<workbook><sheets><sheet name="A" sheetId="1" state="hidden" r:id="rId1"/><sheet name="B" sheetId="2" state="hidden" r:id="rId2"/></sheets></workbook>"#;
        let out = unhide_sheet_xml(xml, "B").unwrap();
        assert_eq!(
            out,
            r#"<workbook><sheets><sheet name="A" sheetId="1" state="hidden" r:id="rId1"/><sheet name="B" sheetId="2" r:id="rId2"/></sheets></workbook>"#
        );
    }

    fn write_master(path: &Path) {
        let mut wb = Workbook::new();
        let bold = Format::new().set_bold();

        let cover = wb.add_worksheet();
        cover.set_name("Cover").unwrap();
        cover.write_string(0, 0, "Inventory").unwrap();

        let games = wb.add_worksheet();
        games.set_name("Games").unwrap();
        games.write_string_with_format(0, 0, "Name", &bold).unwrap();
        games.write_string_with_format(0, 1, "Year", &bold).unwrap();
        games.write_string(1, 0, "Doom").unwrap();
        games.write_blank(1, 1, &bold).unwrap();
        games.write_string(2, 0, "Myst").unwrap();
        games.write_number(2, 1, 1993).unwrap();
        games.write_string(3, 0, "Quake").unwrap();
        games.set_hidden(true);

        wb.save(path).unwrap();
    }

    fn read_back(path: &Path, sheet: &str) -> Vec<Vec<Data>> {
        let mut wb = open_workbook_auto(path).unwrap();
        let range = wb.worksheet_range(sheet).unwrap();
        range.rows().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn patches_workbook_and_keeps_other_parts() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("Master.xlsx");
        let dest = dir.path().join("Master_filled.xlsx");
        write_master(&src);

        let patches = [
            patch(1, 1, CellValue::Number(1993.0)),
            patch(3, 1, CellValue::Number(1996.0)),
        ];
        let report =
            patch_workbook(&src, &dest, "Games", &patches, &PatchOptions::default()).unwrap();
        assert_eq!(report.cells_written(), 2);
        assert!(!report.unhidden);
        assert!(!dir.path().join("Master_filled.xlsx.tmp").exists());

        let rows = read_back(&dest, "Games");
        assert_eq!(rows[1][1], Data::Float(1993.0));
        assert_eq!(rows[3][1], Data::Float(1996.0));
        assert_eq!(rows[3][0], Data::String("Quake".into()));

        let sheets = crate::xlsx::list_sheets(&dest).unwrap();
        assert_eq!(sheets[1].visibility, Visibility::Hidden);

        // untouched entries are byte-identical
        let mut before = ZipArchive::new(File::open(&src).unwrap()).unwrap();
        let mut after = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let styles_before = read_part(&mut before, "xl/styles.xml").unwrap();
        let styles_after = read_part(&mut after, "xl/styles.xml").unwrap();
        assert_eq!(styles_before, styles_after);
        assert_eq!(
            read_part(&mut before, "xl/worksheets/sheet1.xml").unwrap(),
            read_part(&mut after, "xl/worksheets/sheet1.xml").unwrap()
        );
    }

    #[test]
    fn unhide_makes_sheet_visible_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Master.xlsx");
        write_master(&path);

        let options = PatchOptions { unhide: true };
        let report = patch_workbook(
            &path,
            &path,
            "games",
            &[patch(1, 1, CellValue::Text("1993".into()))],
            &options,
        )
        .unwrap();
        assert!(report.unhidden);

        let sheets = crate::xlsx::list_sheets(&path).unwrap();
        assert_eq!(sheets[1].visibility, Visibility::Visible);
        assert_eq!(read_back(&path, "Games")[1][1], Data::String("1993".into()));
    }

    #[test]
    fn missing_sheet_leaves_no_output() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("Master.xlsx");
        let dest = dir.path().join("out.xlsx");
        write_master(&src);

        let err = patch_workbook(&src, &dest, "Nope", &[], &PatchOptions::default()).unwrap_err();
        assert!(matches!(err, PatchError::SheetNotFound(_)));
        assert!(!dest.exists());
    }
}
