// Excel workbook reading (xlsx, xlsm, xls, xlsb, ods) via calamine

use std::collections::{HashMap, HashSet};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, SheetType, SheetVisible, Sheets};
use serde::Serialize;

use crate::error::TableError;
use crate::table::{CellValue, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
    VeryHidden,
}

impl Visibility {
    /// Value of the `state` attribute on `<sheet>` in workbook.xml.
    pub fn from_state(state: Option<&str>) -> Self {
        match state {
            Some("hidden") => Self::Hidden,
            Some("veryHidden") => Self::VeryHidden,
            _ => Self::Visible,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Hidden => "hidden",
            Self::VeryHidden => "very_hidden",
        }
    }
}

impl From<SheetVisible> for Visibility {
    fn from(v: SheetVisible) -> Self {
        match v {
            SheetVisible::Visible => Self::Visible,
            SheetVisible::Hidden => Self::Hidden,
            SheetVisible::VeryHidden => Self::VeryHidden,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetInfo {
    pub name: String,
    pub visibility: Visibility,
}

fn open(path: &Path) -> Result<Sheets<std::io::BufReader<std::fs::File>>, TableError> {
    open_workbook_auto(path).map_err(|e| TableError::Read {
        path: path.to_path_buf(),
        message: format!("failed to open workbook: {}", e),
    })
}

fn worksheet_infos<R: std::io::Read + std::io::Seek>(workbook: &Sheets<R>) -> Vec<SheetInfo> {
    workbook
        .sheets_metadata()
        .iter()
        .filter(|s| s.typ == SheetType::WorkSheet)
        .map(|s| SheetInfo {
            name: s.name.clone(),
            visibility: s.visible.into(),
        })
        .collect()
}

/// Worksheets in workbook order. Chart sheets are left out.
pub fn list_sheets(path: &Path) -> Result<Vec<SheetInfo>, TableError> {
    let workbook = open(path)?;
    Ok(worksheet_infos(&workbook))
}

/// The sheet named like the file stem (case-insensitive), else the first worksheet.
pub fn default_sheet(path: &Path, sheets: &[SheetInfo]) -> Option<String> {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    sheets
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(stem))
        .or_else(|| sheets.first())
        .map(|s| s.name.clone())
}

fn convert(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => {
            if s.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(s.clone())
            }
        }
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
        // Date serials stay numeric so they are written back unchanged
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Load one sheet as a table. `sheet: None` picks [`default_sheet`].
pub fn load(path: &Path, sheet: Option<&str>, header_row: usize) -> Result<Table, TableError> {
    let mut workbook = open(path)?;
    let sheets = worksheet_infos(&workbook);
    if sheets.is_empty() {
        return Err(TableError::NoSheets(path.to_path_buf()));
    }

    let name = match sheet {
        Some(requested) => sheets
            .iter()
            .find(|s| s.name == requested)
            .or_else(|| sheets.iter().find(|s| s.name.eq_ignore_ascii_case(requested)))
            .map(|s| s.name.clone())
            .ok_or_else(|| TableError::SheetNotFound {
                path: path.to_path_buf(),
                sheet: requested.to_string(),
                available: sheets.iter().map(|s| s.name.clone()).collect(),
            })?,
        None => default_sheet(path, &sheets).ok_or_else(|| TableError::NoSheets(path.to_path_buf()))?,
    };

    let range = workbook.worksheet_range(&name).map_err(|e| TableError::Parse {
        path: path.to_path_buf(),
        message: format!("failed to read sheet '{}': {}", name, e),
    })?;

    // Range start offset (data may not begin at A1)
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut values = vec![CellValue::Empty; start_col as usize];
        values.extend(row.iter().map(convert));
        while values.last().is_some_and(|v| *v == CellValue::Empty) {
            values.pop();
        }
        rows.push(values);
    }

    let mut formulas = HashSet::new();
    if let Ok(formula_range) = workbook.worksheet_formula(&name) {
        let (f_row, f_col) = formula_range.start().unwrap_or((0, 0));
        for (r, c, formula) in formula_range.used_cells() {
            if !formula.is_empty() {
                formulas.insert((f_row as usize + r, f_col as usize + c));
            }
        }
    }

    // A formula below the last value row still needs a row to live in
    if let Some(last) = formulas.iter().map(|&(r, _)| r).max() {
        if rows.len() <= last {
            rows.resize(last + 1, Vec::new());
        }
    }

    tracing::debug!(
        path = %path.display(),
        sheet = %name,
        rows = rows.len(),
        formulas = formulas.len(),
        "loaded worksheet"
    );

    Table::from_rows(path, Some(name), rows, header_row, formulas)
}

/// A worksheet's entry in the package.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WorksheetPart {
    pub name: String,
    /// Zip entry name, e.g. `xl/worksheets/sheet1.xml`.
    pub path: String,
    pub visibility: Visibility,
}

pub(crate) fn attr_string(attr: &quick_xml::events::attributes::Attribute<'_>) -> String {
    let raw = String::from_utf8_lossy(&attr.value);
    match quick_xml::escape::unescape(&raw) {
        Ok(s) => s.into_owned(),
        Err(_) => raw.into_owned(),
    }
}

/// Resolve worksheet names and XML paths from workbook.xml + workbook.xml.rels
pub(crate) fn worksheet_parts(workbook_xml: &str, rels_xml: &str) -> Vec<WorksheetPart> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    // Step 1: Parse workbook.xml to get (name, rId, state) per sheet
    let mut sheets: Vec<(String, String, Visibility)> = Vec::new();
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut rid = None;
                let mut state = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => name = Some(attr_string(&attr)),
                        b"r:id" => rid = Some(attr_string(&attr)),
                        b"state" => state = Some(attr_string(&attr)),
                        _ => {}
                    }
                }
                if let (Some(name), Some(rid)) = (name, rid) {
                    sheets.push((name, rid, Visibility::from_state(state.as_deref())));
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    // Step 2: Parse rels to resolve rId → target path
    let mut rid_to_target: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(attr_string(&attr)),
                        b"Target" => target = Some(attr_string(&attr)),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    rid_to_target.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    // Step 3: Resolve each rId to a full path
    sheets
        .into_iter()
        .filter_map(|(name, rid, visibility)| {
            let target = rid_to_target.get(&rid)?;
            // Only include worksheet targets (skip chartsheets, etc.)
            if !target.contains("worksheet") {
                return None;
            }
            let path = match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("xl/{}", target),
            };
            Some(WorksheetPart {
                name,
                path,
                visibility,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Formula, Workbook};
    use tempfile::tempdir;

    fn write_catalogue(path: &Path) {
        let mut wb = Workbook::new();
        let summary = wb.add_worksheet();
        summary.set_name("Summary").unwrap();
        summary.write_string(0, 0, "Totals").unwrap();

        let games = wb.add_worksheet();
        games.set_name("Master_List").unwrap();
        games.write_string(1, 1, "Name").unwrap();
        games.write_string(1, 2, "Year").unwrap();
        games.write_string(2, 1, "Doom").unwrap();
        games.write_number(2, 2, 1993).unwrap();
        games.write_string(3, 1, "Myst").unwrap();
        games.write_string(4, 1, "Quake").unwrap();
        games.write_formula(4, 2, Formula::new("=C3+3")).unwrap();
        games.set_hidden(true);

        wb.save(path).unwrap();
    }

    #[test]
    fn lists_sheets_with_visibility() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Master_List.xlsx");
        write_catalogue(&path);

        let sheets = list_sheets(&path).unwrap();
        assert_eq!(
            sheets,
            vec![
                SheetInfo { name: "Summary".into(), visibility: Visibility::Visible },
                SheetInfo { name: "Master_List".into(), visibility: Visibility::Hidden },
            ]
        );
        assert_eq!(default_sheet(&path, &sheets).as_deref(), Some("Master_List"));
        assert_eq!(
            default_sheet(Path::new("other.xlsx"), &sheets).as_deref(),
            Some("Summary")
        );
    }

    #[test]
    fn loads_offset_range_with_formulas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Master_List.xlsx");
        write_catalogue(&path);

        let table = load(&path, None, 1).unwrap();
        assert_eq!(table.sheet.as_deref(), Some("Master_List"));
        assert_eq!(table.headers, vec!["A", "Name", "Year"]);
        assert_eq!(table.records.len(), 3);

        let doom = &table.records[0];
        assert_eq!(doom.row, 2);
        assert_eq!(doom.values[2], CellValue::Number(1993.0));

        let myst = &table.records[1];
        assert!(table.is_blank(myst, 2));

        let quake = &table.records[2];
        assert!(table.is_formula(quake.row, 2));
        assert!(!table.is_blank(quake, 2));
    }

    #[test]
    fn unknown_sheet_lists_available() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Master_List.xlsx");
        write_catalogue(&path);

        match load(&path, Some("Games"), 0).unwrap_err() {
            TableError::SheetNotFound { available, .. } => {
                assert_eq!(available, vec!["Summary", "Master_List"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        // case-insensitive fallback
        assert!(load(&path, Some("summary"), 0).is_ok());
    }

    #[test]
    fn resolves_worksheet_parts() {
        let workbook_xml = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>
            <sheet name="Summary" sheetId="1" r:id="rId1"/>
            <sheet name="Chart" sheetId="2" r:id="rId2"/>
            <sheet name="R&amp;D" sheetId="3" state="veryHidden" r:id="rId3"/>
        </sheets></workbook>"#;
        let rels_xml = r#"<Relationships>
            <Relationship Id="rId1" Target="worksheets/sheet1.xml"/>
            <Relationship Id="rId2" Target="chartsheets/sheet1.xml"/>
            <Relationship Id="rId3" Target="/xl/worksheets/sheet2.xml"/>
        </Relationships>"#;

        let parts = worksheet_parts(workbook_xml, rels_xml);
        assert_eq!(
            parts,
            vec![
                WorksheetPart {
                    name: "Summary".into(),
                    path: "xl/worksheets/sheet1.xml".into(),
                    visibility: Visibility::Visible,
                },
                WorksheetPart {
                    name: "R&D".into(),
                    path: "xl/worksheets/sheet2.xml".into(),
                    visibility: Visibility::VeryHidden,
                },
            ]
        );
    }
}
