//! Bulk contact import from a spreadsheet.
//!
//! The first row is a header; columns are matched by name (`phone`, `name`,
//! `notes`, `labels`, `groups`, any case). Rows without a phone are dropped.

use std::io::Read;
use std::path::Path;

use calamine::{Reader, open_workbook_auto};

use crate::api::models::NewContact;
use crate::error::{ConsoleError, Result};

/// Number of rows shown in the preview before "and N more".
pub const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportRow {
    pub phone: String,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub labels: Vec<String>,
    pub groups: Vec<String>,
}

impl From<&ImportRow> for NewContact {
    fn from(row: &ImportRow) -> Self {
        NewContact {
            phone: row.phone.clone(),
            name: row.name.clone(),
            notes: row.notes.clone(),
            labels: row.labels.clone(),
            groups: row.groups.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub rows: Vec<ImportRow>,
    pub remaining: usize,
}

impl Preview {
    pub fn of(rows: &[ImportRow]) -> Self {
        Self {
            rows: rows.iter().take(PREVIEW_ROWS).cloned().collect(),
            remaining: rows.len().saturating_sub(PREVIEW_ROWS),
        }
    }

    pub fn total(&self) -> usize {
        self.rows.len() + self.remaining
    }
}

/// Tally of a finished import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub imported: usize,
    pub failed: usize,
}

impl std::fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let noun = if self.imported == 1 { "contact" } else { "contacts" };
        write!(f, "Imported {} {}", self.imported, noun)?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}

/// Read a spreadsheet from disk: `.csv` through the csv reader, anything
/// else (xlsx, xls, ods) through calamine's first worksheet.
pub fn read_file(path: &Path) -> Result<Vec<ImportRow>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        let file = std::fs::File::open(path)
            .map_err(|e| ConsoleError::Import(format!("{}: {}", path.display(), e)))?;
        return parse_csv(file);
    }
    let mut workbook = open_workbook_auto(path).map_err(|e| ConsoleError::Parse(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ConsoleError::Import("The spreadsheet has no sheets".into()))?
        .map_err(|e| ConsoleError::Parse(e.to_string()))?;
    let table: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();
    rows_from_table(table)
}

pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<ImportRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut table: Vec<Vec<String>> = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| ConsoleError::Parse(e.to_string()))?;
        table.push(record.iter().map(str::to_string).collect());
    }
    rows_from_table(table)
}

#[derive(Default)]
struct Columns {
    phone: Option<usize>,
    name: Option<usize>,
    notes: Option<usize>,
    labels: Option<usize>,
    groups: Option<usize>,
}

pub fn rows_from_table(table: Vec<Vec<String>>) -> Result<Vec<ImportRow>> {
    let mut iter = table.into_iter();
    let header = iter
        .next()
        .ok_or_else(|| ConsoleError::Import("The spreadsheet is empty".into()))?;

    let mut cols = Columns::default();
    for (idx, title) in header.iter().enumerate() {
        match title.trim().to_ascii_lowercase().as_str() {
            "phone" | "number" | "phone number" => cols.phone = cols.phone.or(Some(idx)),
            "name" => cols.name = cols.name.or(Some(idx)),
            "notes" | "note" => cols.notes = cols.notes.or(Some(idx)),
            "labels" | "label" | "tags" => cols.labels = cols.labels.or(Some(idx)),
            "groups" | "group" => cols.groups = cols.groups.or(Some(idx)),
            _ => {}
        }
    }
    let Some(phone_col) = cols.phone else {
        return Err(ConsoleError::Import("No \"phone\" column found".into()));
    };

    let mut out = Vec::new();
    for row in iter {
        let Some(phone) = cell(&row, Some(phone_col)) else { continue };
        out.push(ImportRow {
            phone,
            name: cell(&row, cols.name),
            notes: cell(&row, cols.notes),
            labels: split_list(cell(&row, cols.labels).as_deref()),
            groups: split_list(cell(&row, cols.groups).as_deref()),
        });
    }
    log::info!("parsed {} importable rows", out.len());
    Ok(out)
}

fn cell(row: &[String], col: Option<usize>) -> Option<String> {
    col.and_then(|c| row.get(c))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// "vip, lead; 2024" -> ["vip", "lead", "2024"]
pub(crate) fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split([',', ';'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn rows_without_phone_are_dropped() {
        let csv = "Phone,Name,Labels\n5511,Ana,\"vip, lead\"\n,Nobody,x\n  ,Blank,\n4477,,\n";
        let rows = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].phone, "5511");
        assert_eq!(rows[0].name.as_deref(), Some("Ana"));
        assert_eq!(rows[0].labels, vec!["vip".to_string(), "lead".to_string()]);
        assert_eq!(rows[1].phone, "4477");
        assert_eq!(rows[1].name, None);
    }

    #[test]
    fn missing_phone_column_is_an_error() {
        let err = parse_csv("name,notes\nAna,hi\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ConsoleError::Import(_)));
    }

    #[test]
    fn empty_file_is_an_error() {
        assert!(parse_csv("".as_bytes()).is_err());
    }

    #[test]
    fn preview_shows_five_and_counts_the_rest() {
        let rows: Vec<ImportRow> = (0..8)
            .map(|i| ImportRow { phone: format!("55{i}"), ..Default::default() })
            .collect();
        let preview = Preview::of(&rows);
        assert_eq!(preview.rows.len(), 5);
        assert_eq!(preview.remaining, 3);
        assert_eq!(preview.total(), 8);
        assert_eq!(Preview::of(&rows[..2]).remaining, 0);
    }

    #[test]
    fn summary_wording() {
        assert_eq!(
            ImportSummary { imported: 5, failed: 2 }.to_string(),
            "Imported 5 contacts, 2 failed"
        );
        assert_eq!(ImportSummary { imported: 1, failed: 0 }.to_string(), "Imported 1 contact");
    }

    #[test]
    fn reads_csv_files_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "phone,name,groups").unwrap();
        writeln!(file, "5511,Ana,sales;ops").unwrap();
        let rows = read_file(file.path()).unwrap();
        assert_eq!(rows[0].groups, vec!["sales".to_string(), "ops".to_string()]);
    }
}
