//! Spreadsheet access for imports.
//!
//! Only the first worksheet is read. Every cell is exposed as its display
//! string, and cell positions stay absolute: calamine trims leading empty
//! rows and columns from a range, so rows are re-padded to keep configured
//! column indices and reported row numbers pointing at what the user sees.

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("workbook contains no sheets")]
    NoSheets,
}

/// One spreadsheet row with its 1-based row number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub number: usize,
    pub cells: Vec<String>,
}

impl SheetRow {
    /// Cell at a zero-based column, empty when the row is shorter.
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

pub struct Worksheet {
    range: Range<Data>,
}

impl Worksheet {
    /// Open the first worksheet of an xlsx, xlsm, xlsb, xls or ods workbook.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SheetError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(SheetError::NoSheets)?;
        let range = workbook.worksheet_range(&sheet_name)?;
        Ok(Self { range })
    }

    /// Rows in sheet order. Empty sheets yield nothing.
    pub fn rows(&self) -> impl Iterator<Item = SheetRow> + '_ {
        let (first_row, first_column) = self.range.start().unwrap_or((0, 0));
        self.range.rows().enumerate().map(move |(offset, cells)| {
            let mut values = vec![String::new(); first_column as usize];
            values.extend(cells.iter().map(cell_text));
            SheetRow {
                number: first_row as usize + offset + 1,
                cells: values,
            }
        })
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) fn workbook_bytes(rows: &[&[&str]]) -> Vec<u8> {
    use rust_xlsxwriter::Workbook;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (row_index, row) in rows.iter().enumerate() {
        for (column_index, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            worksheet
                .write_string(row_index as u32, column_index as u16, *value)
                .expect("write cell");
        }
    }
    workbook.save_to_buffer().expect("serialize workbook")
}
