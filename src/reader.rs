//! Streaming reader for leveled catalog CSV exports
//!
//! Accepts sqlplus-style exports of the argument catalog view:
//! - Delimiter sniffed from the first bytes of the stream (`;` wins over `,`)
//! - Case-insensitive header row; the first occurrence of a column wins
//! - Quoted fields with doubled-quote escapes; stray quotes stay literal
//! - Blank numeric fields read as zero; out-of-range values are fatal

use std::collections::HashMap;
use std::io::BufRead;

use crate::error::{CompileError, CompileResult};
use crate::ir::FlatArgument;

/// Columns every usable export must provide
const REQUIRED_COLUMNS: [&str; 18] = [
    "OBJECT_ID",
    "SUBPROGRAM_ID",
    "PACKAGE_NAME",
    "OBJECT_NAME",
    "DATA_LEVEL",
    "SEQUENCE",
    "ARGUMENT_NAME",
    "IN_OUT",
    "DATA_TYPE",
    "DATA_PRECISION",
    "DATA_SCALE",
    "CHARACTER_SET_NAME",
    "PLS_TYPE",
    "CHAR_LENGTH",
    "TYPE_LINK",
    "TYPE_OWNER",
    "TYPE_NAME",
    "TYPE_SUBNAME",
];

/// Optional column carrying the last DDL timestamp
const LAST_DDL_COLUMN: &str = "LAST_DDL_TIME";

/// How many leading bytes the delimiter sniff inspects
const SNIFF_BYTES: usize = 100;

/// Header name to field index map, resolved case-insensitively
#[derive(Debug, Clone)]
pub struct ColumnMap {
    indices: HashMap<&'static str, usize>,
}

impl ColumnMap {
    fn resolve(header: &[String]) -> Self {
        let mut indices = HashMap::with_capacity(REQUIRED_COLUMNS.len() + 1);
        for (i, cell) in header.iter().enumerate() {
            let upper = cell.to_uppercase();
            let known = REQUIRED_COLUMNS
                .iter()
                .copied()
                .find(|c| *c == upper)
                .or_else(|| (upper == LAST_DDL_COLUMN).then_some(LAST_DDL_COLUMN));
            if let Some(name) = known {
                indices.entry(name).or_insert(i);
            }
        }
        ColumnMap { indices }
    }

    /// Field of `cells` under a required column; absence fails the row
    fn get<'a>(
        &self,
        cells: &'a [String],
        row: usize,
        column: &'static str,
    ) -> CompileResult<&'a str> {
        match self.indices.get(column) {
            Some(&i) => Ok(&cells[i]),
            None => Err(CompileError::MissingColumn { row, column }),
        }
    }

    /// Field under an optional column, empty when the export lacks it
    fn get_optional<'a>(&self, cells: &'a [String], column: &'static str) -> &'a str {
        match self.indices.get(column) {
            Some(&i) => &cells[i],
            None => "",
        }
    }
}

impl std::fmt::Display for ColumnMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut cols: Vec<_> = self.indices.iter().collect();
        cols.sort_by_key(|(_, i)| **i);
        for (n, (name, i)) in cols.into_iter().enumerate() {
            if n > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, i)?;
        }
        Ok(())
    }
}

/// Lazy row reader over a catalog CSV stream
///
/// Yields one [`FlatArgument`] per data row; the first yielded error ends
/// the sequence.
pub struct CsvReader<R: BufRead> {
    input: R,
    delimiter: char,
    columns: ColumnMap,
    width: usize,
    row: usize,
    failed: bool,
}

impl<R: BufRead> CsvReader<R> {
    /// Sniff the delimiter and consume the header row
    pub fn new(mut input: R) -> CompileResult<Self> {
        let buffered = input.fill_buf()?;
        let prefix = &buffered[..buffered.len().min(SNIFF_BYTES)];
        let delimiter = if prefix.contains(&b';') { ';' } else { ',' };

        let mut reader = CsvReader {
            input,
            delimiter,
            columns: ColumnMap {
                indices: HashMap::new(),
            },
            width: 0,
            row: 0,
            failed: false,
        };
        let header = match reader.read_record()? {
            Some(cells) => cells,
            None => return Err(CompileError::header("empty input, no header row")),
        };
        reader.width = header.len();
        reader.columns = ColumnMap::resolve(&header);
        Ok(reader)
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Read one physical record, following quoted fields across lines
    fn read_record(&mut self) -> CompileResult<Option<Vec<String>>> {
        let mut current = String::new();
        loop {
            current.clear();
            if self.input.read_line(&mut current)? == 0 {
                return Ok(None);
            }
            // blank lines are not records
            if current == "\n" || current == "\r\n" {
                continue;
            }
            break;
        }

        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut at_start = true;

        loop {
            let content = current.strip_suffix('\n').unwrap_or(&current);
            let content = content.strip_suffix('\r').unwrap_or(content);
            let mut chars = content.chars().peekable();
            while let Some(c) = chars.next() {
                if in_quotes {
                    if c == '"' {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            field.push('"');
                        } else {
                            in_quotes = false;
                        }
                    } else {
                        field.push(c);
                    }
                } else if at_start && (c == ' ' || c == '\t') {
                    // leading whitespace outside quotes is dropped
                } else if at_start && c == '"' {
                    in_quotes = true;
                    at_start = false;
                } else if c == self.delimiter {
                    fields.push(std::mem::take(&mut field));
                    at_start = true;
                } else {
                    // a quote inside an unquoted field stays literal
                    field.push(c);
                    at_start = false;
                }
            }
            if !in_quotes {
                break;
            }
            // the newline belongs to the quoted field
            field.push('\n');
            current.clear();
            if self.input.read_line(&mut current)? == 0 {
                break;
            }
        }
        fields.push(field);
        Ok(Some(fields))
    }

    fn text(&self, cells: &[String], column: &'static str) -> CompileResult<String> {
        Ok(self.columns.get(cells, self.row, column)?.to_string())
    }

    fn uint(&self, cells: &[String], column: &'static str) -> CompileResult<u32> {
        parse_u32(self.columns.get(cells, self.row, column)?, self.row, column)
    }

    fn byte(&self, cells: &[String], column: &'static str) -> CompileResult<u8> {
        parse_u8(self.columns.get(cells, self.row, column)?, self.row, column)
    }

    fn build_row(&self, cells: &[String]) -> CompileResult<FlatArgument> {
        Ok(FlatArgument {
            object_id: self.uint(cells, "OBJECT_ID")?,
            subprogram_id: self.uint(cells, "SUBPROGRAM_ID")?,
            package_name: self.text(cells, "PACKAGE_NAME")?,
            object_name: self.text(cells, "OBJECT_NAME")?,
            last_ddl: self.columns.get_optional(cells, LAST_DDL_COLUMN).to_string(),
            argument_name: self.text(cells, "ARGUMENT_NAME")?,
            in_out: self.text(cells, "IN_OUT")?,
            data_level: self.byte(cells, "DATA_LEVEL")?,
            position: self.uint(cells, "SEQUENCE")?,
            data_type: self.text(cells, "DATA_TYPE")?,
            data_precision: self.byte(cells, "DATA_PRECISION")?,
            data_scale: self.byte(cells, "DATA_SCALE")?,
            character_set_name: self.text(cells, "CHARACTER_SET_NAME")?,
            pls_type: self.text(cells, "PLS_TYPE")?,
            char_length: self.uint(cells, "CHAR_LENGTH")?,
            type_owner: self.text(cells, "TYPE_OWNER")?,
            type_name: self.text(cells, "TYPE_NAME")?,
            type_subname: self.text(cells, "TYPE_SUBNAME")?,
            type_link: self.text(cells, "TYPE_LINK")?,
        })
    }
}

impl<R: BufRead> Iterator for CsvReader<R> {
    type Item = CompileResult<FlatArgument>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let cells = match self.read_record() {
            Ok(Some(cells)) => cells,
            Ok(None) => return None,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };
        self.row += 1;
        if cells.len() != self.width {
            self.failed = true;
            return Some(Err(CompileError::parse(
                self.row,
                format!("expected {} fields, got {}", self.width, cells.len()),
            )));
        }
        let row = self.build_row(&cells);
        if row.is_err() {
            self.failed = true;
        }
        Some(row)
    }
}

fn parse_u32(text: &str, row: usize, column: &'static str) -> CompileResult<u32> {
    if text.is_empty() {
        return Ok(0);
    }
    text.parse().map_err(|_| {
        CompileError::parse(
            row,
            format!("column {}: {:?} out of range for u32", column, text),
        )
    })
}

fn parse_u8(text: &str, row: usize, column: &'static str) -> CompileResult<u8> {
    if text.is_empty() {
        return Ok(0);
    }
    text.parse().map_err(|_| {
        CompileError::parse(
            row,
            format!("column {}: {:?} out of range for u8", column, text),
        )
    })
}
