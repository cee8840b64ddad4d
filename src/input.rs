//! Sequential access to tabular data.
//!
//! Discovery never parses files itself. It reads rows through [`TabularStream`], which may be
//! scanned more than once thanks to [`TabularStream::reset`].

use crate::config::MAX_FIELD_LEN;
use crate::error::{Error, Result};
use csv_core::{ReadFieldResult, Reader, ReaderBuilder};
use std::io;
use std::str;

/// A source of rows with a fixed header.
pub trait TabularStream {
    /// Returns `true` if [`next_row`](TabularStream::next_row) has another row to return.
    fn has_next_row(&mut self) -> bool;

    /// Returns the next row. Callers should check [`has_next_row`](TabularStream::has_next_row)
    /// first; calling this at the end of the stream returns an empty row.
    fn next_row(&mut self) -> Result<Vec<String>>;

    /// The number of columns in the header.
    fn column_count(&self) -> usize;

    /// The name of the column at `index`.
    fn column_name(&self, index: usize) -> &str;

    /// A name for the whole table, used only for reporting.
    fn relation_name(&self) -> &str;

    /// Rewinds to the first data row.
    fn reset(&mut self);

    /// The one-based input line of the row that [`next_row`](TabularStream::next_row) will
    /// return, if the stream numbers its lines. Only meaningful after
    /// [`has_next_row`](TabularStream::has_next_row) returned `true`.
    fn next_row_line(&self) -> Option<u64> {
        None
    }
}

/// A table that already lives in memory as strings.
///
/// ```
/// use agree_lattice::{InMemoryTable, TabularStream};
///
/// let mut table = InMemoryTable::new("people", &["name", "city"])
///     .with_row(&["ann", "oslo"])
///     .with_row(&["bob", "rome"]);
/// assert_eq!(table.column_count(), 2);
/// assert_eq!(table.next_row().unwrap(), vec!["ann", "oslo"]);
/// table.reset();
/// assert!(table.has_next_row());
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    position: usize,
}

impl InMemoryTable {
    /// Creates a table with the given header and no rows.
    pub fn new(name: &str, columns: &[&str]) -> Self {
        InMemoryTable {
            name: name.to_owned(),
            columns: columns.iter().map(|c| (*c).to_owned()).collect(),
            rows: Vec::new(),
            position: 0,
        }
    }

    /// Appends one row.
    pub fn with_row<S: AsRef<str>>(mut self, row: &[S]) -> Self {
        self.push_row(row.iter().map(|field| field.as_ref().to_owned()).collect());
        self
    }

    /// Appends one row of owned strings.
    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Builds a table whose cells are the `Display` renderings of `rows`, with columns named
    /// `A`, `B`, `C`, and so on.
    pub fn from_values<T: ToString>(name: &str, rows: &[Vec<T>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let columns: Vec<String> = (0..width).map(spreadsheet_name).collect();
        InMemoryTable {
            name: name.to_owned(),
            columns,
            rows: rows
                .iter()
                .map(|row| row.iter().map(ToString::to_string).collect())
                .collect(),
            position: 0,
        }
    }
}

/// `0 -> A`, `25 -> Z`, `26 -> AA`, ...
fn spreadsheet_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

impl TabularStream for InMemoryTable {
    fn has_next_row(&mut self) -> bool {
        self.position < self.rows.len()
    }

    fn next_row(&mut self) -> Result<Vec<String>> {
        let row = self.rows.get(self.position).cloned().unwrap_or_default();
        self.position += 1;
        Ok(row)
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> &str {
        &self.columns[index]
    }

    fn relation_name(&self) -> &str {
        &self.name
    }

    fn reset(&mut self) {
        self.position = 0;
    }

    /// The header is line 1 and every row takes one line.
    fn next_row_line(&self) -> Option<u64> {
        Some(self.position as u64 + 2)
    }
}

/// Reads delimiter-separated text, such as CSV or TSV, from a buffer.
///
/// The whole input is buffered so that [`reset`](TabularStream::reset) can simply start parsing
/// again from the first data row.
pub struct DelimitedStream {
    name: String,
    delimiter: u8,
    data: Vec<u8>,
    columns: Vec<String>,
    reader: Reader,
    position: usize,
    first_row: usize,
    /// Lines before `first_row`, which a fresh reader doesn't know about.
    skipped_lines: u64,
    field: Vec<u8>,
    peeked: Option<Result<Vec<String>>>,
    peeked_line: u64,
}

impl DelimitedStream {
    /// Parses the header (if `has_header`) out of `data`. Without a header the columns are
    /// named `A`, `B`, `C`, and so on, and the first record is treated as data.
    pub fn new(name: &str, data: Vec<u8>, delimiter: u8, has_header: bool) -> Result<Self> {
        let mut stream = DelimitedStream {
            name: name.to_owned(),
            delimiter,
            data,
            columns: Vec::new(),
            reader: ReaderBuilder::new().delimiter(delimiter).build(),
            position: 0,
            first_row: 0,
            skipped_lines: 0,
            field: vec![0; MAX_FIELD_LEN],
            peeked: None,
            peeked_line: 0,
        };

        let first = stream.read_record()?;
        if has_header {
            stream.columns = first.unwrap_or_default();
            stream.first_row = stream.position;
            stream.skipped_lines = stream.reader.line().saturating_sub(1);
        } else {
            stream.columns = (0..first.map_or(0, |r| r.len()))
                .map(spreadsheet_name)
                .collect();
        }
        stream.reset();
        Ok(stream)
    }

    /// Reads everything from `input`; see [`DelimitedStream::new`].
    pub fn from_reader<R: io::Read>(
        name: &str,
        mut input: R,
        delimiter: u8,
        has_header: bool,
    ) -> Result<Self> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        Self::new(name, data, delimiter, has_header)
    }

    /// Errors report the line the record starts on.
    fn read_record(&mut self) -> Result<Option<Vec<String>>> {
        let line = self.line();
        let mut record = Vec::new();
        let mut fieldlen = 0;
        loop {
            let (result, nin, nout) = self
                .reader
                .read_field(&self.data[self.position..], &mut self.field[fieldlen..]);
            self.position += nin;
            fieldlen += nout;
            match result {
                // All remaining input was handed over, so the next call passes an empty slice,
                // which csv-core treats as end of input.
                ReadFieldResult::InputEmpty => {}
                ReadFieldResult::OutputFull => return Err(Error::FieldTooLong { line }),
                ReadFieldResult::Field { record_end } => {
                    let field = str::from_utf8(&self.field[..fieldlen])
                        .map_err(|_| Error::InvalidUtf8 { line })?;
                    record.push(field.to_owned());
                    fieldlen = 0;
                    if record_end {
                        return Ok(Some(record));
                    }
                }
                ReadFieldResult::End => {
                    return Ok(Some(record).filter(|record| !record.is_empty()));
                }
            }
        }
    }

    fn line(&self) -> u64 {
        self.reader.line() + self.skipped_lines
    }

    fn peek(&mut self) -> &Option<Result<Vec<String>>> {
        if self.peeked.is_none() {
            let line = self.line();
            self.peeked_line = line;
            let next = match self.read_record() {
                Ok(Some(row)) if row.len() != self.columns.len() => Some(Err(Error::RaggedRow {
                    line,
                    expected: self.columns.len(),
                    found: row.len(),
                })),
                Ok(Some(row)) => Some(Ok(row)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            };
            self.peeked = next;
        }
        &self.peeked
    }
}

impl TabularStream for DelimitedStream {
    fn has_next_row(&mut self) -> bool {
        self.peek().is_some()
    }

    fn next_row(&mut self) -> Result<Vec<String>> {
        self.peek();
        self.peeked.take().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> &str {
        &self.columns[index]
    }

    fn relation_name(&self) -> &str {
        &self.name
    }

    fn reset(&mut self) {
        self.reader = ReaderBuilder::new().delimiter(self.delimiter).build();
        self.position = self.first_row;
        self.peeked = None;
    }

    fn next_row_line(&self) -> Option<u64> {
        self.peeked.as_ref().map(|_| self.peeked_line)
    }
}
