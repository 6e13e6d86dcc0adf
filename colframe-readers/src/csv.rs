//! CSV adapter
//!
//! Each field position of the input becomes one source column. The first
//! line is not skipped: it is row 0 of every column, so header text can be
//! read through the cursor like any other value. Records shorter than the
//! first one yield [`Value::Null`] for their missing fields; extra fields
//! beyond the first record's width are ignored.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use ::csv::{ReaderBuilder, Trim};
use colframe_core::{Dataframe, FillContext, RowSource, Value};
use memmap2::MmapOptions;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

/// Options for reading CSV input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field delimiter
    pub delimiter: u8,

    /// Quote character
    pub quote: u8,

    /// Escape character; `None` means quotes are escaped by doubling
    pub escape: Option<u8>,

    /// Lines starting with this byte are skipped
    pub comment: Option<u8>,

    /// Whether to trim surrounding whitespace from fields
    pub trim: bool,

    /// Whether to name each column after its row-0 field
    pub name_columns: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            escape: None,
            comment: None,
            trim: false,
            name_columns: true,
        }
    }
}

/// Parsed records shared by every column of one CSV input
#[derive(Debug)]
struct CsvTable {
    records: Vec<Vec<Arc<str>>>,
}

/// One field position of a [`CsvTable`]
#[derive(Debug, Clone)]
struct CsvColumn {
    table: Arc<CsvTable>,
    field: usize,
}

impl RowSource for CsvColumn {
    fn fetch(&self, rows: &[usize], _ctx: &FillContext<'_>) -> colframe_core::Result<Vec<Value>> {
        let records = &self.table.records;
        rows.iter()
            .map(|&row| {
                let record = records.get(row).ok_or(colframe_core::Error::IndexOutOfRange {
                    index: row,
                    len: records.len(),
                })?;
                Ok(record
                    .get(self.field)
                    .map_or(Value::Null, |field| Value::Str(Arc::clone(field))))
            })
            .collect()
    }
}

/// Parse CSV from any reader into a dataframe of string columns
///
/// The column count is the number of fields in the first record and is
/// available as [`Dataframe::column_count`].
pub fn from_csv_reader<R: Read>(reader: R, options: &CsvOptions) -> Result<Dataframe> {
    let mut builder = ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .delimiter(options.delimiter)
        .quote(options.quote)
        .escape(options.escape)
        .double_quote(options.escape.is_none())
        .comment(options.comment)
        .trim(if options.trim { Trim::All } else { Trim::None });

    let mut records = Vec::new();
    for record in builder.from_reader(reader).records() {
        let record = record?;
        records.push(record.iter().map(Arc::from).collect::<Vec<Arc<str>>>());
    }

    let column_count = records.first().map_or(0, Vec::len);
    let names: Vec<Arc<str>> = records.first().cloned().unwrap_or_default();
    let table = Arc::new(CsvTable { records });
    let frame = Dataframe::new(table.records.len());

    for field in 0..column_count {
        let column = frame.register_source(CsvColumn {
            table: Arc::clone(&table),
            field,
        });
        if !options.name_columns {
            continue;
        }
        let name = &names[field];
        if frame.column_id(name).is_some() {
            debug!(field, %name, "duplicate header name, keeping the first column");
        } else {
            frame.name_column(column, name)?;
        }
    }

    info!(
        frame = %frame.id(),
        rows = frame.row_count(),
        columns = column_count,
        "loaded csv"
    );
    Ok(frame)
}

/// Memory-map a CSV file and parse it with [`from_csv_reader`]
pub fn from_csv_path<P: AsRef<Path>>(path: P, options: &CsvOptions) -> Result<Dataframe> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    debug!(path = %path.display(), size, "opening csv");

    // Mapping a zero-length file fails on some platforms.
    if size == 0 {
        return from_csv_reader(io::empty(), options);
    }

    // SAFETY: the map is read-only and dropped before this call returns; the
    // file must not be truncated concurrently.
    #[allow(unsafe_code)]
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    from_csv_reader(&mmap[..], options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_case::test_case;

    const QUOTES: &str = "\
id,\"\"\"header\"\" 2\",c,d
1,b,x,y
2,d,x,y
3,f
";

    fn column_strings(frame: &Dataframe, column: usize) -> Vec<Option<String>> {
        frame
            .iter(&[column])
            .unwrap()
            .map(|row| row.unwrap()[0].as_str().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_header_is_row_zero() {
        let frame = from_csv_reader(QUOTES.as_bytes(), &CsvOptions::default()).unwrap();
        assert_eq!(frame.column_count(), 4);
        assert_eq!(frame.row_count(), 4);
        assert_eq!(
            column_strings(&frame, 1),
            vec![
                Some("\"header\" 2".to_string()),
                Some("b".to_string()),
                Some("d".to_string()),
                Some("f".to_string()),
            ]
        );
    }

    #[test]
    fn test_short_record_yields_null() {
        let frame = from_csv_reader(QUOTES.as_bytes(), &CsvOptions::default()).unwrap();
        let last: Vec<_> = column_strings(&frame, 3);
        assert_eq!(last[3], None);
    }

    #[test]
    fn test_columns_are_named_after_row_zero() {
        let frame = from_csv_reader(QUOTES.as_bytes(), &CsvOptions::default()).unwrap();
        assert_eq!(frame.column_id("id"), Some(0));
        assert_eq!(frame.column_id("d"), Some(3));

        let options = CsvOptions {
            name_columns: false,
            ..CsvOptions::default()
        };
        let frame = from_csv_reader(QUOTES.as_bytes(), &options).unwrap();
        assert_eq!(frame.column_id("id"), None);
    }

    #[test]
    fn test_duplicate_header_keeps_first_column() {
        let frame = from_csv_reader("x,y,x\n1,2,3\n".as_bytes(), &CsvOptions::default()).unwrap();
        assert_eq!(frame.column_count(), 3);
        assert_eq!(frame.column_id("x"), Some(0));
        assert_eq!(frame.column_id("y"), Some(1));
    }

    #[test_case(b';', "a;b\n1;2\n" ; "semicolon")]
    #[test_case(b'\t', "a\tb\n1\t2\n" ; "tab")]
    fn test_delimiters(delimiter: u8, input: &str) {
        let options = CsvOptions {
            delimiter,
            ..CsvOptions::default()
        };
        let frame = from_csv_reader(input.as_bytes(), &options).unwrap();
        assert_eq!(frame.column_count(), 2);
        assert_eq!(column_strings(&frame, 1), vec![Some("b".to_string()), Some("2".to_string())]);
    }

    #[test]
    fn test_trim_and_comments() {
        let options = CsvOptions {
            trim: true,
            comment: Some(b'#'),
            ..CsvOptions::default()
        };
        let frame = from_csv_reader(" a , b \n# skipped\n 1 , 2 \n".as_bytes(), &options).unwrap();
        assert_eq!(frame.row_count(), 2);
        assert_eq!(column_strings(&frame, 0), vec![Some("a".to_string()), Some("1".to_string())]);
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(QUOTES.as_bytes()).unwrap();
        file.flush().unwrap();

        let frame = from_csv_path(file.path(), &CsvOptions::default()).unwrap();
        assert_eq!(frame.column_count(), 4);
        assert_eq!(column_strings(&frame, 0)[2], Some("2".to_string()));
    }

    #[test]
    fn test_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let frame = from_csv_path(file.path(), &CsvOptions::default()).unwrap();
        assert_eq!(frame.row_count(), 0);
        assert_eq!(frame.column_count(), 0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = from_csv_path("/definitely/not/here.csv", &CsvOptions::default()).unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
