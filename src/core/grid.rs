use crate::domain::model::RosterFile;
use crate::utils::error::{ImportError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read, Seek};
use zip::result::ZipError;
use zip::ZipArchive;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const DEFAULT_SHEET: &str = "xl/worksheets/sheet1.xml";

/// Rows × columns of trimmed cell text. Missing cells read as "".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.as_ref().trim().to_string())
                    .collect()
            })
            .collect();
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_blank(&self) -> bool {
        self.rows.iter().flatten().all(|cell| cell.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Tsv,
    Xlsx,
}

impl FileFormat {
    pub const EXTENSIONS: [&'static str; 3] = ["xlsx", "csv", "tsv"];

    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = std::path::Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(FileFormat::Csv),
            "tsv" => Some(FileFormat::Tsv),
            "xlsx" => Some(FileFormat::Xlsx),
            _ => None,
        }
    }
}

/// 將上傳檔案解碼為表格
pub fn decode(file: &RosterFile) -> Result<Grid> {
    crate::utils::validation::validate_file_extension(
        "file",
        &file.file_name,
        &FileFormat::EXTENSIONS,
    )?;

    let grid = match FileFormat::from_file_name(&file.file_name) {
        Some(FileFormat::Csv) => decode_delimited(&file.bytes, b',')?,
        Some(FileFormat::Tsv) => decode_delimited(&file.bytes, b'\t')?,
        Some(FileFormat::Xlsx) => decode_xlsx(&file.bytes)?,
        None => {
            return Err(ImportError::InvalidFormat {
                message: format!("unsupported file '{}'", file.file_name),
            })
        }
    };

    tracing::debug!(
        "Decoded '{}' into {} rows x {} columns",
        file.file_name,
        grid.row_count(),
        grid.column_count()
    );
    Ok(grid)
}

fn decode_delimited(bytes: &[u8], delimiter: u8) -> Result<Grid> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    Ok(Grid::from_rows(rows))
}

fn decode_xlsx(bytes: &[u8]) -> Result<Grid> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let shared_strings = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_path = first_sheet_path(&mut archive)?;
    let sheet_xml = read_entry(&mut archive, &sheet_path)?.ok_or_else(|| {
        ImportError::InvalidFormat {
            message: format!("workbook has no worksheet at '{}'", sheet_path),
        }
    })?;

    parse_sheet(&sheet_xml, &shared_strings)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some(content))
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Resolves the first `<sheet>` of the workbook through its relationship id.
fn first_sheet_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let Some(workbook) = read_entry(archive, "xl/workbook.xml")? else {
        return Ok(DEFAULT_SHEET.to_string());
    };

    let mut relationship_id = None;
    let mut reader = Reader::from_str(&workbook);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                relationship_id = e
                    .attributes()
                    .flatten()
                    .find(|attr| attr.key.as_ref().ends_with(b":id"))
                    .map(|attr| String::from_utf8_lossy(&attr.value).into_owned());
                break;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let (Some(relationship_id), Some(rels)) = (
        relationship_id,
        read_entry(archive, "xl/_rels/workbook.xml.rels")?,
    ) else {
        return Ok(DEFAULT_SHEET.to_string());
    };

    let mut reader = Reader::from_str(&rels);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attribute(&e, b"Id").as_deref() != Some(relationship_id.as_str()) {
                    continue;
                }
                if let Some(target) = attribute(&e, b"Target") {
                    return Ok(match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{}", target),
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(DEFAULT_SHEET.to_string())
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // phonetic runs (<rPh>) repeat the reading, not the value
    let mut in_phonetic = false;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"rPh" => in_phonetic = true,
                b"t" if !in_phonetic => in_text = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

/// Worksheet bounds of the xlsx format (column XFD, row 1048576).
const XLSX_MAX_COLUMNS: usize = 16_384;
const XLSX_MAX_ROWS: usize = 1_048_576;

/// Largest sheet extent accepted for a roster. The grid is dense, so a
/// single stray far-corner cell must not decide its size.
pub const MAX_ROSTER_ROWS: usize = 5_000;
pub const MAX_ROSTER_COLUMNS: usize = 500;

/// "AB12" -> (row 11, column 27), both 0-based. `None` outside the
/// worksheet bounds.
fn parse_cell_ref(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let column = letters.bytes().try_fold(0usize, |acc, c| {
        acc.checked_mul(26)?
            .checked_add(usize::from(c.to_ascii_uppercase() - b'A') + 1)
            .filter(|&column| column <= XLSX_MAX_COLUMNS)
    })?;
    let row = parse_row_number(digits)?;
    Some((row, column - 1))
}

/// 1-based row number -> 0-based index.
fn parse_row_number(digits: &str) -> Option<usize> {
    let row: usize = digits.parse().ok()?;
    (1..=XLSX_MAX_ROWS).contains(&row).then(|| row - 1)
}

fn cell_position(element: &BytesStart<'_>, fallback: (usize, usize)) -> Result<(usize, usize)> {
    match attribute(element, b"r") {
        Some(reference) => parse_cell_ref(&reference).ok_or_else(|| ImportError::InvalidFormat {
            message: format!("invalid cell reference '{}'", reference),
        }),
        None => Ok(fallback),
    }
}

fn check_extent(row_count: usize, column_count: usize) -> Result<()> {
    if row_count > MAX_ROSTER_ROWS || column_count > MAX_ROSTER_COLUMNS {
        return Err(ImportError::InvalidFormat {
            message: format!(
                "sheet spans {} rows x {} columns; a roster may use at most {} x {}",
                row_count, column_count, MAX_ROSTER_ROWS, MAX_ROSTER_COLUMNS
            ),
        });
    }
    Ok(())
}

#[derive(Default)]
struct PendingCell {
    position: (usize, usize),
    kind: Option<String>,
    value: String,
}

fn parse_sheet(xml: &str, shared_strings: &[String]) -> Result<Grid> {
    let mut cells: Vec<(usize, usize, String)> = Vec::new();
    let mut pending: Option<PendingCell> = None;
    let mut in_value = false;
    let mut current_row = 0usize;
    let mut next_column = 0usize;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    if let Some(r) = attribute(&e, b"r") {
                        current_row =
                            parse_row_number(&r).ok_or_else(|| ImportError::InvalidFormat {
                                message: format!("invalid row number '{}'", r),
                            })?;
                    }
                    next_column = 0;
                }
                b"c" => {
                    let position = cell_position(&e, (current_row, next_column))?;
                    pending = Some(PendingCell {
                        position,
                        kind: attribute(&e, b"t"),
                        value: String::new(),
                    });
                }
                b"v" | b"t" => in_value = pending.is_some(),
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let (_, column) = cell_position(&e, (current_row, next_column))?;
                next_column = column + 1;
            }
            Event::Text(t) if in_value => {
                if let Some(cell) = pending.as_mut() {
                    cell.value.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"row" => current_row = current_row.saturating_add(1),
                b"c" => {
                    if let Some(cell) = pending.take() {
                        let (row, column) = cell.position;
                        next_column = column.saturating_add(1);
                        let value = match cell.kind.as_deref() {
                            Some("s") => cell
                                .value
                                .trim()
                                .parse::<usize>()
                                .ok()
                                .and_then(|idx| shared_strings.get(idx))
                                .cloned()
                                .unwrap_or_default(),
                            Some("b") => match cell.value.trim() {
                                "1" => "TRUE".to_string(),
                                _ => "FALSE".to_string(),
                            },
                            _ => cell.value,
                        };
                        cells.push((row, column, value));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let row_count = cells.iter().map(|(row, _, _)| row + 1).max().unwrap_or(0);
    let column_count = cells.iter().map(|(_, column, _)| column + 1).max().unwrap_or(0);
    check_extent(row_count, column_count)?;
    let mut rows = vec![vec![String::new(); column_count]; row_count];
    for (row, column, value) in cells {
        rows[row][column] = value;
    }

    Ok(Grid::from_rows(rows))
}
