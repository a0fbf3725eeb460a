//! File decoding: uploaded bytes → ordered raw records
//!
//! Delimited text is tried against a prioritized list of encodings. An
//! encoding is accepted only if it decodes without errors AND the parsed header
//! has a column that looks like review content; otherwise the next candidate
//! is tried. When every candidate decodes cleanly but none shows a content
//! column, the first clean parse is returned so that schema resolution can
//! report exactly which column is missing. Only when nothing decodes at all is
//! the file rejected here. Spreadsheets are read from the first sheet only,
//! keeping native date cells as dates.

use crate::error::{PipelineError, PipelineResult};
use crate::models::{FileKind, RawRecord, RawValue};
use crate::services::schema_resolver::{column_matches, CONTENT_TERMS, DATE_TERMS};
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::Encoding;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// Decoder for uploaded tabular files
#[derive(Debug, Clone)]
pub struct FileDecoder {
    encodings: Vec<&'static Encoding>,
}

impl Default for FileDecoder {
    fn default() -> Self {
        Self {
            encodings: vec![encoding_rs::UTF_8, encoding_rs::BIG5, encoding_rs::GB18030],
        }
    }
}

impl FileDecoder {
    /// Build a decoder from WHATWG encoding labels, in priority order
    pub fn new(labels: &[String]) -> revin_common::Result<Self> {
        let encodings = labels
            .iter()
            .map(|label| {
                Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
                    revin_common::Error::Config(format!("Unknown text encoding: {}", label))
                })
            })
            .collect::<revin_common::Result<Vec<_>>>()?;

        if encodings.is_empty() {
            return Err(revin_common::Error::Config(
                "At least one text encoding must be configured".to_string(),
            ));
        }
        Ok(Self { encodings })
    }

    pub fn encoding_names(&self) -> Vec<&'static str> {
        self.encodings.iter().map(|e| e.name()).collect()
    }

    /// Decode a whole file
    pub fn decode(&self, bytes: &[u8], kind: FileKind) -> PipelineResult<Vec<RawRecord>> {
        let records = match kind {
            FileKind::DelimitedText => self.decode_delimited(bytes)?,
            FileKind::Spreadsheet => decode_spreadsheet(bytes)?,
        };

        if records.is_empty() {
            return Err(PipelineError::decode("file contains no data rows"));
        }
        Ok(records)
    }

    fn decode_delimited(&self, bytes: &[u8]) -> PipelineResult<Vec<RawRecord>> {
        let mut rejections = Vec::new();
        let mut fallback: Option<(&'static str, Vec<RawRecord>)> = None;

        for encoding in &self.encodings {
            let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes)
            else {
                debug!(encoding = encoding.name(), "Bytes are not valid in this encoding");
                rejections.push(format!("{}: invalid byte sequence", encoding.name()));
                continue;
            };

            match parse_delimited(&text) {
                Ok((headers, records)) => {
                    if headers.iter().any(|h| column_matches(h, CONTENT_TERMS)) {
                        info!(
                            encoding = encoding.name(),
                            columns = ?headers,
                            rows = records.len(),
                            "Delimited text decoded"
                        );
                        return Ok(records);
                    }
                    debug!(
                        encoding = encoding.name(),
                        columns = ?headers,
                        "No review content column, trying next encoding"
                    );
                    rejections.push(format!("{}: no review content column", encoding.name()));
                    if fallback.is_none() {
                        fallback = Some((encoding.name(), records));
                    }
                }
                Err(reason) => {
                    debug!(encoding = encoding.name(), reason = %reason, "Parse failed");
                    rejections.push(format!("{}: {}", encoding.name(), reason));
                }
            }
        }

        if let Some((encoding, records)) = fallback {
            warn!(
                encoding,
                "No candidate encoding shows a review content column, using first clean parse"
            );
            return Ok(records);
        }

        Err(PipelineError::decode(format!(
            "no candidate encoding could parse the file ({})",
            rejections.join("; ")
        )))
    }
}

/// Strip a byte-order mark and surrounding whitespace from a column name
pub fn clean_header(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').trim().to_string()
}

/// Pick the delimiter that occurs most often in the header line (comma on ties)
fn sniff_delimiter(text: &str) -> u8 {
    let header_line = text
        .lines()
        .find(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .unwrap_or("");

    [b',', b'\t', b';']
        .into_iter()
        .map(|d| (d, header_line.matches(d as char).count()))
        .fold((b',', 0), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        })
        .0
}

/// Permissive CSV parse: ragged rows, `#` comments, quoted fields, `\` escapes
fn parse_delimited(text: &str) -> Result<(Vec<String>, Vec<RawRecord>), String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .has_headers(true)
        .flexible(true)
        .comment(Some(b'#'))
        .escape(Some(b'\\'))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format!("unreadable header row: {}", e))?
        .iter()
        .map(clean_header)
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err("empty header row".to_string());
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (line, result) in reader.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                skipped += 1;
                debug!(line, error = %e, "Skipping malformed record");
                continue;
            }
        };

        let mut record = RawRecord::new(records.len());
        for (i, header) in headers.iter().enumerate() {
            let value = row.get(i).map(RawValue::text).unwrap_or(RawValue::Empty);
            record.push(header.clone(), value);
        }
        if !record.is_blank() {
            records.push(record);
        }
    }

    if skipped > 0 {
        warn!(skipped, "Skipped malformed delimited records");
    }
    Ok((headers, records))
}

fn decode_spreadsheet(bytes: &[u8]) -> PipelineResult<Vec<RawRecord>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| PipelineError::decode(format!("unable to open the spreadsheet: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::decode("the workbook does not contain any worksheets"))?
        .map_err(|e| PipelineError::decode(format!("unable to read the first worksheet: {}", e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| PipelineError::decode("the first worksheet is empty"))?
        .iter()
        .map(|cell| match cell {
            Data::Empty => String::new(),
            other => clean_header(&other.to_string()),
        })
        .collect();

    let date_columns: Vec<bool> = headers
        .iter()
        .map(|h| column_matches(h, DATE_TERMS))
        .collect();

    let mut records = Vec::new();
    for row in rows {
        let mut record = RawRecord::new(records.len());
        for (i, header) in headers.iter().enumerate() {
            let value = row
                .get(i)
                .map(|cell| cell_to_raw(cell, date_columns[i]))
                .unwrap_or(RawValue::Empty);
            record.push(header.clone(), value);
        }
        if !record.is_blank() {
            records.push(record);
        }
    }

    info!(columns = ?headers, rows = records.len(), "Spreadsheet decoded");
    Ok(records)
}

fn cell_to_raw(cell: &Data, date_column: bool) -> RawValue {
    match cell {
        Data::Empty | Data::Error(_) => RawValue::Empty,
        Data::String(s) => RawValue::text(s.clone()),
        Data::Bool(b) => RawValue::Text(b.to_string()),
        Data::Int(i) => number_cell(*i as f64, date_column),
        Data::Float(f) => number_cell(*f, date_column),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(RawValue::Date)
            .unwrap_or(RawValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(RawValue::Date)
            .unwrap_or_else(|| RawValue::text(s.clone())),
        Data::DurationIso(s) => RawValue::text(s.clone()),
    }
}

/// Numbers in a date column are date serials; convert with the workbook epoch rules
fn number_cell(value: f64, date_column: bool) -> RawValue {
    if date_column && value > 0.0 {
        if let Some(dt) = Data::Float(value).as_datetime() {
            return RawValue::Date(dt);
        }
    }
    RawValue::Number(value)
}

fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(record: &RawRecord, column: &str) -> Option<String> {
        record.get(column).and_then(|v| v.as_text())
    }

    #[test]
    fn test_utf8_with_bom_and_padded_headers() {
        let bytes = "\u{feff} 評論內容 ,評分,日期\n很好用,5,2024-01-15\n".as_bytes();
        let records = FileDecoder::default()
            .decode(bytes, FileKind::DelimitedText)
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].columns().collect::<Vec<_>>(),
            vec!["評論內容", "評分", "日期"]
        );
        assert_eq!(text_of(&records[0], "評論內容").as_deref(), Some("很好用"));
        assert_eq!(text_of(&records[0], "評分").as_deref(), Some("5"));
    }

    #[test]
    fn test_falls_back_to_big5() {
        let (bytes, _, had_errors) = encoding_rs::BIG5.encode("評論內容,評分\n介面很清楚,4\n");
        assert!(!had_errors);

        let records = FileDecoder::default()
            .decode(&bytes, FileKind::DelimitedText)
            .unwrap();
        assert_eq!(text_of(&records[0], "評論內容").as_deref(), Some("介面很清楚"));
    }

    #[test]
    fn test_missing_content_column_falls_back_to_first_clean_parse() {
        let records = FileDecoder::default()
            .decode(b"title,stars\nhello,5\n", FileKind::DelimitedText)
            .unwrap();
        assert_eq!(records[0].columns().collect::<Vec<_>>(), vec!["title", "stars"]);
    }

    #[test]
    fn test_undecodable_bytes_are_decode_error() {
        // Invalid in UTF-8 and a lone lead byte in the multi-byte encodings
        let decoder = FileDecoder::new(&["utf-8".to_string(), "big5".to_string()]).unwrap();
        let err = decoder
            .decode(b"content,rating\n\xff\xfe\xff,5\n\x81", FileKind::DelimitedText)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
        assert!(err.to_string().contains("invalid byte sequence"));
    }

    #[test]
    fn test_header_only_is_decode_error() {
        let err = FileDecoder::default()
            .decode(b"content,rating\n", FileKind::DelimitedText)
            .unwrap_err();
        assert!(err.to_string().contains("no data rows"));
    }

    #[test]
    fn test_permissive_parsing() {
        let csv = "# exported 2024-01-01\n\
                   content,rating,device\n\
                   \"Fast, \"\"clean\"\" UI\",5,iOS\n\
                   short row,3\n\
                   \n\
                   long row,4,Android,extra\n\
                   ,,\n";
        let records = FileDecoder::default()
            .decode(csv.as_bytes(), FileKind::DelimitedText)
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(text_of(&records[0], "content").as_deref(), Some("Fast, \"clean\" UI"));
        assert_eq!(records[1].get("device"), Some(&RawValue::Empty));
        assert_eq!(text_of(&records[2], "device").as_deref(), Some("Android"));
        assert_eq!(records[2].index, 2);
    }

    #[test]
    fn test_tab_delimited() {
        let records = FileDecoder::default()
            .decode(b"comment\tscore\nnice\t4\n", FileKind::DelimitedText)
            .unwrap();
        assert_eq!(text_of(&records[0], "score").as_deref(), Some("4"));
    }

    #[test]
    fn test_unknown_encoding_label_rejected() {
        let err = FileDecoder::new(&["utf-8".to_string(), "klingon".to_string()]).unwrap_err();
        assert!(err.to_string().contains("klingon"));
        assert!(FileDecoder::new(&[]).is_err());

        let decoder = FileDecoder::new(&["utf8".to_string(), "big5".to_string()]).unwrap();
        assert_eq!(decoder.encoding_names(), vec!["UTF-8", "Big5"]);
    }

    #[test]
    fn test_garbage_spreadsheet_is_decode_error() {
        let err = FileDecoder::default()
            .decode(b"definitely not a workbook", FileKind::Spreadsheet)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_date_serial_conversion() {
        // 45306 is 2024-01-15 in the 1900 date system
        match number_cell(45306.0, true) {
            RawValue::Date(dt) => assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()),
            other => panic!("expected date, got {:?}", other),
        }
        assert_eq!(number_cell(45306.0, false), RawValue::Number(45306.0));
    }
}
