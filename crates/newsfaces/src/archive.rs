//! Streaming WARC record reader.
//!
//! Reads one record at a time from a plain or gzip-wrapped archive. The
//! iterator is a single forward pass: a malformed frame yields one
//! `ArchiveParseTruncated` error and ends the stream, leaving every record
//! produced before it valid.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::types::{IngestError, IngestResult, RawRecord, RecordHeaders};

/// Leading bytes of a gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Longest header line accepted before the frame is treated as corrupt.
const MAX_HEADER_LINE: usize = 64 * 1024;

/// Whether `bytes` starts with the gzip marker.
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[..2] == GZIP_MAGIC
}

/// Lazy iterator over the records of one archive object.
pub struct ArchiveReader {
    reader: Box<dyn BufRead + Send>,
    records: usize,
    finished: bool,
}

impl ArchiveReader {
    /// Open an archive file, detecting gzip framing from its first bytes.
    pub fn open(path: &Path) -> IngestResult<Self> {
        let file = File::open(path)?;
        Self::new(file)
    }

    /// Wrap any byte source, detecting gzip framing from its first bytes.
    pub fn new<R: Read + Send + 'static>(source: R) -> IngestResult<Self> {
        let mut buffered = BufReader::new(source);
        let compressed = is_gzip(buffered.fill_buf()?);

        let reader: Box<dyn BufRead + Send> = if compressed {
            Box::new(BufReader::new(MultiGzDecoder::new(buffered)))
        } else {
            Box::new(buffered)
        };

        Ok(Self {
            reader,
            records: 0,
            finished: false,
        })
    }

    /// Number of records yielded so far.
    pub fn records_read(&self) -> usize {
        self.records
    }

    fn truncated(&mut self, reason: impl Into<String>) -> IngestError {
        self.finished = true;
        IngestError::ArchiveParseTruncated {
            records: self.records,
            reason: reason.into(),
        }
    }

    /// Read one line including its terminator. `Ok(None)` on EOF.
    fn read_line(&mut self) -> IngestResult<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let n = (&mut self.reader)
            .take(MAX_HEADER_LINE as u64 + 1)
            .read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None);
        }
        if n > MAX_HEADER_LINE {
            return Err(self.truncated("header line too long"));
        }
        Ok(Some(line))
    }

    fn next_record(&mut self) -> IngestResult<Option<RawRecord>> {
        // Skip the blank separator lines left by the previous record.
        let version = loop {
            match self.read_line()? {
                None => return Ok(None),
                Some(line) if trim_eol(&line).is_empty() => continue,
                Some(line) => break line,
            }
        };

        if !trim_eol(&version).starts_with(b"WARC/") {
            return Err(self.truncated(format!(
                "expected WARC version line, found {:?}",
                String::from_utf8_lossy(truncate(trim_eol(&version), 40))
            )));
        }

        let mut headers = RecordHeaders::new();
        loop {
            let line = match self.read_line()? {
                Some(line) => line,
                None => return Err(self.truncated("end of stream inside record headers")),
            };
            let line = trim_eol(&line);
            if line.is_empty() {
                break;
            }

            let text = String::from_utf8_lossy(line);
            if line[0] == b' ' || line[0] == b'\t' {
                if !headers.extend_last(text.trim()) {
                    return Err(self.truncated("continuation line before any header"));
                }
                continue;
            }

            match text.split_once(':') {
                Some((name, value)) => headers.insert(name.trim(), value.trim()),
                None => return Err(self.truncated(format!("malformed header line {text:?}"))),
            }
        }

        let length = match headers.get("Content-Length").map(|v| v.trim().parse::<u64>()) {
            Some(Ok(length)) => length,
            Some(Err(_)) => return Err(self.truncated("invalid Content-Length")),
            None => return Err(self.truncated("missing Content-Length")),
        };

        let mut block = Vec::with_capacity(length.min(16 * 1024 * 1024) as usize);
        let read = (&mut self.reader).take(length).read_to_end(&mut block)?;
        if (read as u64) < length {
            return Err(self.truncated(format!(
                "record block cut short: {read} of {length} bytes"
            )));
        }

        self.records += 1;
        Ok(Some(RawRecord::from_parts(headers, block)))
    }
}

impl Iterator for ArchiveReader {
    type Item = IngestResult<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(IngestError::Io(e)) => Some(Err(self.truncated(e.to_string()))),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn truncate(bytes: &[u8], max: usize) -> &[u8] {
    &bytes[..bytes.len().min(max)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn record(warc_type: &str, uri: &str, block: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "WARC/1.0\r\nWARC-Type: {warc_type}\r\nWARC-Target-URI: {uri}\r\n\
             WARC-Date: 2025-06-20T10:00:00Z\r\nContent-Length: {}\r\n\r\n",
            block.len()
        )
        .into_bytes();
        out.extend_from_slice(block);
        out.extend_from_slice(b"\r\n\r\n");
        out
    }

    fn gzip_members(records: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        for r in records {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(r).unwrap();
            out.extend(encoder.finish().unwrap());
        }
        out
    }

    fn read_all(bytes: Vec<u8>) -> Vec<IngestResult<RawRecord>> {
        ArchiveReader::new(Cursor::new(bytes)).unwrap().collect()
    }

    #[test]
    fn test_plain_records_in_order() {
        let mut bytes = record("warcinfo", "", b"software: test");
        bytes.extend(record("response", "https://a.example/", b"HTTP/1.1 200 OK\r\n\r\nhi"));
        bytes.extend(record("request", "https://a.example/", b"GET / HTTP/1.1\r\n\r\n"));

        let records: Vec<RawRecord> = read_all(bytes).into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].record_type, "warcinfo");
        assert_eq!(records[1].record_type, "response");
        assert_eq!(records[1].target_uri.as_deref(), Some("https://a.example/"));
        assert_eq!(records[1].block, b"HTTP/1.1 200 OK\r\n\r\nhi");
        assert_eq!(records[2].record_type, "request");
    }

    #[test]
    fn test_gzip_members_detected_by_magic() {
        let bytes = gzip_members(&[
            record("response", "https://a.example/1", b"one"),
            record("response", "https://a.example/2", b"two"),
        ]);
        assert!(is_gzip(&bytes));

        let records: Vec<RawRecord> = read_all(bytes).into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].block, b"two");
    }

    #[test]
    fn test_empty_stream() {
        assert!(read_all(Vec::new()).is_empty());
        assert!(read_all(b"\r\n\r\n".to_vec()).is_empty());
    }

    #[test]
    fn test_block_with_embedded_blank_lines() {
        let block = b"HTTP/1.1 200 OK\r\n\r\n\r\nWARC/1.0\r\nnot a header";
        let records: Vec<RawRecord> = read_all(record("response", "https://a.example/", block))
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].block, block);
    }

    #[test]
    fn test_folded_header() {
        let bytes = b"WARC/1.1\r\nWARC-Type: response\r\nX-Note: first\r\n  second\r\n\
                      Content-Length: 0\r\n\r\n\r\n\r\n"
            .to_vec();
        let records = read_all(bytes);
        let record = records[0].as_ref().unwrap();
        assert_eq!(record.headers.get("x-note"), Some("first second"));
        assert!(record.block.is_empty());
    }

    #[test]
    fn test_truncated_block_keeps_earlier_records() {
        let mut bytes = record("response", "https://a.example/1", b"complete");
        let mut cut = record("response", "https://a.example/2", b"this block is cut");
        cut.truncate(cut.len() - 12);
        bytes.extend(cut);

        let results = read_all(bytes);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().block, b"complete");
        match &results[1] {
            Err(IngestError::ArchiveParseTruncated { records, .. }) => assert_eq!(*records, 1),
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_version_line_ends_stream() {
        let mut bytes = record("response", "https://a.example/1", b"ok");
        bytes.extend_from_slice(b"garbage here\r\n");
        bytes.extend(record("response", "https://a.example/2", b"unreached"));

        let results = read_all(bytes);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(IngestError::ArchiveParseTruncated { .. })));
    }

    #[test]
    fn test_missing_content_length() {
        let bytes = b"WARC/1.0\r\nWARC-Type: response\r\n\r\nbody".to_vec();
        let results = read_all(bytes);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(IngestError::ArchiveParseTruncated { .. })));
    }

    #[test]
    fn test_header_without_colon() {
        let bytes = b"WARC/1.0\r\nWARC-Type response\r\nContent-Length: 0\r\n\r\n".to_vec();
        let results = read_all(bytes);
        assert!(matches!(results[0], Err(IngestError::ArchiveParseTruncated { .. })));
    }

    #[test]
    fn test_corrupt_gzip_tail() {
        let mut bytes = gzip_members(&[record("response", "https://a.example/1", b"ok")]);
        bytes.extend_from_slice(&[0x1f, 0x8b, 0x08, 0x00, 0xde, 0xad]);

        let results = read_all(bytes);
        assert!(results[0].is_ok());
        assert!(results.len() <= 2);
        if let Some(last) = results.get(1) {
            assert!(matches!(last, Err(IngestError::ArchiveParseTruncated { .. })));
        }
    }

    #[test]
    fn test_open_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.warc.gz");
        std::fs::write(
            &path,
            gzip_members(&[record("response", "https://a.example/", b"x")]),
        )
        .unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().is_none());
        assert_eq!(reader.records_read(), 1);
    }
}
