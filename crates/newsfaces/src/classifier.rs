//! HTML eligibility of archive records.

use std::io::Read;

use flate2::read::{MultiGzDecoder, ZlibDecoder};

use crate::types::{RawRecord, RecordHeaders};

/// An HTTP response message carried in a record block.
#[derive(Debug, Clone)]
pub struct HttpPayload {
    pub status: u16,
    pub headers: RecordHeaders,
    /// Entity body with transfer and content encodings removed where possible.
    pub body: Vec<u8>,
}

impl HttpPayload {
    /// Parse the HTTP message in a response record block.
    ///
    /// Returns `None` when the block has no recognisable status line.
    pub fn parse(block: &[u8]) -> Option<Self> {
        let (head, body) = split_head(block)?;
        let head = String::from_utf8_lossy(head);
        let mut lines = head.lines();

        let status_line = lines.next()?;
        if !status_line.starts_with("HTTP/") {
            return None;
        }
        let status = status_line.split_whitespace().nth(1)?.parse::<u16>().ok()?;

        let mut headers = RecordHeaders::new();
        for line in lines {
            if line.starts_with(' ') || line.starts_with('\t') {
                headers.extend_last(line.trim());
            } else if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim(), value.trim());
            }
        }

        let body = decode_body(&headers, body);
        Some(Self {
            status,
            headers,
            body,
        })
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }
}

/// An HTML response record ready for extraction.
#[derive(Debug, Clone)]
pub struct HtmlRecord {
    pub record_id: Option<String>,
    pub target_uri: Option<String>,
    pub date: Option<String>,
    pub body: Vec<u8>,
}

/// Why a record was not routed onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    NotResponse,
    NoHttpMessage,
    NotHtml,
}

#[derive(Debug, Clone)]
pub enum Classification {
    Html(HtmlRecord),
    Discarded(DiscardReason),
}

/// Route a record: `response` records whose HTTP content type mentions
/// `text/html` become [`HtmlRecord`]s, everything else is discarded.
pub fn classify(record: &RawRecord) -> Classification {
    if record.record_type != "response" {
        return Classification::Discarded(DiscardReason::NotResponse);
    }

    let payload = match HttpPayload::parse(&record.block) {
        Some(payload) => payload,
        None => return Classification::Discarded(DiscardReason::NoHttpMessage),
    };

    let is_html = payload
        .content_type()
        .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false);
    if !is_html {
        return Classification::Discarded(DiscardReason::NotHtml);
    }

    Classification::Html(HtmlRecord {
        record_id: record.record_id.clone(),
        target_uri: record.target_uri.clone(),
        date: record.date.clone(),
        body: payload.body,
    })
}

/// Split at the first blank line, whichever line ending the head uses.
fn split_head(block: &[u8]) -> Option<(&[u8], &[u8])> {
    let crlf = find(block, b"\r\n\r\n").map(|pos| (pos, 4));
    let lf = find(block, b"\n\n").map(|pos| (pos, 2));

    let (pos, len) = match (crlf, lf) {
        (Some(c), Some(l)) => std::cmp::min_by_key(c, l, |&(pos, _)| pos),
        (Some(found), None) | (None, Some(found)) => found,
        (None, None) => return None,
    };
    Some((&block[..pos], &block[pos + len..]))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn decode_body(headers: &RecordHeaders, body: &[u8]) -> Vec<u8> {
    let chunked = headers
        .get("Transfer-Encoding")
        .map(|v| v.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);

    let body = if chunked {
        dechunk(body).unwrap_or_else(|| body.to_vec())
    } else {
        body.to_vec()
    };

    let encoding = headers
        .get("Content-Encoding")
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let mut decoded = Vec::new();
    let result = match encoding.as_str() {
        "gzip" | "x-gzip" => MultiGzDecoder::new(&body[..]).read_to_end(&mut decoded),
        "deflate" => ZlibDecoder::new(&body[..]).read_to_end(&mut decoded),
        _ => return body,
    };

    match result {
        Ok(_) => decoded,
        Err(e) => {
            tracing::debug!("Keeping {encoding} body undecoded: {e}");
            body
        }
    }
}

/// Remove HTTP/1.1 chunked framing. `None` if the framing is broken.
fn dechunk(mut data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    loop {
        let eol = find(data, b"\r\n")?;
        let size_field = std::str::from_utf8(&data[..eol]).ok()?;
        let size_hex = size_field.split(';').next()?.trim();
        let size = usize::from_str_radix(size_hex, 16).ok()?;
        data = &data[eol + 2..];

        if size == 0 {
            return Some(out);
        }
        if data.len() < size {
            return None;
        }
        out.extend_from_slice(&data[..size]);
        data = data[size..].strip_prefix(b"\r\n").unwrap_or(&data[size..]);
    }
}
