//! Best-effort text recovery from raw PDF bytes
//!
//! No structural validation is attempted. Content streams are located by
//! their `stream`/`endstream` markers, optionally inflated, and scanned for
//! `Tj`/`TJ` show-text operators. When no operator text exists anywhere the
//! extractor falls back to runs of printable ASCII. It never fails: garbage
//! in yields an empty string.

use flate2::read::ZlibDecoder;
use once_cell::sync::Lazy;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use std::io::Read;

/// Upper bound on inflated bytes per stream
pub const MAX_INFLATED_BYTES: u64 = 8 * 1024 * 1024;

static STREAM: Lazy<BytesRegex> =
    Lazy::new(|| BytesRegex::new(r"(?s-u)stream\r?\n(.*?)\r?\nendstream").expect("valid regex"));
static SHOW_TEXT: Lazy<BytesRegex> =
    Lazy::new(|| BytesRegex::new(r"(?s-u)\((.*?)\)\s*Tj").expect("valid regex"));
static SHOW_TEXT_ARRAY: Lazy<BytesRegex> =
    Lazy::new(|| BytesRegex::new(r"(?s-u)\[(.*?)\]\s*TJ").expect("valid regex"));
static ARRAY_STRING: Lazy<BytesRegex> =
    Lazy::new(|| BytesRegex::new(r"(?s-u)\((.*?)\)").expect("valid regex"));
static PRINTABLE_RUN: Lazy<BytesRegex> = Lazy::new(|| {
    BytesRegex::new(r"(?-u)[A-Za-z0-9][A-Za-z0-9 ,.;:()/_+\-\n]{20,}").expect("valid regex")
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static SPACED_LETTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[A-Za-z]\s+){2,}[A-Za-z]\b").expect("valid regex"));

/// Extract text from PDF bytes
pub fn extract_pdf_text(raw: &[u8]) -> String {
    let mut pieces: Vec<String> = Vec::new();

    for stream in STREAM.captures_iter(raw) {
        let Some(payload) = stream.get(1).map(|m| m.as_bytes()) else {
            continue;
        };
        pieces.extend(show_text_operators(payload));
        if let Some(inflated) = inflate(payload) {
            pieces.extend(show_text_operators(&inflated));
        }
    }

    if pieces.is_empty() {
        return extract_printable_text(raw);
    }
    normalize_extracted_text(&pieces.join(" "))
}

/// Printable ASCII runs of 21+ characters, normalized
pub fn extract_printable_text(raw: &[u8]) -> String {
    let runs: Vec<String> = PRINTABLE_RUN
        .find_iter(raw)
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
        .collect();
    normalize_extracted_text(&runs.join(" "))
}

/// Collapse whitespace and rejoin letters spaced out by the text layout
/// ("P y t h o n" becomes "Python")
pub fn normalize_extracted_text(text: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text, " ");
    let joined = SPACED_LETTERS.replace_all(collapsed.trim(), |caps: &regex::Captures| {
        caps[0].chars().filter(|c| !c.is_whitespace()).collect::<String>()
    });
    WHITESPACE.replace_all(&joined, " ").trim().to_string()
}

/// Inflate a zlib payload, keeping whatever was decoded before an error
fn inflate(payload: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let _ = ZlibDecoder::new(payload)
        .take(MAX_INFLATED_BYTES)
        .read_to_end(&mut out);
    (!out.is_empty()).then_some(out)
}

fn show_text_operators(data: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    for caps in SHOW_TEXT.captures_iter(data) {
        out.push(decode_pdf_string(&caps[1]));
    }
    for caps in SHOW_TEXT_ARRAY.captures_iter(data) {
        for inner in ARRAY_STRING.captures_iter(&caps[1]) {
            out.push(decode_pdf_string(&inner[1]));
        }
    }
    out.retain(|t| !t.trim().is_empty());
    out
}

/// Decode a literal string body: backslash escapes, octal `\ddd`, Latin-1 bytes
fn decode_pdf_string(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        if b != b'\\' {
            out.push(b as char);
            i += 1;
            continue;
        }

        let Some(&next) = data.get(i + 1) else {
            break;
        };
        i += 2;
        match next {
            b'n' | b'r' | b't' | b'b' | b'f' => out.push(' '),
            b'(' | b')' | b'\\' => out.push(next as char),
            b'0'..=b'7' => {
                let mut value = u32::from(next - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match data.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push(char::from((value & 0xff) as u8));
            }
            // line continuation
            b'\n' => {}
            b'\r' => {
                if data.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            other => out.push(other as char),
        }
    }

    WHITESPACE.replace_all(&out, " ").trim().to_string()
}
