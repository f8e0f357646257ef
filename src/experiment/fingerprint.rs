//! Fingerprint Hasher - short stable tags for configuration subsets
//!
//! A fingerprint is the first eight decimal digits of the SHA-256 digest of a
//! canonical JSON rendering. The rendering reproduces the text that the
//! established experiment tooling hashes (`", "` / `": "` separators, ASCII-only
//! escaping, shortest round-trip floats), so fingerprints computed here match
//! experiment folders that already exist on disk.

use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Number of characters kept from the decimal digest.
pub const FINGERPRINT_LEN: usize = 8;

/// Hash a JSON value into an 8-character decimal tag.
///
/// Mapping keys are sorted at every level before hashing, so reordering a
/// configuration never changes its fingerprint.
///
/// Eight decimal characters is a human-scannable tag, not a security
/// primitive: distinct values collide with probability around 1e-8 per pair.
/// Callers treat a match as "same experiment", accepting that risk.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
///
/// # Example
///
/// ```rust
/// use runfolio::experiment::hash8;
///
/// let a = hash8(&serde_json::json!({"lr": 0.1, "epochs": 3})).unwrap();
/// let b = hash8(&serde_json::json!({"epochs": 3, "lr": 0.1})).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 8);
/// ```
pub fn hash8(value: &Value) -> Result<String> {
    let canonical = canonical_json(value)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(decimal_string(&digest)
        .chars()
        .take(FINGERPRINT_LEN)
        .collect())
}

/// Render `value` as single-line canonical JSON (sorted keys).
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn canonical_json(value: &Value) -> Result<String> {
    render(value, CanonicalFormatter::compact())
}

/// Render `value` as canonical JSON indented by two spaces, the layout of the
/// parameters file.
pub(crate) fn canonical_json_pretty(value: &Value) -> Result<String> {
    render(value, CanonicalFormatter::pretty(b"  "))
}

fn render(value: &Value, formatter: CanonicalFormatter<'_>) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    sort_keys(value).serialize(&mut serializer)?;
    String::from_utf8(buf)
        .map_err(|e| Error::InvalidInput(format!("canonical JSON is not UTF-8: {e}")))
}

/// Rebuild `value` with every object's keys in ascending code-point order.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, item)| (key.clone(), sort_keys(item)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Big-endian bytes to their base-10 representation.
fn decimal_string(bytes: &[u8]) -> String {
    const CHUNK: u64 = 1_000_000_000;

    let mut number: Vec<u64> = bytes.iter().map(|&b| u64::from(b)).collect();
    let mut chunks = Vec::new();

    while number.iter().any(|&digit| digit != 0) {
        let mut remainder = 0u64;
        for digit in &mut number {
            let acc = (remainder << 8) | *digit;
            *digit = acc / CHUNK;
            remainder = acc % CHUNK;
        }
        chunks.push(remainder);
    }

    let Some((most_significant, rest)) = chunks.split_last() else {
        return "0".to_string();
    };

    let mut out = most_significant.to_string();
    for chunk in rest.iter().rev() {
        out.push_str(&format!("{chunk:09}"));
    }
    out
}

/// Shortest round-trip float text: fixed notation for decimal exponents in
/// `-4..16`, otherwise `d.ddde±XX`.
fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let scientific = format!("{value:e}");
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let (sign, mantissa) = mantissa
        .strip_prefix('-')
        .map_or(("", mantissa), |m| ("-", m));

    if !(-4..16).contains(&exponent) {
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        return format!("{sign}{mantissa}e{exp_sign}{:02}", exponent.unsigned_abs());
    }

    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let point = exponent + 1;
    let body = match usize::try_from(point) {
        Err(_) | Ok(0) => {
            let zeros = usize::try_from(-point).unwrap_or(0);
            format!("0.{}{digits}", "0".repeat(zeros))
        }
        Ok(point) if point >= digits.len() => {
            format!("{digits}{}.0", "0".repeat(point - digits.len()))
        }
        Ok(point) => {
            let (int, frac) = digits.split_at(point);
            format!("{int}.{frac}")
        }
    };
    format!("{sign}{body}")
}

/// `serde_json` formatter producing the canonical text.
///
/// Compact mode separates items with `", "`; pretty mode indents nested
/// values and ends lines with `","`. Both use `": "` after keys.
struct CanonicalFormatter<'a> {
    indent: Option<&'a [u8]>,
    current_indent: usize,
    has_value: bool,
}

impl<'a> CanonicalFormatter<'a> {
    const fn compact() -> Self {
        Self {
            indent: None,
            current_indent: 0,
            has_value: false,
        }
    }

    const fn pretty(indent: &'a [u8]) -> Self {
        Self {
            indent: Some(indent),
            current_indent: 0,
            has_value: false,
        }
    }

    fn begin_value<W: ?Sized + io::Write>(&self, writer: &mut W, first: bool) -> io::Result<()> {
        match self.indent {
            Some(indent) => {
                let sep: &[u8] = if first { b"\n" } else { b",\n" };
                writer.write_all(sep)?;
                write_indent(writer, self.current_indent, indent)
            }
            None if first => Ok(()),
            None => writer.write_all(b", "),
        }
    }

    fn end_container<W: ?Sized + io::Write>(&mut self, writer: &mut W, close: &[u8]) -> io::Result<()> {
        self.current_indent -= 1;
        if self.has_value {
            if let Some(indent) = self.indent {
                writer.write_all(b"\n")?;
                write_indent(writer, self.current_indent, indent)?;
            }
        }
        writer.write_all(close)
    }
}

fn write_indent<W: ?Sized + io::Write>(writer: &mut W, depth: usize, indent: &[u8]) -> io::Result<()> {
    for _ in 0..depth {
        writer.write_all(indent)?;
    }
    Ok(())
}

impl Formatter for CanonicalFormatter<'_> {
    fn write_f32<W: ?Sized + io::Write>(&mut self, writer: &mut W, value: f32) -> io::Result<()> {
        writer.write_all(float_repr(f64::from(value)).as_bytes())
    }

    fn write_f64<W: ?Sized + io::Write>(&mut self, writer: &mut W, value: f64) -> io::Result<()> {
        writer.write_all(float_repr(value).as_bytes())
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if (' '..='~').contains(&ch) {
                let mut byte = [0u8; 4];
                writer.write_all(ch.encode_utf8(&mut byte).as_bytes())?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.current_indent += 1;
        self.has_value = false;
        writer.write_all(b"[")
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.end_container(writer, b"]")
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.begin_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        self.has_value = true;
        Ok(())
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.current_indent += 1;
        self.has_value = false;
        writer.write_all(b"{")
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.end_container(writer, b"}")
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.begin_value(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        self.has_value = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash8_known_vectors() {
        assert_eq!(hash8(&json!(32)).unwrap(), "10249940");
        assert_eq!(hash8(&json!("adam")).unwrap(), "30139432");
        assert_eq!(hash8(&json!([])).unwrap(), "35880782");
        assert_eq!(hash8(&json!({})).unwrap(), "30791614");
    }

    #[test]
    fn test_hash8_nested_config() {
        let model = json!({"layers": [64, 32], "dropout": 0.1, "name": "mlp"});
        assert_eq!(hash8(&model).unwrap(), "23649862");

        let training = json!({"lr": 1e-05, "epochs": 10, "optimizer": "adam"});
        assert_eq!(hash8(&training).unwrap(), "56245424");
    }

    #[test]
    fn test_hash8_escaping_and_float_edges() {
        let value = json!({"café": true, "big": 1e16, "neg": -0.0, "n": null});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"big": 1e+16, "caf\u00e9": true, "n": null, "neg": -0.0}"#
        );
        assert_eq!(hash8(&value).unwrap(), "66139718");
    }

    #[test]
    fn test_large_float_parses_back_exactly() {
        let value = json!(1.147_438_081_942_849_7e19);
        let text = canonical_json(&value).unwrap();
        assert_eq!(text, "1.1474380819428497e+19");
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), value);
    }

    #[test]
    fn test_canonical_json_layout() {
        let value = json!({"b": [1, 2], "a": {"y": 1.5, "x": "s"}});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"a": {"x": "s", "y": 1.5}, "b": [1, 2]}"#
        );
    }

    #[test]
    fn test_canonical_json_pretty_layout() {
        let value = json!({"debug": false, "model": {"units": 8}, "tags": [], "ids": [1, 2]});
        let expected = "{\n  \"debug\": false,\n  \"ids\": [\n    1,\n    2\n  ],\n  \"model\": {\n    \"units\": 8\n  },\n  \"tags\": []\n}";
        assert_eq!(canonical_json_pretty(&value).unwrap(), expected);
    }

    #[test]
    fn test_float_repr() {
        assert_eq!(float_repr(0.0), "0.0");
        assert_eq!(float_repr(-0.0), "-0.0");
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(123.45), "123.45");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(0.00001), "1e-05");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
        assert_eq!(float_repr(1e15), "1000000000000000.0");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(-2.5e100), "-2.5e+100");
    }

    #[test]
    fn test_decimal_string() {
        assert_eq!(decimal_string(&[]), "0");
        assert_eq!(decimal_string(&[0, 0]), "0");
        assert_eq!(decimal_string(&[0xff]), "255");
        assert_eq!(decimal_string(&[0x01, 0x00]), "256");
        // 2^64
        assert_eq!(
            decimal_string(&[1, 0, 0, 0, 0, 0, 0, 0, 0]),
            "18446744073709551616"
        );
    }

    #[test]
    fn test_control_and_astral_escapes() {
        let value = json!("a\nb\u{7f}\u{1F600}");
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#""a\nb\u007f\ud83d\ude00""#
        );
    }
}
