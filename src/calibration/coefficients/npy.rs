//! Minimal reader for NumPy `.npy` arrays
//!
//! Calibration coefficients are shipped as small NumPy arrays. Any numeric
//! dtype is widened to `f64` and the array is flattened in C order.

use std::path::Path;

use crate::calibration::common::error::{CalibrationError, Result};

const MAGIC: &[u8] = b"\x93NUMPY";

#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Float,
    Signed,
    Unsigned,
}

fn invalid(msg: impl Into<String>) -> CalibrationError {
    CalibrationError::InvalidReferenceData(msg.into())
}

pub fn read_npy<P: AsRef<Path>>(path: P) -> Result<NpyArray> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| {
        CalibrationError::InputNotFound(format!("{}: {}", path.display(), e))
    })?;
    parse_npy(&bytes).map_err(|e| match e {
        CalibrationError::InvalidReferenceData(msg) => {
            invalid(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

pub fn parse_npy(bytes: &[u8]) -> Result<NpyArray> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(invalid("not a NumPy array file"));
    }

    let (header_len, data_start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        v => return Err(invalid(format!("unsupported format version {}", v))),
    };
    let data_offset = data_start + header_len;
    let header = bytes
        .get(data_start..data_offset)
        .ok_or_else(|| invalid("truncated header"))?;
    let header = String::from_utf8_lossy(header);

    let descr = dict_value(&header, "descr")?;
    let descr = descr.trim_matches(|c| c == '\'' || c == '"');
    let fortran_order = dict_value(&header, "fortran_order")?.starts_with("True");
    let shape = parse_shape(&dict_value(&header, "shape")?)?;

    if fortran_order && shape.iter().filter(|&&d| d > 1).count() > 1 {
        return Err(invalid("Fortran-ordered multi-dimensional arrays are not supported"));
    }

    let (big_endian, kind, size) = parse_descr(descr)?;
    let count: usize = shape.iter().product();
    let payload = &bytes[data_offset..];
    if payload.len() < count * size {
        return Err(invalid(format!(
            "expected {} bytes of data, found {}",
            count * size,
            payload.len()
        )));
    }

    let data = payload[..count * size]
        .chunks_exact(size)
        .map(|chunk| decode(chunk, kind, big_endian))
        .collect::<Result<Vec<f64>>>()?;

    Ok(NpyArray { shape, data })
}

/// Raw text following `'key':` in the header dictionary, up to the next
/// top-level comma.
fn dict_value(header: &str, key: &str) -> Result<String> {
    let needle = format!("'{}':", key);
    let start = header
        .find(&needle)
        .map(|i| i + needle.len())
        .ok_or_else(|| invalid(format!("header has no '{}'", key)))?;
    let rest = header[start..].trim_start();

    let mut depth = 0usize;
    let mut end = rest.len();
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' | '}' if depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    Ok(rest[..end].trim().to_string())
}

fn parse_shape(text: &str) -> Result<Vec<usize>> {
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| invalid(format!("malformed shape '{}'", text)))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|e| invalid(format!("malformed shape '{}': {}", text, e)))
        })
        .collect()
}

fn parse_descr(descr: &str) -> Result<(bool, Kind, usize)> {
    let mut chars = descr.chars();
    let (big_endian, rest) = match chars.next() {
        Some('<') | Some('=') | Some('|') => (false, chars.as_str()),
        Some('>') => (true, chars.as_str()),
        _ => (false, descr),
    };
    let mut rest = rest.chars();
    let kind = rest.next();
    let size: usize = rest
        .as_str()
        .parse()
        .map_err(|_| invalid(format!("unsupported dtype '{}'", descr)))?;
    let kind = match (kind, size) {
        (Some('f'), 4 | 8) => Kind::Float,
        (Some('i'), 1 | 2 | 4 | 8) => Kind::Signed,
        (Some('u'), 1 | 2 | 4 | 8) => Kind::Unsigned,
        _ => return Err(invalid(format!("unsupported dtype '{}'", descr))),
    };
    Ok((big_endian, kind, size))
}

fn decode(chunk: &[u8], kind: Kind, big_endian: bool) -> Result<f64> {
    let mut buf = [0u8; 8];
    let n = chunk.len();
    if big_endian {
        buf[8 - n..].copy_from_slice(chunk);
    } else {
        buf[..n].copy_from_slice(chunk);
    }
    let value = match (kind, n) {
        (Kind::Float, 4) => {
            if big_endian {
                f32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as f64
            } else {
                f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64
            }
        }
        (Kind::Float, 8) => {
            if big_endian {
                f64::from_be_bytes(buf)
            } else {
                f64::from_le_bytes(buf)
            }
        }
        (Kind::Unsigned, _) => {
            (if big_endian { u64::from_be_bytes(buf) } else { u64::from_le_bytes(buf) }) as f64
        }
        (Kind::Signed, _) => {
            let raw = if big_endian { u64::from_be_bytes(buf) } else { u64::from_le_bytes(buf) };
            // Sign-extend from the stored width
            let shift = 64 - 8 * n as u32;
            ((raw << shift) as i64 >> shift) as f64
        }
        _ => return Err(invalid("unsupported element width")),
    };
    Ok(value)
}
