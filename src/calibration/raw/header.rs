//! ENVI header parsing
//!
//! Only the keys needed to locate samples in the binary file are interpreted;
//! every other key is kept verbatim in `fields`.

use std::collections::HashMap;

use crate::calibration::common::error::{CalibrationError, Result};

/// Sample encodings defined by the ENVI `data type` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnviDataType {
    U8,
    I16,
    I32,
    F32,
    F64,
    U16,
    U32,
    I64,
    U64,
}

impl EnviDataType {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(EnviDataType::U8),
            2 => Ok(EnviDataType::I16),
            3 => Ok(EnviDataType::I32),
            4 => Ok(EnviDataType::F32),
            5 => Ok(EnviDataType::F64),
            12 => Ok(EnviDataType::U16),
            13 => Ok(EnviDataType::U32),
            14 => Ok(EnviDataType::I64),
            15 => Ok(EnviDataType::U64),
            _ => Err(CalibrationError::MalformedHeader(format!(
                "unsupported data type {}",
                code
            ))),
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        match self {
            EnviDataType::U8 => 1,
            EnviDataType::I16 | EnviDataType::U16 => 2,
            EnviDataType::I32 | EnviDataType::U32 | EnviDataType::F32 => 4,
            EnviDataType::F64 | EnviDataType::I64 | EnviDataType::U64 => 8,
        }
    }
}

/// Sample layout of the binary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
    /// Band sequential
    Bsq,
    /// Band interleaved by line
    Bil,
    /// Band interleaved by pixel
    Bip,
}

#[derive(Debug, Clone)]
pub struct EnviHeader {
    pub samples: usize,
    pub lines: usize,
    pub bands: usize,
    pub header_offset: usize,
    pub data_type: EnviDataType,
    pub interleave: Interleave,
    pub big_endian: bool,
    pub fields: HashMap<String, String>,
}

impl EnviHeader {
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        match lines.next() {
            Some(magic) if magic.trim() == "ENVI" => {}
            _ => {
                return Err(CalibrationError::MalformedHeader(
                    "missing ENVI signature".to_string(),
                ));
            }
        }

        let mut fields = HashMap::new();
        while let Some(line) = lines.next() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let mut value = value.trim().to_string();

            // Braced values may continue over several lines
            if value.starts_with('{') {
                while !value.contains('}') {
                    let Some(next) = lines.next() else {
                        return Err(CalibrationError::MalformedHeader(format!(
                            "unterminated value for '{}'",
                            key
                        )));
                    };
                    value.push(' ');
                    value.push_str(next.trim());
                }
            }
            fields.insert(key, value);
        }

        let samples = required_usize(&fields, "samples")?;
        let lines = required_usize(&fields, "lines")?;
        let bands = required_usize(&fields, "bands")?;
        let header_offset = optional_usize(&fields, "header offset")?.unwrap_or(0);
        let data_type = EnviDataType::from_code(required_usize(&fields, "data type")? as u32)?;

        let interleave = match fields.get("interleave").map(|v| v.to_ascii_lowercase()) {
            None => Interleave::Bsq,
            Some(v) if v == "bsq" => Interleave::Bsq,
            Some(v) if v == "bil" => Interleave::Bil,
            Some(v) if v == "bip" => Interleave::Bip,
            Some(v) => {
                return Err(CalibrationError::MalformedHeader(format!(
                    "unknown interleave '{}'",
                    v
                )));
            }
        };

        let big_endian = match optional_usize(&fields, "byte order")? {
            None | Some(0) => false,
            Some(1) => true,
            Some(other) => {
                return Err(CalibrationError::MalformedHeader(format!(
                    "invalid byte order {}",
                    other
                )));
            }
        };

        let header = Self {
            samples,
            lines,
            bands,
            header_offset,
            data_type,
            interleave,
            big_endian,
            fields,
        };
        header.file_len()?;
        Ok(header)
    }

    /// Size of the sample data in bytes, excluding the header offset.
    pub fn data_len(&self) -> Result<usize> {
        self.samples
            .checked_mul(self.lines)
            .and_then(|n| n.checked_mul(self.bands))
            .and_then(|n| n.checked_mul(self.data_type.size_in_bytes()))
            .ok_or_else(|| self.too_large())
    }

    /// Bytes the raw file must hold: header offset plus sample data.
    pub fn file_len(&self) -> Result<usize> {
        self.data_len()?
            .checked_add(self.header_offset)
            .ok_or_else(|| self.too_large())
    }

    fn too_large(&self) -> CalibrationError {
        CalibrationError::MalformedHeader(format!(
            "{} samples x {} lines x {} bands at offset {} overflows the address space",
            self.samples, self.lines, self.bands, self.header_offset
        ))
    }

    /// Byte offset of the sample at (`line`, `sample`, `band`). Indices must lie
    /// inside the cube; `parse` has already checked that its extent fits.
    pub fn byte_offset(&self, line: usize, sample: usize, band: usize) -> usize {
        let index = match self.interleave {
            Interleave::Bsq => (band * self.lines + line) * self.samples + sample,
            Interleave::Bil => (line * self.bands + band) * self.samples + sample,
            Interleave::Bip => (line * self.samples + sample) * self.bands + band,
        };
        self.header_offset + index * self.data_type.size_in_bytes()
    }
}

fn optional_usize(fields: &HashMap<String, String>, key: &str) -> Result<Option<usize>> {
    fields
        .get(key)
        .map(|v| {
            v.parse::<usize>().map_err(|e| {
                CalibrationError::MalformedHeader(format!("invalid '{}' value '{}': {}", key, v, e))
            })
        })
        .transpose()
}

fn required_usize(fields: &HashMap<String, String>, key: &str) -> Result<usize> {
    optional_usize(fields, key)?
        .ok_or_else(|| CalibrationError::MalformedHeader(format!("missing '{}'", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "ENVI
description = {
  hyperspectral scan,
  gantry run 4}
samples = 4
lines = 3
bands = 2
header offset = 0
file type = ENVI Standard
data type = 12
interleave = bil
byte order = 0
wavelength = {
 400.1, 401.7}
";

    #[test]
    fn test_parse_header() {
        let header = EnviHeader::parse(HEADER).unwrap();
        assert_eq!(header.samples, 4);
        assert_eq!(header.lines, 3);
        assert_eq!(header.bands, 2);
        assert_eq!(header.data_type, EnviDataType::U16);
        assert_eq!(header.interleave, Interleave::Bil);
        assert!(!header.big_endian);
        assert_eq!(header.data_len().unwrap(), 4 * 3 * 2 * 2);
        assert_eq!(header.file_len().unwrap(), 4 * 3 * 2 * 2);
        assert!(header.fields["wavelength"].contains("401.7"));
    }

    #[test]
    fn test_byte_offsets() {
        let mut header = EnviHeader::parse(HEADER).unwrap();
        // bil: line 1, band 1, sample 2 -> (1*2 + 1)*4 + 2 = 14
        assert_eq!(header.byte_offset(1, 2, 1), 28);
        header.interleave = Interleave::Bip;
        // bip: (1*4 + 2)*2 + 1 = 13
        assert_eq!(header.byte_offset(1, 2, 1), 26);
        header.interleave = Interleave::Bsq;
        // bsq: (1*3 + 1)*4 + 2 = 18
        assert_eq!(header.byte_offset(1, 2, 1), 36);
    }

    #[test]
    fn test_oversized_extent_is_rejected() {
        let huge = "ENVI\nsamples = 4611686018427387904\nlines = 4\nbands = 1\ndata type = 12\n";
        assert!(matches!(
            EnviHeader::parse(huge),
            Err(CalibrationError::MalformedHeader(_))
        ));

        let offset = format!(
            "ENVI\nsamples = 2\nlines = 2\nbands = 1\nheader offset = {}\ndata type = 1\n",
            usize::MAX
        );
        assert!(matches!(
            EnviHeader::parse(&offset),
            Err(CalibrationError::MalformedHeader(_))
        ));

        let mut header = EnviHeader::parse(HEADER).unwrap();
        header.lines = usize::MAX;
        assert!(matches!(header.data_len(), Err(CalibrationError::MalformedHeader(_))));
    }

    #[test]
    fn test_missing_signature() {
        let result = EnviHeader::parse("samples = 1\n");
        assert!(matches!(result, Err(CalibrationError::MalformedHeader(_))));
    }

    #[test]
    fn test_missing_required_key() {
        let result = EnviHeader::parse("ENVI\nsamples = 1\nlines = 1\ndata type = 4\n");
        assert!(matches!(result, Err(CalibrationError::MalformedHeader(_))));
    }

    #[test]
    fn test_unsupported_data_type() {
        let result = EnviHeader::parse("ENVI\nsamples = 1\nlines = 1\nbands = 1\ndata type = 6\n");
        assert!(matches!(result, Err(CalibrationError::MalformedHeader(_))));
    }
}
