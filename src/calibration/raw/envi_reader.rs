//! ENVI raw cube reader backed by a read-only memory map.

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::calibration::common::error::{CalibrationError, Result};
use crate::calibration::raw::header::EnviHeader;
use crate::calibration::raw::reader::RawCubeReader;
use crate::calibration::raw::types::RawScan;

pub struct EnviReader;

/// Header sibling of a raw file: the raw path with `.hdr` appended.
pub fn header_path(raw_path: &Path) -> PathBuf {
    let mut name = OsString::from(raw_path.as_os_str());
    name.push(".hdr");
    PathBuf::from(name)
}

impl RawCubeReader for EnviReader {
    type Cube = RawScan;

    fn open(&self, raw_path: &Path) -> Result<RawScan> {
        let hdr_path = header_path(raw_path);
        debug!("Loading {}", hdr_path.display());
        if !hdr_path.exists() {
            return Err(CalibrationError::InputNotFound(format!(
                "Missing RAW associated file: '{}'",
                hdr_path.display()
            )));
        }

        let header = EnviHeader::parse(&std::fs::read_to_string(&hdr_path)?)?;

        let file = File::open(raw_path).map_err(|e| {
            CalibrationError::InputNotFound(format!("{}: {}", raw_path.display(), e))
        })?;
        // SAFETY: the mapping is read-only and the raw file is not modified
        // while a calibration run holds it.
        let data = unsafe { Mmap::map(&file)? };

        let required = header.file_len()?;
        if data.len() < required {
            return Err(CalibrationError::MalformedHeader(format!(
                "{} holds {} bytes but the header describes {}",
                raw_path.display(),
                data.len(),
                required
            )));
        }

        debug!(
            "Mapped {} bytes: {} lines x {} samples x {} bands ({:?}, {:?})",
            data.len(),
            header.lines,
            header.samples,
            header.bands,
            header.data_type,
            header.interleave
        );

        Ok(RawScan {
            path: raw_path.to_path_buf(),
            header,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::raw::types::SpectralCube;
    use std::fs;
    use tempfile::tempdir;

    fn write_cube(dir: &Path, interleave: &str, byte_order: u8, values: &[u16]) -> PathBuf {
        let raw_path = dir.join("scan_raw");
        let bytes: Vec<u8> = values
            .iter()
            .flat_map(|v| if byte_order == 0 { v.to_le_bytes() } else { v.to_be_bytes() })
            .collect();
        fs::write(&raw_path, bytes).unwrap();
        fs::write(
            header_path(&raw_path),
            format!(
                "ENVI\nsamples = 2\nlines = 2\nbands = 3\nheader offset = 0\ndata type = 12\ninterleave = {}\nbyte order = {}\n",
                interleave, byte_order
            ),
        )
        .unwrap();
        raw_path
    }

    #[test]
    fn test_header_path_appends_suffix() {
        assert_eq!(
            header_path(Path::new("/data/scan_raw")),
            PathBuf::from("/data/scan_raw.hdr")
        );
    }

    #[test]
    fn test_open_bil_cube() {
        let dir = tempdir().unwrap();
        // bil: for each line, band-major rows of samples
        let values: Vec<u16> = (0..12).collect();
        let raw_path = write_cube(dir.path(), "bil", 0, &values);

        let scan = EnviReader.open(&raw_path).unwrap();
        assert_eq!(scan.shape(), (2, 2, 3));
        // line 1, sample 0, band 2 -> (1*3 + 2)*2 + 0 = 10
        assert_eq!(scan.dn(1, 0, 2), 10.0);
        assert_eq!(scan.dn(0, 1, 0), 1.0);
    }

    #[test]
    fn test_open_big_endian_bip_cube() {
        let dir = tempdir().unwrap();
        let values: Vec<u16> = (100..112).collect();
        let raw_path = write_cube(dir.path(), "bip", 1, &values);

        let scan = EnviReader.open(&raw_path).unwrap();
        // line 0, sample 1, band 1 -> (0*2 + 1)*3 + 1 = 4
        assert_eq!(scan.dn(0, 1, 1), 104.0);
    }

    #[test]
    fn test_missing_header() {
        let dir = tempdir().unwrap();
        let raw_path = dir.path().join("lonely_raw");
        fs::write(&raw_path, [0u8; 4]).unwrap();

        let result = EnviReader.open(&raw_path);
        assert!(matches!(result, Err(CalibrationError::InputNotFound(_))));
    }

    #[test]
    fn test_truncated_raw_file() {
        let dir = tempdir().unwrap();
        let raw_path = write_cube(dir.path(), "bsq", 0, &[1, 2, 3]);

        let result = EnviReader.open(&raw_path);
        assert!(matches!(result, Err(CalibrationError::MalformedHeader(_))));
    }
}
