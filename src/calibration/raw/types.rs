//! Raw cube types

use std::path::PathBuf;

use memmap2::Mmap;
use ndarray::Array3;

use crate::calibration::raw::header::{EnviDataType, EnviHeader};

/// Read access to a spectral cube indexed as (row, column, band).
pub trait SpectralCube {
    /// Returns `(rows, columns, bands)`
    fn shape(&self) -> (usize, usize, usize);

    /// Digital number at (`row`, `col`, `band`)
    fn dn(&self, row: usize, col: usize, band: usize) -> f64;
}

/// Memory-mapped ENVI raw cube
pub struct RawScan {
    pub path: PathBuf,
    pub header: EnviHeader,
    pub(crate) data: Mmap,
}

impl std::fmt::Debug for RawScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawScan")
            .field("path", &self.path)
            .field("lines", &self.header.lines)
            .field("samples", &self.header.samples)
            .field("bands", &self.header.bands)
            .finish()
    }
}

macro_rules! decode {
    ($ty:ty, $bytes:expr, $big_endian:expr) => {{
        let mut buf = [0u8; std::mem::size_of::<$ty>()];
        buf.copy_from_slice($bytes);
        if $big_endian {
            <$ty>::from_be_bytes(buf) as f64
        } else {
            <$ty>::from_le_bytes(buf) as f64
        }
    }};
}

impl SpectralCube for RawScan {
    fn shape(&self) -> (usize, usize, usize) {
        (self.header.lines, self.header.samples, self.header.bands)
    }

    fn dn(&self, row: usize, col: usize, band: usize) -> f64 {
        let header = &self.header;
        let offset = header.byte_offset(row, col, band);
        let bytes = &self.data[offset..offset + header.data_type.size_in_bytes()];
        let be = header.big_endian;
        match header.data_type {
            EnviDataType::U8 => bytes[0] as f64,
            EnviDataType::I16 => decode!(i16, bytes, be),
            EnviDataType::U16 => decode!(u16, bytes, be),
            EnviDataType::I32 => decode!(i32, bytes, be),
            EnviDataType::U32 => decode!(u32, bytes, be),
            EnviDataType::F32 => decode!(f32, bytes, be),
            EnviDataType::F64 => decode!(f64, bytes, be),
            EnviDataType::I64 => decode!(i64, bytes, be),
            EnviDataType::U64 => decode!(u64, bytes, be),
        }
    }
}

impl SpectralCube for Array3<f32> {
    fn shape(&self) -> (usize, usize, usize) {
        self.dim()
    }

    fn dn(&self, row: usize, col: usize, band: usize) -> f64 {
        self[[row, col, band]] as f64
    }
}

/// Copies the cube into a (band, row, column) array, the layout of the
/// reflectance variable.
pub fn bands_first<C: SpectralCube + ?Sized>(cube: &C) -> Array3<f32> {
    let (rows, cols, bands) = cube.shape();
    Array3::from_shape_fn((bands, rows, cols), |(b, r, c)| cube.dn(r, c, b) as f32)
}
