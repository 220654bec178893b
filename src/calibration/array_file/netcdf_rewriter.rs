use std::path::{Path, PathBuf};

use ndarray::Array3;
use netcdf::types::{FloatType, IntType, NcTypeDescriptor, NcVariableType};
use netcdf::{FileMut, Variable, VariableMut};
use tracing::{debug, info, warn};

use crate::calibration::array_file::types::{
    EXCLUDED_VARIABLE, MissingReflectancePolicy, REFLECTANCE_DIMENSIONS, REFLECTANCE_VARIABLE,
};
use crate::calibration::array_file::writer::ArrayFileWriter;
use crate::calibration::common::error::{CalibrationError, Result};
use crate::calibration::profile::CameraGeneration;

const FILL_VALUE_ATTRIBUTE: &str = "_FillValue";

/// Path of the calibrated copy of `template`: `scan.nc` becomes `scan_newrfl.nc`.
pub fn calibrated_output_path(template: &Path) -> PathBuf {
    let name = template
        .file_name()
        .map(|n| n.to_string_lossy().replace(".nc", "_newrfl.nc"))
        .unwrap_or_else(|| "_newrfl.nc".to_string());
    template.with_file_name(name)
}

#[derive(Debug, Clone, Default)]
pub struct NetcdfRewriter {
    pub missing_reflectance: MissingReflectancePolicy,
}

impl NetcdfRewriter {
    pub fn new(missing_reflectance: MissingReflectancePolicy) -> Self {
        Self { missing_reflectance }
    }

    fn add_missing_reflectance(&self, dst: &mut FileMut, payload: &Array3<f32>) -> Result<()> {
        match self.missing_reflectance {
            MissingReflectancePolicy::Scalar => {
                warn!(
                    "Template has no '{}'; adding a dimensionless variable without data",
                    REFLECTANCE_VARIABLE
                );
                dst.add_variable::<f32>(REFLECTANCE_VARIABLE, &[])?;
            }
            MissingReflectancePolicy::Dimensioned => {
                debug!("...adding {}", REFLECTANCE_VARIABLE);
                let (bands, rows, cols) = payload.dim();
                for (name, len) in REFLECTANCE_DIMENSIONS.iter().zip([bands, rows, cols]) {
                    match dst.dimension(name).map(|d| d.len()) {
                        Some(existing) if existing == len => {}
                        Some(existing) => {
                            return Err(CalibrationError::IoFailure(format!(
                                "dimension '{}' has length {} but the reflectance needs {}",
                                name, existing, len
                            )));
                        }
                        None => {
                            dst.add_dimension(name, len)?;
                        }
                    }
                }
                dst.add_variable::<f32>(REFLECTANCE_VARIABLE, &REFLECTANCE_DIMENSIONS)?;
                write_payload(dst, payload)?;
            }
        }
        Ok(())
    }
}

impl ArrayFileWriter for NetcdfRewriter {
    fn rewrite(
        &self,
        template: &Path,
        output: &Path,
        payload: &Array3<f32>,
        generation: CameraGeneration,
    ) -> Result<()> {
        info!("Updating {}", template.display());
        debug!("Writing data to {}", output.display());

        let src = netcdf::open(template)?;
        let mut dst = netcdf::create(output)?;

        for attr in src.attributes() {
            dst.add_attribute(attr.name(), attr.value()?)?;
        }

        for dim in src.dimensions() {
            if dim.is_unlimited() {
                dst.add_unlimited_dimension(&dim.name())?;
            } else {
                dst.add_dimension(&dim.name(), dim.len())?;
            }
        }

        for var in src.variables() {
            let name = var.name();
            if name == EXCLUDED_VARIABLE {
                continue;
            }
            if name == REFLECTANCE_VARIABLE {
                debug!("...{}", name);
                create_like(&var, &mut dst)?;
                write_reflectance(&var, &mut dst, payload, generation)?;
            } else {
                debug!("...{}", name);
                copy_variable(&var, &mut dst)?;
            }
        }

        if src.variable(REFLECTANCE_VARIABLE).is_none() {
            self.add_missing_reflectance(&mut dst, payload)?;
        }

        Ok(())
    }
}

fn unsupported(var: &Variable) -> CalibrationError {
    CalibrationError::IoFailure(format!(
        "variable '{}' has a type that cannot be copied",
        var.name()
    ))
}

macro_rules! dispatch_numeric {
    ($var:expr, $func:ident ( $($arg:expr),* )) => {
        match $var.vartype() {
            NcVariableType::Int(IntType::U8) => $func::<u8>($($arg),*),
            NcVariableType::Int(IntType::I8) => $func::<i8>($($arg),*),
            NcVariableType::Int(IntType::U16) => $func::<u16>($($arg),*),
            NcVariableType::Int(IntType::I16) => $func::<i16>($($arg),*),
            NcVariableType::Int(IntType::U32) => $func::<u32>($($arg),*),
            NcVariableType::Int(IntType::I32) => $func::<i32>($($arg),*),
            NcVariableType::Int(IntType::U64) => $func::<u64>($($arg),*),
            NcVariableType::Int(IntType::I64) => $func::<i64>($($arg),*),
            NcVariableType::Float(FloatType::F32) => $func::<f32>($($arg),*),
            NcVariableType::Float(FloatType::F64) => $func::<f64>($($arg),*),
            _ => Err(unsupported($var)),
        }
    };
}

fn dimension_names(src: &Variable) -> Vec<String> {
    src.dimensions().iter().map(|d| d.name()).collect()
}

fn variable_shape(src: &Variable) -> Vec<usize> {
    src.dimensions().iter().map(|d| d.len()).collect()
}

fn created<'f>(dst: &'f mut FileMut, name: &str) -> Result<VariableMut<'f>> {
    dst.variable_mut(name)
        .ok_or_else(|| CalibrationError::IoFailure(format!("variable '{}' was not created", name)))
}

/// Copies every attribute of `src` onto `dst`, `_FillValue` excepted when
/// `skip_fill` is set.
fn copy_attributes(src: &Variable, dst: &mut VariableMut, skip_fill: bool) -> Result<()> {
    for attr in src.attributes() {
        if skip_fill && attr.name() == FILL_VALUE_ATTRIBUTE {
            continue;
        }
        dst.put_attribute(attr.name(), attr.value()?)?;
    }
    Ok(())
}

/// Defines a variable in `dst` with the type, dimensions and attributes of `src`.
fn create_like(src: &Variable, dst: &mut FileMut) -> Result<()> {
    dispatch_numeric!(src, create_typed(src, dst))
}

fn create_typed<T: NcTypeDescriptor + Copy>(src: &Variable, dst: &mut FileMut) -> Result<()> {
    let dims = dimension_names(src);
    let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();

    let mut var = dst.add_variable::<T>(&src.name(), &dim_refs)?;

    // _FillValue goes through the fill-value setter only
    if src.attribute(FILL_VALUE_ATTRIBUTE).is_some() {
        if let Some(fill) = src.fill_value::<T>()? {
            var.set_fill_value(fill)?;
        }
    }
    copy_attributes(src, &mut var, true)
}

fn copy_variable(src: &Variable, dst: &mut FileMut) -> Result<()> {
    match src.vartype() {
        NcVariableType::Char => copy_chars(src, dst),
        NcVariableType::String => copy_strings(src, dst),
        _ => dispatch_numeric!(src, copy_typed(src, dst)),
    }
}

/// Copies `src` one leading-dimension slab at a time to bound memory use.
fn copy_typed<T: NcTypeDescriptor + Copy>(src: &Variable, dst: &mut FileMut) -> Result<()> {
    create_typed::<T>(src, dst)?;

    let shape = variable_shape(src);
    if shape.contains(&0) {
        return Ok(());
    }
    let mut var = created(dst, &src.name())?;

    if shape.len() < 2 {
        let start = vec![0; shape.len()];
        let values = src.get_values::<T, _>((start.as_slice(), shape.as_slice()))?;
        var.put_values(&values, (start.as_slice(), shape.as_slice()))?;
        return Ok(());
    }

    let mut start = vec![0; shape.len()];
    let mut count = shape.clone();
    count[0] = 1;
    for i in 0..shape[0] {
        start[0] = i;
        let values = src.get_values::<T, _>((start.as_slice(), count.as_slice()))?;
        var.put_values(&values, (start.as_slice(), count.as_slice()))?;
    }
    Ok(())
}

/// Copies a `char` variable as raw bytes. Its `_FillValue` is an ordinary
/// attribute here.
fn copy_chars(src: &Variable, dst: &mut FileMut) -> Result<()> {
    let dims = dimension_names(src);
    let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();
    let name = src.name();

    let mut var = dst.add_variable_with_type(&name, &dim_refs, &NcVariableType::Char)?;
    copy_attributes(src, &mut var, false)?;

    let shape = variable_shape(src);
    if shape.contains(&0) {
        return Ok(());
    }
    let start = vec![0; shape.len()];
    let bytes = src.get_raw_values((start.as_slice(), shape.as_slice()))?;
    var.put_raw_values(&bytes, (start.as_slice(), shape.as_slice()))?;
    Ok(())
}

/// Copies a variable-length string variable element by element.
fn copy_strings(src: &Variable, dst: &mut FileMut) -> Result<()> {
    let dims = dimension_names(src);
    let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();
    let name = src.name();

    let mut var = dst.add_string_variable(&name, &dim_refs)?;
    copy_attributes(src, &mut var, false)?;

    let shape = variable_shape(src);
    let total: usize = shape.iter().product();
    let mut index = vec![0; shape.len()];
    for _ in 0..total {
        let value = src.get_string(index.as_slice())?;
        var.put_string(&value, index.as_slice())?;
        // odometer step, last dimension fastest
        for axis in (0..shape.len()).rev() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    Ok(())
}

/// Fills the reflectance variable. Legacy generations only have coverage for
/// the leading bands; the remaining bands are set to NaN.
fn write_reflectance(
    src: &Variable,
    dst: &mut FileMut,
    payload: &Array3<f32>,
    generation: CameraGeneration,
) -> Result<()> {
    let shape = variable_shape(src);
    let (bands, rows, cols) = payload.dim();
    if shape.len() != 3 {
        return Err(CalibrationError::IoFailure(format!(
            "'{}' has {} dimensions, expected 3",
            REFLECTANCE_VARIABLE,
            shape.len()
        )));
    }

    let expected_bands = match generation.legacy_band_cutoff() {
        Some(cutoff) => cutoff.min(shape[0]),
        None => shape[0],
    };
    // Zero-length dimensions are unlimited ones the payload will extend
    let fits = |have: usize, want: usize| want == 0 || have == want;
    if !fits(bands, expected_bands) || !fits(rows, shape[1]) || !fits(cols, shape[2]) {
        return Err(CalibrationError::IoFailure(format!(
            "payload of shape ({}, {}, {}) does not fit '{}' of shape {:?} for {}",
            bands, rows, cols, REFLECTANCE_VARIABLE, shape, generation
        )));
    }

    if generation.legacy_band_cutoff().is_some() {
        debug!("...{} (subset)", REFLECTANCE_VARIABLE);
    }
    write_payload(dst, payload)?;

    if generation.legacy_band_cutoff().is_some() && shape[0] > bands {
        debug!("...NaNs for bands {}..{}", bands, shape[0]);
        let mut var = created(dst, REFLECTANCE_VARIABLE)?;
        let slab = vec![f32::NAN; rows * cols];
        let count = [1, rows, cols];
        for band in bands..shape[0] {
            var.put_values(&slab, (&[band, 0, 0][..], &count[..]))?;
        }
    }
    Ok(())
}

fn write_payload(dst: &mut FileMut, payload: &Array3<f32>) -> Result<()> {
    let (bands, rows, cols) = payload.dim();
    if bands * rows * cols == 0 {
        return Ok(());
    }
    let mut var = created(dst, REFLECTANCE_VARIABLE)?;
    let contiguous = payload.as_standard_layout();
    let values = contiguous
        .as_slice()
        .ok_or_else(|| CalibrationError::IoFailure("reflectance is not contiguous".to_string()))?;
    var.put_values(values, (&[0, 0, 0][..], &[bands, rows, cols][..]))?;
    Ok(())
}
