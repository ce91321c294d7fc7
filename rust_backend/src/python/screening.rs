use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::PathBuf;

use crate::algorithms::flares::FlareCharacterizer;
use crate::config::PipelineConfig;
use crate::core::domain::{Band, ObjectId, VisitId};
use crate::io::loaders::{LightCurveLoader, VisitFileLoader};
use crate::parsing::{exposure_parser, photometry_parser};
use crate::preprocessing::pipeline::VisitPipeline;

fn load_config(config_path: Option<&str>, band: &str, aperture: f64) -> PyResult<PipelineConfig> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_file(path)
            .map_err(|e| PyValueError::new_err(format!("Invalid configuration: {}", e)))?,
        None => PipelineConfig::default(),
    };
    config.photometry.band = band
        .parse::<Band>()
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    config.photometry.aperture_radius = aperture;
    Ok(config)
}

/// Screen one visit's photometry for variable sources
///
/// Args:
///     photometry_path: Photometry table (.csv or .parquet)
///     exposure_path: Exposure table (.csv or .json)
///     band: "NUV" or "FUV" (default: "NUV")
///     aperture: Aperture radius in arcseconds (default: 12.8)
///     visit: Visit (eclipse) number, used in log messages
///     config_path: Optional gfcat.toml with threshold overrides
///
/// Returns:
///     tuple: (list of accepted object ids, dict of object id -> rejection reason)
///
/// Example:
///     >>> accepted, rejected = gfcat_rust.screen_visit_files(
///     ...     "e23456/e23456-nd-30s-photom-12_8.csv",
///     ...     "e23456/e23456-nd-30s-exptime.csv",
///     ... )
#[pyfunction]
#[pyo3(signature = (photometry_path, exposure_path, band="NUV", aperture=12.8, visit=0, config_path=None))]
pub fn screen_visit_files<'py>(
    py: Python<'py>,
    photometry_path: &str,
    exposure_path: &str,
    band: &str,
    aperture: f64,
    visit: u32,
    config_path: Option<&str>,
) -> PyResult<(Vec<i64>, Bound<'py, PyDict>)> {
    let config = load_config(config_path, band, aperture)?;
    let data = VisitFileLoader::load(
        &PathBuf::from(photometry_path),
        &PathBuf::from(exposure_path),
        VisitId(visit),
        &config,
    )
    .map_err(|e| PyIOError::new_err(format!("Failed to load visit: {:#}", e)))?;

    let screening = VisitPipeline::with_config(config).screen(&data);

    let accepted = screening.candidates.iter().map(|c| c.object_id.0).collect();
    let rejected = PyDict::new(py);
    for (object_id, reason) in &screening.rejections {
        rejected.set_item(object_id.0, reason.to_string())?;
    }
    Ok((accepted, rejected))
}

/// Find flares in one object's light curve and integrate their energy
///
/// Args:
///     photometry_path: Photometry table (.csv or .parquet)
///     exposure_path: Exposure table (.csv or .json)
///     object_id: Object to characterize
///     band: "NUV" or "FUV" (default: "NUV")
///     aperture: Aperture radius in arcseconds (default: 12.8)
///     distance_pc: Optional distance; without it only fluence is reported
///
/// Returns:
///     list[dict]: One dict per flare with range, censoring, peak and energy
#[pyfunction]
#[pyo3(signature = (photometry_path, exposure_path, object_id, band="NUV", aperture=12.8, distance_pc=None))]
pub fn characterize_flare_file<'py>(
    py: Python<'py>,
    photometry_path: &str,
    exposure_path: &str,
    object_id: i64,
    band: &str,
    aperture: f64,
    distance_pc: Option<f64>,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    let config = load_config(None, band, aperture)?;
    let exposure = exposure_parser::parse_exposure(&PathBuf::from(exposure_path))
        .map_err(|e| PyIOError::new_err(format!("{:#}", e)))?;
    let df = photometry_parser::parse_photometry(&PathBuf::from(photometry_path))
        .map_err(|e| PyIOError::new_err(format!("{:#}", e)))?;

    let light_curves = LightCurveLoader::from_config(&config)
        .load_all(&df, &exposure, VisitId(0))
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    let lc = light_curves
        .iter()
        .find(|lc| lc.object_id == ObjectId(object_id))
        .ok_or_else(|| PyValueError::new_err(format!("No object {} in table", object_id)))?;

    let characterizer = FlareCharacterizer::new(config.flare.clone(), config.photometry.clone());
    let result = characterizer
        .characterize(lc, &exposure, distance_pc)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

    let mut flares = Vec::with_capacity(result.flares.len());
    for flare in &result.flares {
        let dict = PyDict::new(py);
        dict.set_item("start", flare.start)?;
        dict.set_item("end", flare.end)?;
        dict.set_item("is_left_censored", flare.is_left_censored)?;
        dict.set_item("is_right_censored", flare.is_right_censored)?;
        dict.set_item("peak_is_censored", flare.peak_is_censored)?;
        dict.set_item("quiescence", result.quiescence.flux)?;
        dict.set_item("quiescence_err", result.quiescence.flux_err)?;
        if let Some(peak) = characterizer.peak(lc, &exposure, flare) {
            dict.set_item("peak_cps", peak.cps)?;
            dict.set_item("peak_cps_err", peak.cps_err)?;
            dict.set_item("peak_t", peak.time)?;
            dict.set_item("peak_utc", peak.time_utc.map(|t| t.to_rfc3339()))?;
        }
        if let Some(energy) = flare.energy {
            dict.set_item("fluence", energy.fluence)?;
            dict.set_item("fluence_err", energy.fluence_err)?;
            dict.set_item("energy", energy.energy)?;
            dict.set_item("energy_err", energy.energy_err)?;
        }
        flares.push(dict);
    }
    Ok(flares)
}
