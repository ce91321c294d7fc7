//! Column naming of per-visit photometry tables.
//!
//! Two on-disk layouts are supported:
//!
//! - `band_aperture`: `aperture_sum[_{plane}][_{bin}]_{band}_{size}`, where
//!   `band` is `n` or `f` and `size` is the aperture radius with its decimal
//!   point replaced by `_` (`aperture_sum_mask_3_n_12_8`). Omitting the bin
//!   selects the full-depth total.
//! - `legacy_csv`: `aperture_sum_{bin}` and `aperture_sum_{plane}_{bin}` with
//!   planes named `flag` and `edge`. In files of this layout the `flag` plane
//!   holds detector-edge contamination and the `edge` plane holds hot-spot
//!   mask contamination.
//!
//! Which plane name means which physical condition is configurable through
//! [`FormatConfig`].

use crate::config::{FormatConfig, SourceFormat};
use crate::core::domain::Band;

const PREFIX: &str = "aperture_sum";

/// Identifier columns carried by `band_aperture` tables.
pub const ID_FIELDS: [&str; 5] = ["obj_id", "xcenter", "ycenter", "ra", "dec"];

/// Physical meaning of a contamination plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagPlane {
    /// Counts under the hot-spot mask.
    Mask,
    /// Counts near the detector edge.
    Edge,
}

/// Resolves column names for one band and aperture of one source format.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnScheme {
    format: SourceFormat,
    band: Band,
    aperture: f64,
    mask_plane: String,
    edge_plane: String,
    id_column: Option<String>,
}

/// Aperture radius as it appears in column and file names (`12.8` -> `12_8`).
pub fn aperture_token(radius: f64) -> String {
    format!("{}", radius).replace('.', "_")
}

impl ColumnScheme {
    pub fn new(format: &FormatConfig, band: Band, aperture: f64) -> Self {
        let (default_mask, default_edge) = match format.version {
            SourceFormat::BandAperture => ("mask", "edge"),
            SourceFormat::LegacyCsv => ("edge", "flag"),
        };
        Self {
            format: format.version,
            band,
            aperture,
            mask_plane: format
                .mask_plane
                .clone()
                .unwrap_or_else(|| default_mask.to_string()),
            edge_plane: format
                .edge_plane
                .clone()
                .unwrap_or_else(|| default_edge.to_string()),
            id_column: format.id_column.clone(),
        }
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn band(&self) -> Band {
        self.band
    }

    pub fn aperture(&self) -> f64 {
        self.aperture
    }

    fn suffix(&self) -> String {
        format!("_{}_{}", self.band.letter(), aperture_token(self.aperture))
    }

    fn name(&self, plane: Option<&str>, bin: Option<usize>) -> String {
        let mut col = PREFIX.to_string();
        if let Some(plane) = plane {
            col.push('_');
            col.push_str(plane);
        }
        if let Some(bin) = bin {
            col.push_str(&format!("_{}", bin));
        }
        if self.format == SourceFormat::BandAperture {
            col.push_str(&self.suffix());
        }
        col
    }

    /// Raw aperture-sum column of `bin`, or the full-depth total for `None`.
    pub fn counts(&self, bin: Option<usize>) -> String {
        self.name(None, bin)
    }

    /// Contamination column of `plane` for `bin`, or the full-depth total for `None`.
    pub fn flag(&self, plane: FlagPlane, bin: Option<usize>) -> String {
        let name = match plane {
            FlagPlane::Mask => &self.mask_plane,
            FlagPlane::Edge => &self.edge_plane,
        };
        self.name(Some(name), bin)
    }

    /// Bin number of a per-bin counts column, if `column` is one.
    fn bin_of(&self, column: &str) -> Option<usize> {
        let rest = column.strip_prefix(PREFIX)?.strip_prefix('_')?;
        let digits = match self.format {
            SourceFormat::BandAperture => rest.strip_suffix(&self.suffix())?,
            SourceFormat::LegacyCsv => rest,
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Sorted bin numbers present among `columns`.
    pub fn bins<S: AsRef<str>>(&self, columns: &[S]) -> Vec<usize> {
        let mut bins: Vec<usize> = columns.iter().filter_map(|c| self.bin_of(c.as_ref())).collect();
        bins.sort_unstable();
        bins.dedup();
        bins
    }

    /// Object identifier column present among `columns`, if any.
    pub fn id_column<S: AsRef<str>>(&self, columns: &[S]) -> Option<String> {
        let has = |name: &str| columns.iter().any(|c| c.as_ref() == name);
        match &self.id_column {
            Some(name) => has(name.as_str()).then(|| name.clone()),
            None => ["obj_id", "id"]
                .into_iter()
                .find(|name| has(*name))
                .map(str::to_string),
        }
    }

    /// Aperture radii (as name tokens) found among `columns` for this band.
    pub fn available_apertures<S: AsRef<str>>(columns: &[S], band: Band) -> Vec<String> {
        let marker = format!("_{}_", band.letter());
        let mut sizes: Vec<String> = columns
            .iter()
            .filter_map(|c| {
                let c = c.as_ref();
                if !c.starts_with(PREFIX) {
                    return None;
                }
                c.rfind(&marker).map(|pos| c[pos + marker.len()..].to_string())
            })
            .collect();
        sizes.sort();
        sizes.dedup();
        sizes
    }
}
