//! Locating the time axis of a reference system.

use coverage_common::{CoverageError, CoverageResult, GridGeometry, ReferenceSystem, TemporalCrs};

use crate::time_index::TimeInterval;

/// The temporal component of a reference system and the axis it occupies.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalReferencing {
    crs: TemporalCrs,
    axis: usize,
}

impl TemporalReferencing {
    /// Find the temporal component of `crs`, if it has one.
    pub fn extract(crs: &ReferenceSystem) -> Option<Self> {
        let mut axis = 0;
        for component in crs.components() {
            if let Some(temporal) = component.as_temporal() {
                return Some(Self {
                    crs: temporal.clone(),
                    axis,
                });
            }
            axis += component.dimension();
        }
        None
    }

    pub fn crs(&self) -> &TemporalCrs {
        &self.crs
    }

    /// Position of the time axis in the full reference system.
    pub fn axis(&self) -> usize {
        self.axis
    }

    /// Range covered by `domain` along the time axis, in this system's units.
    ///
    /// A domain that carries its own temporal component is read along that
    /// component's axis and converted; otherwise it is assumed to share this
    /// system's axis order.
    pub fn time_range(&self, domain: &GridGeometry) -> CoverageResult<TimeInterval> {
        let envelope = domain
            .envelope()
            .ok_or_else(|| CoverageError::invalid_argument("domain has no envelope"))?;

        let source = domain
            .crs()
            .and_then(Self::extract)
            .unwrap_or_else(|| self.clone());

        if source.axis >= envelope.dimension() {
            return Err(CoverageError::geometry(format!(
                "time axis {} outside a {}-D domain",
                source.axis,
                envelope.dimension()
            )));
        }
        let temporal = envelope
            .select(&[source.axis])
            .map_err(|e| CoverageError::geometry(format!("cannot project domain on time: {}", e)))?;
        if temporal.dimension() != 1 {
            return Err(CoverageError::geometry(format!(
                "temporal envelope has {} dimensions",
                temporal.dimension()
            )));
        }

        let (min, max) = (temporal.lower[0], temporal.upper[0]);
        if source.crs == self.crs {
            return Ok(TimeInterval::new(min, max));
        }
        Ok(TimeInterval::new(
            self.convert(&source.crs, min)?,
            self.convert(&source.crs, max)?,
        ))
    }

    fn convert(&self, from: &TemporalCrs, value: f64) -> CoverageResult<f64> {
        let instant = from.to_datetime(value).ok_or_else(|| {
            CoverageError::geometry(format!("{} is not representable in {}", value, from.name))
        })?;
        Ok(self.crs.to_value(&instant))
    }
}
