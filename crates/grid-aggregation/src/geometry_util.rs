//! Grid geometry algebra for aggregation: time axis insertion and merging.

use chrono::{DateTime, Duration, TimeZone};
use coverage_common::{
    AffineTransform, CoverageError, CoverageResult, GridExtent, GridGeometry, ReferenceSystem,
    TemporalCrs,
};

/// Append a one-cell time axis to a complete spatial geometry.
///
/// Grid index 0 on the new axis maps to `origin` and index 1 to
/// `origin + duration`, both expressed in the default temporal system.
pub fn insert_time_dimension<Tz: TimeZone>(
    geometry: &GridGeometry,
    origin: &DateTime<Tz>,
    duration: Duration,
) -> CoverageResult<GridGeometry> {
    let (extent, transform, crs) = match (geometry.extent(), geometry.grid_to_crs(), geometry.crs())
    {
        (Some(e), Some(t), Some(c)) => (e, t, c),
        _ => {
            return Err(CoverageError::invalid_argument(
                "time axis insertion needs a geometry with extent, transform and CRS",
            ))
        }
    };

    let temporal = TemporalCrs::default();
    let n = extent.dimension();

    let extent = extent.append(0, 0)?;
    let time_axis = AffineTransform::identity(n + 1).with_axis(
        n,
        temporal.duration_value(duration),
        temporal.to_value(origin),
    );
    let transform = transform.append_dimension(1.0, 0.0).then(&time_axis)?;
    let crs = ReferenceSystem::compound(&[crs.clone(), ReferenceSystem::Temporal(temporal)])
        .map_err(|e| CoverageError::geometry(format!("cannot add time to {}: {}", crs, e)))?;

    GridGeometry::new(Some(extent), Some(transform), Some(crs))
}

/// Smallest regular grid enclosing both geometries at the finer resolution of each axis.
///
/// The result has its low grid index at zero and a scale/translate transform
/// anchored on the union envelope's lower corner.
pub fn merge(a: &GridGeometry, b: &GridGeometry) -> CoverageResult<GridGeometry> {
    if a.crs() != b.crs() {
        return Err(CoverageError::invalid_argument(format!(
            "cannot merge geometries in different reference systems: {} and {}",
            describe_crs(a),
            describe_crs(b)
        )));
    }

    let (res_a, env_a) = complete_parts(a)?;
    let (res_b, env_b) = complete_parts(b)?;
    if res_a.len() != res_b.len() {
        return Err(CoverageError::invalid_argument(format!(
            "cannot merge {}-D and {}-D geometries",
            res_a.len(),
            res_b.len()
        )));
    }

    let resolution: Vec<f64> = res_a.iter().zip(&res_b).map(|(x, y)| x.min(*y)).collect();
    let union = env_a.union(env_b)?;

    let mut size = Vec::with_capacity(resolution.len());
    for (d, res) in resolution.iter().enumerate() {
        let cells = (union.span(d) / res).ceil();
        if !cells.is_finite() {
            return Err(CoverageError::geometry(format!(
                "merged grid size along axis {} is not finite (span {}, resolution {})",
                d,
                union.span(d),
                res
            )));
        }
        size.push(cells.max(1.0) as u64);
    }

    let extent = GridExtent::from_size(&size)?;
    let transform = AffineTransform::from_scale_translate(&resolution, &union.lower)?;
    GridGeometry::new(Some(extent), Some(transform), union.crs)
}

fn complete_parts(
    geometry: &GridGeometry,
) -> CoverageResult<(Vec<f64>, &coverage_common::Envelope)> {
    match (geometry.extent(), geometry.resolution(), geometry.envelope()) {
        (Some(_), Some(resolution), Some(envelope)) => Ok((resolution, envelope)),
        _ => Err(CoverageError::invalid_argument(
            "merge needs geometries with extent, transform and envelope",
        )),
    }
}

fn describe_crs(geometry: &GridGeometry) -> String {
    geometry
        .crs()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "undefined".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coverage_common::{CrsCode, Envelope};

    fn wgs84() -> ReferenceSystem {
        ReferenceSystem::Horizontal(CrsCode::Epsg4326)
    }

    fn square(lower: f64, upper: f64, resolution: f64) -> GridGeometry {
        let env = Envelope::from_xy(lower, lower, upper, upper, Some(wgs84())).unwrap();
        let cells = ((upper - lower) / resolution) as u64;
        GridGeometry::from_envelope_and_size(env, &[cells, cells]).unwrap()
    }

    #[test]
    fn test_insert_time_dimension() {
        let origin = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let duration = Duration::hours(6);
        let geometry = insert_time_dimension(&square(0.0, 10.0, 1.0), &origin, duration).unwrap();

        assert_eq!(geometry.dimension(), Some(3));
        let extent = geometry.extent().unwrap();
        assert_eq!(extent.low(2), 0);
        assert_eq!(extent.high(2), 0);

        let t0 = 1_705_320_000_000.0;
        let d = 6.0 * 3_600_000.0;
        let transform = geometry.grid_to_crs().unwrap();
        assert_eq!(transform.transform_point(&[0.0, 0.0, 0.0]).unwrap()[2], t0);
        assert_eq!(transform.transform_point(&[0.0, 0.0, 1.0]).unwrap()[2], t0 + d);
        // Spatial axes pass through.
        assert_eq!(
            transform.transform_point(&[3.0, 4.0, 1.0]).unwrap()[..2],
            [3.0, 4.0]
        );

        let crs = geometry.crs().unwrap();
        assert_eq!(crs.dimension(), 3);
        assert!(crs.components()[1].as_temporal().is_some());

        let env = geometry.envelope().unwrap();
        assert_eq!(env.lower[2], t0);
        assert_eq!(env.upper[2], t0 + d);
    }

    #[test]
    fn test_insert_requires_complete_geometry() {
        let env = Envelope::from_xy(0.0, 0.0, 1.0, 1.0, Some(wgs84())).unwrap();
        let partial = GridGeometry::from_envelope(env);
        let result = insert_time_dimension(&partial, &Utc::now(), Duration::hours(1));
        assert!(matches!(result, Err(CoverageError::InvalidArgument(_))));
    }

    #[test]
    fn test_insert_twice_fails_compound() {
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let once = insert_time_dimension(&square(0.0, 4.0, 1.0), &origin, Duration::hours(1)).unwrap();
        let twice = insert_time_dimension(&once, &origin, Duration::hours(1));
        assert!(matches!(twice, Err(CoverageError::Geometry(_))));
    }

    #[test]
    fn test_merge_takes_finer_resolution() {
        let a = square(0.0, 10.0, 1.0);
        let b = square(4.0, 20.0, 2.0);
        let merged = merge(&a, &b).unwrap();

        let env = merged.envelope().unwrap();
        assert_eq!(env.lower, vec![0.0, 0.0]);
        assert_eq!(env.upper, vec![20.0, 20.0]);
        assert_eq!(merged.resolution().unwrap(), vec![1.0, 1.0]);
        let extent = merged.extent().unwrap();
        assert_eq!((extent.size(0), extent.size(1)), (20, 20));
        assert_eq!(extent.low(0), 0);
    }

    #[test]
    fn test_merge_rounds_size_up() {
        let a = square(0.0, 10.0, 2.0);
        let b = square(5.0, 8.0, 3.0);
        let merged = merge(&a, &b).unwrap();
        // Span 10 at resolution 2.
        assert_eq!(merged.extent().unwrap().size(0), 5);

        let c = square(0.0, 9.0, 3.0);
        let d = square(0.0, 10.0, 5.0);
        let merged = merge(&c, &d).unwrap();
        // ceil(10 / 3)
        assert_eq!(merged.extent().unwrap().size(0), 4);
    }

    #[test]
    fn test_merge_rejects_crs_mismatch() {
        let a = square(0.0, 10.0, 1.0);
        let env = Envelope::from_xy(0.0, 0.0, 10.0, 10.0, Some(ReferenceSystem::Horizontal(CrsCode::Epsg3857)))
            .unwrap();
        let b = GridGeometry::from_envelope_and_size(env, &[10, 10]).unwrap();
        assert!(matches!(merge(&a, &b), Err(CoverageError::InvalidArgument(_))));
    }

    #[test]
    fn test_merge_rejects_incomplete() {
        let a = square(0.0, 10.0, 1.0);
        let env = Envelope::from_xy(0.0, 0.0, 10.0, 10.0, Some(wgs84())).unwrap();
        let b = GridGeometry::from_envelope(env);
        assert!(matches!(merge(&a, &b), Err(CoverageError::InvalidArgument(_))));
    }

    #[test]
    fn test_merge_time_axes() {
        let day = Duration::days(1);
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let a = insert_time_dimension(&square(0.0, 10.0, 1.0), &first, day).unwrap();
        let b = insert_time_dimension(&square(0.0, 10.0, 1.0), &second, day).unwrap();

        let merged = merge(&a, &b).unwrap();
        let extent = merged.extent().unwrap();
        // Three days at one-day resolution.
        assert_eq!(extent.size(2), 3);
        assert_eq!(merged.resolution().unwrap()[2], 86_400_000.0);
    }
}
