//! Coverage store over a single ESRI ASCII grid file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use coverage_common::{
    default_metadata, select_bands, AffineTransform, CoverageError, CoverageQuery,
    CoverageResource, CoverageResult, CoverageStore, Envelope, GridCoverage, GridExtent,
    GridGeometry, Metadata, ReferenceSystem, SampleDimension, SourceReference, SourceScope,
    StoreProvider, StoreResource, SubsetView,
};
use tracing::{debug, info};

use crate::config::AsciiGridConfig;
use crate::interpolation::{BandSampler, InterpolationMethod};
use crate::parser::AsciiGrid;

/// File extension handled by [`AsciiGridProvider`].
pub const ASCII_GRID_EXTENSION: &str = "asc";

/// The raster of an ASCII grid file.
#[derive(Clone)]
pub struct AsciiGridResource {
    path: PathBuf,
    name: String,
    grid: Arc<AsciiGrid>,
    geometry: GridGeometry,
    interpolation: InterpolationMethod,
    closed: Arc<AtomicBool>,
}

impl AsciiGridResource {
    fn new(
        path: PathBuf,
        grid: AsciiGrid,
        crs: ReferenceSystem,
        interpolation: InterpolationMethod,
        closed: Arc<AtomicBool>,
    ) -> CoverageResult<Self> {
        let geometry = grid.grid_geometry(crs)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            path,
            name,
            grid: Arc::new(grid),
            geometry,
            interpolation,
            closed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> CoverageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CoverageError::Closed(self.path.display().to_string()));
        }
        Ok(())
    }

    fn band(&self) -> SampleDimension {
        let band = SampleDimension::new(self.name.clone());
        match self.grid.no_data {
            Some(nd) => band.with_no_data(nd),
            None => band,
        }
    }

    /// Sample the grid at the cell centers of `extent` under `transform`.
    fn resample(
        &self,
        domain: &GridGeometry,
        extent: &GridExtent,
        transform: &AffineTransform,
    ) -> CoverageResult<GridCoverage> {
        let to_source = self
            .geometry
            .grid_to_crs()
            .and_then(|t| t.inverse())
            .ok_or_else(|| CoverageError::geometry("grid transform is not invertible"))?;
        let target_to_source = transform.then(&to_source)?;

        let sampler = BandSampler::new(&self.grid.data, self.grid.ncols, self.grid.nrows);
        let width = extent.size(0) as usize;
        let height = extent.size(1) as usize;
        let mut samples = Vec::with_capacity(width * height);

        for row in 0..height {
            for col in 0..width {
                let center = [
                    (extent.low(0) + col as i64) as f64 + 0.5,
                    (extent.low(1) + row as i64) as f64 + 0.5,
                ];
                let source = target_to_source.transform_point(&center)?;
                // Source positions are corner-based; the sampler works on cell centers.
                samples.push(sampler.sample(self.interpolation, source[0] - 0.5, source[1] - 0.5));
            }
        }

        GridCoverage::new(domain.clone(), vec![self.band()], vec![samples])
    }

    /// Native-resolution cells intersecting `envelope`.
    fn crop(&self, envelope: &Envelope) -> CoverageResult<GridCoverage> {
        let grid = &self.grid;
        let top = grid.yll_corner + grid.nrows as f64 * grid.cellsize;

        let col_start = ((envelope.lower[0] - grid.xll_corner) / grid.cellsize).floor().max(0.0);
        let col_end = ((envelope.upper[0] - grid.xll_corner) / grid.cellsize)
            .ceil()
            .min(grid.ncols as f64);
        let row_start = ((top - envelope.upper[1]) / grid.cellsize).floor().max(0.0);
        let row_end = ((top - envelope.lower[1]) / grid.cellsize)
            .ceil()
            .min(grid.nrows as f64);

        if col_start >= col_end || row_start >= row_end {
            return Err(CoverageError::invalid_argument(format!(
                "requested envelope does not intersect {}",
                self.path.display()
            )));
        }

        let (c0, c1, r0, r1) = (
            col_start as usize,
            col_end as usize,
            row_start as usize,
            row_end as usize,
        );
        let mut samples = Vec::with_capacity((c1 - c0) * (r1 - r0));
        for row in r0..r1 {
            let offset = row * grid.ncols;
            samples.extend_from_slice(&grid.data[offset + c0..offset + c1]);
        }

        let extent = GridExtent::new(
            vec![c0 as i64, r0 as i64],
            vec![c1 as i64 - 1, r1 as i64 - 1],
        )?;
        let geometry = GridGeometry::new(
            Some(extent),
            self.geometry.grid_to_crs().cloned(),
            self.geometry.crs().cloned(),
        )?;
        GridCoverage::new(geometry, vec![self.band()], vec![samples])
    }
}

#[async_trait]
impl CoverageResource for AsciiGridResource {
    fn identifier(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn grid_geometry(&self) -> CoverageResult<GridGeometry> {
        Ok(self.geometry.clone())
    }

    fn sample_dimensions(&self) -> CoverageResult<Vec<SampleDimension>> {
        Ok(vec![self.band()])
    }

    fn metadata(&self) -> CoverageResult<Metadata> {
        let mut metadata = default_metadata(self, &[])?;
        metadata.sources.push(SourceReference {
            scope: SourceScope::Dataset,
            description: Some(self.path.display().to_string()),
            metadata: None,
        });
        Ok(metadata)
    }

    async fn read(
        &self,
        domain: Option<&GridGeometry>,
        bands: &[usize],
    ) -> CoverageResult<GridCoverage> {
        self.ensure_open()?;
        select_bands(1, bands)?;

        let domain = match domain {
            Some(d) => d,
            None => {
                return GridCoverage::new(
                    self.geometry.clone(),
                    vec![self.band()],
                    vec![self.grid.data.clone()],
                )
            }
        };

        if let Some(dim) = domain.dimension() {
            if dim != 2 {
                return Err(CoverageError::invalid_argument(format!(
                    "{}-D domain requested from a 2-D grid",
                    dim
                )));
            }
        }
        if let (Some(requested), Some(native)) = (domain.crs(), self.geometry.crs()) {
            if requested != native {
                return Err(CoverageError::invalid_argument(format!(
                    "domain CRS {} differs from grid CRS {}",
                    requested, native
                )));
            }
        }

        match (domain.extent(), domain.grid_to_crs(), domain.envelope()) {
            (Some(extent), Some(transform), _) => self.resample(domain, extent, transform),
            (_, _, Some(envelope)) => self.crop(envelope),
            _ => GridCoverage::new(
                self.geometry.clone(),
                vec![self.band()],
                vec![self.grid.data.clone()],
            ),
        }
    }

    fn subset(&self, query: &CoverageQuery) -> CoverageResult<Arc<dyn CoverageResource>> {
        Ok(Arc::new(SubsetView::new(Arc::new(self.clone()), query.clone())))
    }
}

/// An opened ASCII grid file.
pub struct AsciiGridStore {
    path: PathBuf,
    resource: Arc<AsciiGridResource>,
    closed: Arc<AtomicBool>,
}

impl AsciiGridStore {
    /// Read and parse `path`.
    pub async fn open(path: &Path, config: &AsciiGridConfig) -> CoverageResult<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoverageError::data_store(path, e.to_string()))?;
        let grid = AsciiGrid::parse(&text).map_err(|e| CoverageError::data_store(path, e.to_string()))?;

        debug!(
            path = %path.display(),
            ncols = grid.ncols,
            nrows = grid.nrows,
            cellsize = grid.cellsize,
            "Opened ASCII grid"
        );

        let closed = Arc::new(AtomicBool::new(false));
        let resource = AsciiGridResource::new(
            path.to_path_buf(),
            grid,
            ReferenceSystem::Horizontal(config.default_crs),
            config.interpolation,
            closed.clone(),
        )?;

        Ok(Self {
            path: path.to_path_buf(),
            resource: Arc::new(resource),
            closed,
        })
    }
}

#[async_trait]
impl CoverageStore for AsciiGridStore {
    fn location(&self) -> &Path {
        &self.path
    }

    async fn root_resource(&self) -> CoverageResult<StoreResource> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CoverageError::Closed(self.path.display().to_string()));
        }
        Ok(StoreResource::Coverage(self.resource.clone()))
    }

    async fn close(&self) -> CoverageResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(path = %self.path.display(), "Closed ASCII grid");
        }
        Ok(())
    }
}

/// Opens `.asc` files as [`AsciiGridStore`]s.
#[derive(Debug, Clone, Default)]
pub struct AsciiGridProvider {
    config: AsciiGridConfig,
}

impl AsciiGridProvider {
    pub fn new(config: AsciiGridConfig) -> Self {
        info!(
            interpolation = %config.interpolation,
            crs = %config.default_crs,
            "ASCII grid provider configured"
        );
        Self { config }
    }

    /// True when `path` carries the ASCII grid extension.
    pub fn can_open(path: &Path) -> bool {
        path.extension()
            .map(|e| e.eq_ignore_ascii_case(ASCII_GRID_EXTENSION))
            .unwrap_or(false)
    }
}

#[async_trait]
impl StoreProvider for AsciiGridProvider {
    async fn open(&self, path: &Path) -> CoverageResult<Arc<dyn CoverageStore>> {
        if !Self::can_open(path) {
            return Err(CoverageError::data_store(
                path,
                format!("not an ASCII grid (expected .{})", ASCII_GRID_EXTENSION),
            ));
        }
        Ok(Arc::new(AsciiGridStore::open(path, &self.config).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coverage_common::CrsCode;

    const GRID: &str = "ncols 4\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\nNODATA_value -9999\n1 2 3 4\n5 6 7 8\n";

    fn resource() -> AsciiGridResource {
        AsciiGridResource::new(
            PathBuf::from("/data/sst.asc"),
            AsciiGrid::parse(GRID).unwrap(),
            ReferenceSystem::Horizontal(CrsCode::Epsg4326),
            InterpolationMethod::Nearest,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_full_read() {
        let coverage = resource().read(None, &[]).await.unwrap();
        assert_eq!(coverage.shape(), (4, 2));
        assert_eq!(coverage.get(0, 0, 0), Some(1.0));
        assert_eq!(coverage.get(0, 3, 1), Some(8.0));
    }

    #[tokio::test]
    async fn test_crop_by_envelope() {
        let env = Envelope::from_xy(1.0, 0.0, 3.0, 1.0, None).unwrap();
        let coverage = resource()
            .read(Some(&GridGeometry::from_envelope(env)), &[])
            .await
            .unwrap();
        // Bottom row, columns 1 and 2.
        assert_eq!(coverage.shape(), (2, 1));
        assert_eq!(coverage.bands[0], vec![6.0, 7.0]);
        let crop_env = coverage.geometry.envelope().unwrap();
        assert_eq!(crop_env.lower, vec![1.0, 0.0]);
        assert_eq!(crop_env.upper, vec![3.0, 1.0]);
    }

    #[tokio::test]
    async fn test_resample_to_coarser_grid() {
        let crs = ReferenceSystem::Horizontal(CrsCode::Epsg4326);
        let env = Envelope::from_xy(0.0, 0.0, 4.0, 2.0, Some(crs)).unwrap();
        let domain = GridGeometry::from_envelope_and_size(env, &[2, 1]).unwrap();
        let coverage = resource().read(Some(&domain), &[]).await.unwrap();
        assert_eq!(coverage.shape(), (2, 1));
        // Target centers (1, 1) and (3, 1) fall on source cell corners; nearest rounds up.
        assert_eq!(coverage.bands[0], vec![6.0, 8.0]);
    }

    #[tokio::test]
    async fn test_crs_mismatch_rejected() {
        let crs = ReferenceSystem::Horizontal(CrsCode::Epsg3857);
        let env = Envelope::from_xy(0.0, 0.0, 4.0, 2.0, Some(crs)).unwrap();
        let result = resource()
            .read(Some(&GridGeometry::from_envelope(env)), &[])
            .await;
        assert!(matches!(result, Err(CoverageError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_read_after_close_fails() {
        let res = resource();
        res.closed.store(true, Ordering::Release);
        assert!(matches!(res.read(None, &[]).await, Err(CoverageError::Closed(_))));
    }

    #[test]
    fn test_metadata_names_file() {
        let metadata = resource().metadata().unwrap();
        assert_eq!(metadata.title.as_deref(), Some("sst"));
        assert_eq!(metadata.sources[0].scope, SourceScope::Dataset);
        assert_eq!(metadata.sources[0].description.as_deref(), Some("/data/sst.asc"));
    }

    #[test]
    fn test_can_open() {
        assert!(AsciiGridProvider::can_open(Path::new("a/b.ASC")));
        assert!(!AsciiGridProvider::can_open(Path::new("a/b.tif")));
        assert!(!AsciiGridProvider::can_open(Path::new("a/b")));
    }
}
