//! Descriptive metadata for coverage resources.

use serde::{Deserialize, Serialize};

use crate::coverage::SampleDimension;
use crate::envelope::Envelope;
use crate::grid::GridGeometry;

/// Metadata record of a coverage resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub spatial_representation: Option<SpatialRepresentation>,
    pub bands: Vec<SampleDimension>,
    pub sources: Vec<SourceReference>,
}

/// Grid layout summary derived from a grid geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialRepresentation {
    /// Number of cells per axis.
    pub axis_sizes: Vec<u64>,
    /// Resolution per CRS axis.
    pub resolution: Vec<f64>,
    pub envelope: Option<Envelope>,
    /// Reference system name.
    pub crs: Option<String>,
}

impl SpatialRepresentation {
    pub fn from_geometry(geometry: &GridGeometry) -> Self {
        let axis_sizes = geometry
            .extent()
            .map(|e| (0..e.dimension()).map(|d| e.size(d)).collect())
            .unwrap_or_default();

        Self {
            axis_sizes,
            resolution: geometry.resolution().unwrap_or_default(),
            envelope: geometry.envelope().cloned(),
            crs: geometry.crs().map(|c| c.to_string()),
        }
    }
}

/// Scope of a source referenced by a metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceScope {
    /// A file or dataset the resource was read from.
    Dataset,
    /// A member of an aggregate resource.
    Aggregate,
}

/// Lineage entry: a source and its own metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
    pub scope: SourceScope,
    pub description: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Incremental construction of a [`Metadata`] record.
#[derive(Debug, Default)]
pub struct MetadataBuilder {
    metadata: Metadata,
}

impl MetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    pub fn spatial_representation(mut self, geometry: &GridGeometry) -> Self {
        self.metadata.spatial_representation = Some(SpatialRepresentation::from_geometry(geometry));
        self
    }

    pub fn band(mut self, band: SampleDimension) -> Self {
        self.metadata.bands.push(band);
        self
    }

    pub fn source(
        mut self,
        scope: SourceScope,
        description: Option<String>,
        metadata: Option<Metadata>,
    ) -> Self {
        self.metadata.sources.push(SourceReference {
            scope,
            description,
            metadata,
        });
        self
    }

    pub fn build(self) -> Metadata {
        self.metadata
    }
}
