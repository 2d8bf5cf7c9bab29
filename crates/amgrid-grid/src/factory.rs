//! Projection factories and the locator that dispatches on type name.
//!
//! The set of factories is fixed when the locator is built. Unknown type
//! names are a declared error so a misspelled projection type in a config
//! file surfaces immediately instead of producing an empty cluster.

use std::sync::Arc;

use amgrid_core::ProjectionData;
use tracing::debug;

use crate::error::{GridError, GridResult};
use crate::projection::{AnyGridProjection, DefaultGridProjection, GridProjection};

/// Builds projections for one or more type names.
pub trait GridProjectionFactory: Send + Sync {
    /// Type names this factory can build, lower case.
    fn registered_types(&self) -> Vec<String>;

    /// Build a projection, or `None` if `projection_type` is not one of ours.
    fn create(&self, projection_type: &str, data: ProjectionData) -> Option<Arc<dyn GridProjection>>;
}

/// Factory for the built-in `default` and `any` projections.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultGridProjectionFactory;

impl GridProjectionFactory for DefaultGridProjectionFactory {
    fn registered_types(&self) -> Vec<String> {
        vec![
            DefaultGridProjection::TYPE.to_string(),
            AnyGridProjection::TYPE.to_string(),
        ]
    }

    fn create(&self, projection_type: &str, data: ProjectionData) -> Option<Arc<dyn GridProjection>> {
        match projection_type {
            DefaultGridProjection::TYPE => Some(Arc::new(DefaultGridProjection::new(data))),
            AnyGridProjection::TYPE => Some(Arc::new(AnyGridProjection::new(data))),
            _ => None,
        }
    }
}

/// Resolves projection type names against a fixed list of factories.
///
/// Factories are asked in order; the first one that knows the type wins.
pub struct GridProjectionFactoryLocator {
    factories: Vec<Arc<dyn GridProjectionFactory>>,
}

impl GridProjectionFactoryLocator {
    pub fn new(factories: Vec<Arc<dyn GridProjectionFactory>>) -> Self {
        Self { factories }
    }

    /// Locator with only the built-in projections.
    pub fn with_defaults() -> Self {
        Self::new(vec![Arc::new(DefaultGridProjectionFactory)])
    }

    /// Build a projection of `projection_type` (case insensitive) over `data`.
    pub fn grid_projection(
        &self,
        projection_type: &str,
        data: ProjectionData,
    ) -> GridResult<Arc<dyn GridProjection>> {
        let requested = projection_type.to_lowercase();
        for factory in &self.factories {
            if let Some(projection) = factory.create(&requested, data.clone()) {
                debug!(projection_type = %requested, "projection created");
                return Ok(projection);
            }
        }
        Err(GridError::UnknownProjectionType {
            requested,
            registered: self.registered_projection_types(),
        })
    }

    /// Every registered type name, sorted and de-duplicated.
    pub fn registered_projection_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .factories
            .iter()
            .flat_map(|f| f.registered_types())
            .collect();
        types.sort();
        types.dedup();
        types
    }
}

impl Default for GridProjectionFactoryLocator {
    fn default() -> Self {
        Self::with_defaults()
    }
}
