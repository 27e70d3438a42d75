use thiserror::Error;

use geocensus_core::geo::Resolution;

pub type Result<T> = std::result::Result<T, GeoError>;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("ring has {0} distinct point(s); at least 3 are required")]
    DegenerateRing(usize),

    #[error("non-finite coordinate in polygon")]
    NonFiniteCoordinate,

    #[error("parent area must be positive, got {0}")]
    NonPositiveParentArea(f64),

    #[error("non-finite apportioned value")]
    NonFiniteValue,

    #[error("geometry table for {0} carries no parent-id reference")]
    MissingParentReference(Resolution),

    #[error(transparent)]
    Plan(#[from] geocensus_plan::PlanError),
}
