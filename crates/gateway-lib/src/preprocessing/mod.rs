//! Feature alignment and z-score scaling

mod aligner;
mod scaler;
pub mod schema;

pub use aligner::FeatureAligner;
pub use scaler::{denormalize, mean_of, normalize, population_std, Scaler};
pub use schema::{ModelSchema, KNN_DIASTOLIC, KNN_SYSTOLIC, RANDOM_FOREST};
