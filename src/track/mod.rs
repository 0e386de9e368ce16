mod builtin;
pub mod coerce;
mod error;
mod geometry;
mod normalize;
mod sample;
pub mod shapes;

pub use builtin::{builtin_samples, BUILTIN_DEVICE};
pub use coerce::coerce_number_or;
pub use error::TrackError;
pub use geometry::{haversine_m, GeoPoint, MarkerPosition, PathGeometry};
pub use normalize::{normalize, normalize_with, to_sample, NormalizeOptions};
pub use sample::{Sample, SampleSequence};
pub use shapes::ShapeKind;
