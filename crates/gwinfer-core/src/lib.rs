#![deny(missing_docs)]
#![doc = "Core error, seeding and provenance types shared by the gwinfer drivers and sampler library."]

pub mod errors;
pub mod provenance;
pub mod rng;

pub use errors::{ErrorInfo, InferenceError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
