//! Screenshot handling: fetching, layout detection and region extraction.

pub mod extract;
pub mod fetch;
pub mod preprocess;
pub mod regions;
pub mod variant;

pub use extract::{ExtractOptions, Extraction, Regions, extract};
pub use fetch::{decode, http_client, load_source};
pub use regions::{AspectClass, RelativeRect};
pub use variant::{ImageVariant, VariantSignatures, classify};
