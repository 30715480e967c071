//! Model bundle persistence
//!
//! A bundle holds everything inference needs: the fitted classifier, the
//! numeric scaler, the categorical encoders and descriptive metadata.

mod bundle;

pub use bundle::{default_file_name, BundleMetadata, ModelBundle, BUNDLE_FORMAT_VERSION, BUNDLE_MAGIC};
