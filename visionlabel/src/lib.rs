pub mod config;
pub mod image;
pub mod label;
pub mod labels;
pub mod model;

// Re-export commonly used types
pub use config::ClassifierConfig;
pub use image::{ImageType, Preprocess};
pub use label::{rank, top_k, Label};
pub use labels::load_labels;
pub use model::Model;
