pub mod archive;
pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use archive::{build_results_zip, zip_from_request, ARCHIVE_NAME};
pub use image_ops::{decode_data_url, encode_jpeg, encode_png, to_data_url, upload_bytes};
pub use metrics::{Metrics, MetricsSnapshot};
