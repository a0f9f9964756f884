// Pipeline stages, in execution order

pub mod normalize;
pub mod mask;
pub mod dilate;
pub mod extract;
pub mod group;
pub mod render;
pub mod composite;
pub mod package;

pub use composite::compose_side_by_side;
pub use dilate::dilate;
pub use extract::{extract_components, Extraction, LabelMap};
pub use group::group_components;
pub use mask::build_difference_mask;
pub use normalize::{normalize, normalize_images, NormalizedPair};
pub use package::package;
pub use render::render_answer;
