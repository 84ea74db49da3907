pub mod refs;
pub mod repository;

pub use refs::{Branch, Tag, TagAnnotation};
pub use repository::Repository;
