/// Domain layer
///
/// Core entities and value objects shared by every layer:
/// - Entities: repository bindings and branch/tag read models
/// - Value objects: remote URLs, version identifiers, commit metadata
pub mod entities;
pub mod value_objects;
