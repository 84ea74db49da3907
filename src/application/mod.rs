/// Application layer modules
///
/// Workflows composed from the infrastructure action surface.
pub mod use_cases;

pub use use_cases::mirror_content::{
    ImportOutcome, MirrorContentConfig, MirrorContentUseCase, MirrorError, MirrorResult,
};
