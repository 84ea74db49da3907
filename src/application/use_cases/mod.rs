/// Use case implementations
pub mod mirror_content;

pub use mirror_content::{
    ContentSnapshot, ImportOutcome, MirrorContentConfig, MirrorContentUseCase, MirrorError,
    MirrorResult, SourceContentRepository, TargetContentRepository,
};
