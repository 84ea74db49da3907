pub mod commit;
pub mod remote_url;
pub mod scm_kind;
pub mod source_version;

pub use commit::{CommitArgument, FileDescriptor, FileMode, TagArgument};
pub use remote_url::{RemoteUrl, RemoteUrlError};
pub use scm_kind::ScmKind;
pub use source_version::{
    SourceControlVersion, SourceVersion, SourceVersionError, SyncTarget, VersionSelector,
};
