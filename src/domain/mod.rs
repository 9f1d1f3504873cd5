//! Domain logic - pure versioning rules independent of git operations

pub mod prerelease;
pub mod tag;
pub mod version;

pub use prerelease::{PreRelease, PreReleaseType};
pub use tag::{DescribeFilter, MalformedTag, ParsedTag, TagGlob};
pub use version::{compose, LocalSegment, ParsedVersion, VersionTuple};
