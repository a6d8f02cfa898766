pub mod artifact;
pub mod config;
pub mod error;
pub mod gather;
pub mod metrics;
pub mod output_formats;
pub mod packager;
pub mod patterns;
pub mod remote;
pub mod targets;

pub use artifact::{Artifact, write_artifact};
pub use config::{ConfigFile, OutputStyle, PackConfig, PackConfigBuilder};
pub use error::{AppError, ErrorKind, Result};
pub use gather::{Aggregation, FileRecord, WalkOptions, aggregate, discover};
pub use metrics::{PackSummary, TopFile, summarize};
pub use output_formats::{PlainRenderer, StructuredRenderer, StyleRenderer, render};
pub use packager::{PackResult, pack, pack_remote};
pub use patterns::{PatternResolver, PatternSet};
pub use remote::{GitCloneProvider, RemoteSourceProvider, ScopedSource, with_remote_source};
pub use targets::{MultiTargetGenerator, TargetOutcome, TargetSet, TargetSpec};
