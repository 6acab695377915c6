pub mod graph;
pub mod pipeline;
pub mod resolver;
pub mod scanner;
pub mod summary;

pub use graph::{DependencyGraph, Edge, EdgeMetadata, GraphDocument, NodeMetadata, RankBy};
pub use pipeline::{ExtractionPipeline, FileError, FileErrorKind};
pub use resolver::{ImportPathResolver, Resolution};
pub use scanner::{FileInfo, FileScanner};
pub use summary::DependencySummary;
