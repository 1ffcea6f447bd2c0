use std::fmt;

use crate::error::CoreError;
use crate::heap::HeapGraph;

use super::SerializerConfig;

/// Input to a backend.
pub struct BackendInput {
    /// The evaluated heap graph to materialize.
    pub graph: HeapGraph,
    pub config: SerializerConfig,
}

/// Counters describing the decisions one run made.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializationStats {
    /// Code blocks cloned per instance because they are tiny and scope-free.
    pub inlined_blocks: usize,
    /// Code blocks cloned per instance for any other reason.
    pub cloned_blocks: usize,
    /// Code blocks sharing one factory.
    pub factory_blocks: usize,
    /// Instances emitted as `factory.bind(null, ...)`.
    pub bind_stubs: usize,
    /// Instances emitted as `function () { return factory.call(this, ...) }`.
    pub call_stubs: usize,
    pub optimized_roots: usize,
    pub lazy_objects: usize,
    pub referentialized_scopes: usize,
}

impl fmt::Display for MaterializationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inlined, {} cloned, {} factories ({} bind, {} call stubs), {} roots, {} lazy objects, {} scopes",
            self.inlined_blocks,
            self.cloned_blocks,
            self.factory_blocks,
            self.bind_stubs,
            self.call_stubs,
            self.optimized_roots,
            self.lazy_objects,
            self.referentialized_scopes,
        )
    }
}

/// Output of a backend: the residual program text.
#[derive(Debug, Clone)]
pub struct BackendOutput {
    pub source: String,
    pub stats: MaterializationStats,
}

/// Backend trait: turns an evaluated heap graph into target source.
pub trait Backend {
    /// Name of this backend (e.g. "javascript").
    fn name(&self) -> &str;

    /// Materialize the heap graph.
    fn emit(&self, input: BackendInput) -> Result<BackendOutput, CoreError>;
}
