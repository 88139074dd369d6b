// Symbolic filter-graph construction
//
// Nothing in this module touches the filesystem or spawns a process:
// - stream: inputs and immutable stream handles
// - filter: filter applications (single, multi-input, concat) and escaping
// - assemble: output spec and linearization into job arguments

pub mod assemble;
pub mod filter;
pub mod stream;

pub use assemble::{DeclaredInput, FilterStep, JobArguments, OutputOption, OutputSpec};
pub use filter::{concat, filter_multi, FilterNode, FilterParams};
pub use stream::{Input, InputOptions, InputSource, Stream, StreamKind};
