//! Resolution engine: candidate population, fragment-to-host attachment,
//! `uses` constraint checking with backtracking over candidate permutations,
//! dynamic (incremental) resolution, and wire graphs for display.

mod candidates;
pub mod conflict;
pub mod context;
mod dynamic;
pub mod error;
pub mod graph;
mod packages;
pub mod resolver;

pub use conflict::{ConflictSide, UsesConflict};
pub use context::{RepositoryContext, ResolveContext};
pub use error::{ResolutionError, UnresolvedRequirement};
pub use graph::WireGraph;
pub use resolver::Resolver;
