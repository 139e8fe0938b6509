//! Join resolution between TriplesMaps
//!
//! Parent maps populate a [`ParentJoinStore`] while they stream; child maps
//! buffer their join keys in the [`JoinResolver`]. Lookups run only after
//! the parent stream is exhausted.

mod resolver;
mod store;

pub use resolver::{ChildEntry, JoinId, JoinPhase, JoinResolver, JoinSpec};
pub use store::{key_tuples, JoinKey, ParentJoinStore};
