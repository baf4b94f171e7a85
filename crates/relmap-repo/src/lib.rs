//! Repository layer for relmap.
//!
//! `relmap-repo` is the **persistence layer**: it turns reads, changesets and
//! preload paths into calls on an [`Adapter`], cascading writes across
//! associations in dependency order.
//!
//! # Role In The Architecture
//!
//! - **Adapter contract**: [`Adapter`] is the only seam to a storage backend.
//!   It receives [`Query`](relmap_query::Query) values and association-free
//!   [`Changeset`](relmap_core::Changeset)s and never sees records.
//! - **Repository**: [`Repository`] offers find/insert/update/delete,
//!   batched preloading and transactions over caller-owned records.
//! - **Orchestration**: belongs-to parents are written before their owner,
//!   has-one and has-many children after it, with foreign keys stamped along
//!   the way.
//!
//! All calls are synchronous; blocking happens only inside the adapter.

pub mod adapter;
mod orchestrator;
mod preload;
pub mod repository;

pub use adapter::Adapter;
pub use repository::{Repository, RepositoryConfig};
