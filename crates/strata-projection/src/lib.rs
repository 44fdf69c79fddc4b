//! Client-side speculative projection for Strata worlds.
//!
//! A client applies its own actions to a local copy of the world without
//! waiting for the server. [`SpeculativeProjection`] records how to undo
//! every such change on a [`ReverseStack`] and, when an authoritative
//! batch arrives, rolls the speculation back, applies the server's
//! updates and replays whatever the server has not confirmed yet.
//!
//! The projection is single-threaded and owned by its caller; changes are
//! reported through a [`ProjectionListener`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod listener;
pub mod projection;
pub mod reverse;

pub use listener::ProjectionListener;
pub use projection::SpeculativeProjection;
pub use reverse::{Operation, ReverseEntry, ReverseStack};
