//! Shared vocabulary for tracking console resources until they settle.
//!
//! Console resources (credentials, clusters, namespace claims, services) are
//! provisioned asynchronously by the backend: a resource is created in a
//! pending state and later moves to a terminal state, or disappears. This
//! crate describes that shape without committing to any particular status
//! vocabulary or transport:
//!
//! - [`Tracked`] exposes a resource's identity and optional status;
//! - [`Classify`] maps a family's status values onto [`Terminal`] states;
//! - [`FetchResource`] re-reads a resource by identity, returning `None` once
//!   it no longer exists.
//!
//! ```text
//! [ FetchResource ] -> [ Tracked ] -> [ Classify ] -> Option<Terminal>
//! ```

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod fetch;
mod resource_id;
mod terminal;


pub use self::{
    fetch::{FetchFn, FetchResource},
    resource_id::ResourceId,
    terminal::{Classify, Outcome, Terminal, TerminalStates},
};
use std::fmt;

/// The latest known server state of a single console resource.
pub trait Tracked: Send + Sync + 'static {
    /// The key used to re-fetch the resource.
    type Id: Clone + fmt::Display + Send + Sync + 'static;

    /// The resource family's status vocabulary.
    type Status: fmt::Display + Send + Sync + 'static;

    fn identity(&self) -> Self::Id;

    /// Returns the resource's status, or `None` if the backend has not yet
    /// observed it.
    fn status(&self) -> Option<&Self::Status>;

    /// Human-readable details carried on the resource's status conditions.
    fn status_detail(&self) -> Vec<String> {
        Vec::new()
    }
}
