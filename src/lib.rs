//! Persistence and edit-history core for a UML diagram editor.
//!
//! The crate owns two jobs and deliberately nothing else:
//!
//! * converting a live diagram graph to and from a versioned, record-based
//!   document ([`domains::uml::uml_serde`]), resolving object identity
//!   across that boundary with a per-operation [`IdentityRegistry`];
//! * expressing every structural edit as a reversible command, batched
//!   into atomically-undoable groups ([`domains::uml::uml_commands`]).
//!
//! Rendering, dialogs and toolbars live elsewhere; the core only consumes
//! already-decided values (positions, names, kinds) and produces or
//! consumes structured records.
//!
//! [`IdentityRegistry`]: domains::uml::uml_serde::IdentityRegistry

pub mod common;
pub mod domains;

pub use common::entity::{EntityUuid, ModelUuid, ViewUuid};
pub use common::eref::ERef;
pub use common::geometry::{Pos2, Rect, Vec2, pos2, vec2};
