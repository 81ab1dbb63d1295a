//! Humanoid rig import and skeleton/blend-shape deformation separation (unofficial).
//!
//! Builds a joint hierarchy from a bone description and a base mesh, resolves skin weights,
//! imports sparse morph targets, and removes the skeleton-induced part of each target's
//! offsets so skeletal posing and blend shapes compose without double-counting.
//!
//! This crate is scene-agnostic. The command-line driver lives in `humanrig-cli`.

#![forbid(unsafe_code)]

mod error;
mod ident;
mod mesh;
mod model;
mod modifier;
mod rig;
mod runtime;
mod skin;
mod target;

#[cfg(feature = "json")]
mod json;

pub use error::*;
pub use ident::*;
pub use mesh::*;
pub use model::*;
pub use modifier::*;
pub use rig::*;
pub use runtime::*;
pub use skin::*;
pub use target::*;




#[cfg(test)]
mod skin_tests;


#[cfg(test)]
mod modifier_tests;
