#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod filter;
pub mod hcl;
pub mod naming;
pub mod resource;

pub use filter::{FilterError, NameFilter};
pub use hcl::{render_block, HclBlock, HclValue, RenderOptions};
pub use naming::{short_hash, NameRegistry};
pub use resource::{ResourceDescriptor, ResourceKey, ResourceKind};
