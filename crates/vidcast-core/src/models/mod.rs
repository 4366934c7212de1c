//! Data models for the pipeline
//!
//! Each sub-module covers one part of the upload/publish flow: stored assets,
//! access capabilities, encode jobs, the rendition ladder, publish results and
//! the HTTP request/response bodies.

mod access;
mod api;
mod asset;
mod job;
mod publish;
mod rendition;

pub use access::*;
pub use api::*;
pub use asset::*;
pub use job::*;
pub use publish::*;
pub use rendition::*;
