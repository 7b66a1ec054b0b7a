//! Core data types for the image transformation proxy.
//!
//! A request resolves to exactly one [`directive::TransformDirective`]; the
//! bytes flowing through the pipeline travel as [`payload::ImagePayload`].
//! Nothing here outlives a single request.

pub mod directive;
pub mod payload;
