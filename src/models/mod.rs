//! Core data models for the gallery service.
//!
//! These entities describe the photo records held inside the gallery
//! document and the fixed contact details exposed at the site boundary.
//! They serialize naturally as JSON via `serde`.

pub mod photo;
pub mod site;
