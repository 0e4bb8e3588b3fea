//! Data structures representing format components.
//!
//! Contains structured representations of labels, segment headers,
//! component descriptors, representation codes and decoded values, plus the
//! arena-backed object model and frame layouts built from them.

pub mod component;
pub mod frame;
pub mod label;
pub mod model;
pub mod rep_code;
pub mod segment;
pub mod value;
