//! Models module for the loader
//!
//! Typed top-level records reconstructed from the XML sources. Every field
//! the source may omit is an `Option`; identifiers are the non-negative
//! numeric ids carried by the record's `id` attribute.

pub mod client;
pub mod film;
pub mod person;

pub use client::{Client, PaymentCard};
pub use film::{Director, Film, Role};
pub use person::Person;
