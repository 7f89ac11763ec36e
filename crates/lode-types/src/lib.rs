//! Foundation types for Lode.
//!
//! This crate provides the types shared between the Lode object store and
//! the transfer layer that drives it: content identifiers, descriptors, and
//! the streaming digest used to verify uploads.
//!
//! # Key Types
//!
//! - [`Oid`] — Content-addressed identifier (lowercase-hex SHA-256 digest)
//! - [`OidHasher`] — Incremental digest accumulator for streaming writes
//! - [`ContentDescriptor`] — Caller-supplied expected identifier and size

pub mod descriptor;
pub mod error;
pub mod oid;

pub use descriptor::ContentDescriptor;
pub use error::TypeError;
pub use oid::{Oid, OidHasher, OID_HEX_LEN};
