//! Scalar types used when decoding binary file formats.
//!
//! Binary formats store multi-byte integers in a fixed byte order that rarely
//! matches the host's. This crate provides the [`Scalar`] trait, which pairs
//! each fixed-width integer with its raw byte representation and conversions
//! for both byte orders, plus checked helpers for reading scalars out of
//! untrusted byte slices.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

mod raw;

pub use raw::{ByteOrder, Scalar};
