//! Error types and error handling for the compiler.
//!
//! Every semantic violation is fatal: the first one detected aborts the pass
//! and is returned as an [`errors::Error`] carrying:
//!
//! - The failure itself as an [`errors::ErrorImpl`] variant, with the offending
//!   construct and the types involved printed into it
//! - The source position of the construct
//! - An optional suggestion for the user

pub mod errors;
