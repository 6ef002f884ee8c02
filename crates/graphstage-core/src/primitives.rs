//! # Fixed Constants
//!
//! Hardcoded limits and format identifiers for the graphstage core.
//! These are compiled into the binary and are immutable at runtime.

/// Magic bytes for the graphstage binary format header.
///
/// - Header = Magic Bytes ("GSTG") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"GSTG";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of a single term (64KB).
///
/// Longer terms are rejected at the API and CLI boundary.
pub const MAX_TERM_LENGTH: usize = 65536;

/// Maximum number of triples accepted in one request or script step.
pub const MAX_TRIPLES_PER_REQUEST: usize = 10000;
