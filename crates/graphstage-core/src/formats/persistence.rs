//! # Persistence Format
//!
//! Binary serialization for graphstage graphs.
//!
//! Format: Header (5 bytes) + postcard-serialized `Graph`.
//! - 4 bytes: Magic ("GSTG")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is decoded, so corrupt
//! or oversized input fails fast without allocating for it.

use crate::graph::Graph;
use crate::{StageError, primitives};

/// Maximum allowed payload size (500 MB).
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024;

const HEADER_LEN: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The persistence header precedes all graph data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate magic bytes and version.
    pub fn validate(&self) -> Result<(), StageError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(StageError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(StageError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StageError> {
        match bytes {
            [m0, m1, m2, m3, version, ..] => Ok(Self {
                magic: [*m0, *m1, *m2, *m3],
                version: *version,
            }),
            _ => Err(StageError::DeserializationError(format!(
                "Data too short: minimum {} bytes required",
                HEADER_LEN
            ))),
        }
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a graph to bytes (header + payload). No file I/O.
pub fn graph_to_bytes(graph: &Graph) -> Result<Vec<u8>, StageError> {
    let payload =
        postcard::to_stdvec(graph).map_err(|e| StageError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a graph from bytes. No file I/O.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<Graph, StageError> {
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(StageError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_LEN..).unwrap_or_default();
    postcard::from_bytes(payload).map_err(|e| {
        StageError::DeserializationError(format!("Failed to decode graph data: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GraphName, Triple};

    fn sample() -> Graph {
        Graph::with_triples(
            GraphName::named("urn:people"),
            [
                Triple::new("ex:alice", "ex:knows", "ex:bob"),
                Triple::new("ex:bob", "ex:name", "\"Bob\""),
            ],
        )
    }

    #[test]
    fn header_is_written_first() {
        let bytes = graph_to_bytes(&sample()).expect("serialize");
        assert_eq!(&bytes[0..4], primitives::MAGIC_BYTES);
        assert_eq!(bytes[4], primitives::FORMAT_VERSION);
    }

    #[test]
    fn bytes_are_stable_across_reload() {
        let bytes1 = graph_to_bytes(&sample()).expect("first serialize");
        let restored = graph_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = graph_to_bytes(&restored).expect("second serialize");

        assert_eq!(restored, sample());
        assert_eq!(bytes1, bytes2, "save -> load -> save must be bit-exact");
    }

    #[test]
    fn default_graph_survives_encoding() {
        let graph = Graph::with_triples(GraphName::Default, [Triple::new("s", "p", "o")]);
        let restored = graph_from_bytes(&graph_to_bytes(&graph).expect("serialize"))
            .expect("deserialize");
        assert!(restored.name().is_default());
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            graph_from_bytes(&bytes),
            Err(StageError::DeserializationError(_))
        ));
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = graph_to_bytes(&sample()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(graph_from_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_input_rejected() {
        assert!(graph_from_bytes(b"GST").is_err());

        let bytes = graph_to_bytes(&sample()).expect("serialize");
        assert!(graph_from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }
}
