//! Checksums of screening results, used to audit that reruns are identical.

use sha2::{Digest, Sha256};

use crate::core::error::PipelineResult;
use crate::preprocessing::pipeline::VisitScreening;

/// Calculate the SHA-256 checksum of arbitrary content.
///
/// # Returns
/// Hexadecimal string representation of the SHA-256 hash.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Checksum of the canonical JSON form of a visit's screening result.
///
/// Candidates keep their screening order and rejections are keyed by object
/// id in ascending order, so identical inputs give identical digests.
pub fn screening_digest(screening: &VisitScreening) -> PipelineResult<String> {
    let canonical = serde_json::to_string(screening)?;
    Ok(calculate_checksum(&canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Band, ObjectId, RejectionReason, VisitId};
    use crate::preprocessing::pipeline::VisitOutcome;
    use std::collections::BTreeMap;

    fn screening(reason: RejectionReason) -> VisitScreening {
        let mut rejections = BTreeMap::new();
        rejections.insert(ObjectId(3), reason);
        rejections.insert(ObjectId(1), RejectionReason::TooDim);
        VisitScreening {
            visit: VisitId(100),
            band: Band::Nuv,
            outcome: VisitOutcome::Screened,
            candidates: Vec::new(),
            rejections,
        }
    }

    #[test]
    fn test_checksum_consistency() {
        let content = r#"{"test": "data"}"#;
        assert_eq!(calculate_checksum(content), calculate_checksum(content));
        assert_eq!(calculate_checksum(content).len(), 64);
    }

    #[test]
    fn test_digest_is_stable() {
        let a = screening_digest(&screening(RejectionReason::SpikyFine)).unwrap();
        let b = screening_digest(&screening(RejectionReason::SpikyFine)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_tracks_reasons() {
        let a = screening_digest(&screening(RejectionReason::SpikyFine)).unwrap();
        let b = screening_digest(&screening(RejectionReason::SpikyCrude)).unwrap();
        assert_ne!(a, b);
    }
}
