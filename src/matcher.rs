use crate::storage::IdentityRecord;
use facematch_vision::{error::Result, Embedding, PixelScale, VisionError};
use log::debug;
use serde::Serialize;

/// Threshold policy: a score equal to the threshold is a match.
#[inline]
pub fn decide(similarity: f32, threshold: f32) -> bool {
    similarity >= threshold
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub similarity: f32,
    pub threshold: f32,
    pub matched: bool,
}

/// Compare a stored embedding with a fresh query.
///
/// Both sides are normalized again right before the comparison so records
/// written by older builds compare the same way as new ones.
pub fn compare(stored: &[f32], query: &[f32], threshold: f32) -> Result<MatchOutcome> {
    let stored = Embedding::normalize(stored);
    let query = Embedding::normalize(query);
    let similarity = stored.similarity(&query)?;
    debug!("similarity {:.4} against threshold {:.4}", similarity, threshold);
    Ok(MatchOutcome {
        similarity,
        threshold,
        matched: decide(similarity, threshold),
    })
}

/// Embeddings from different pixel scales live in different spaces.
fn check_scale(record: &IdentityRecord, scale: PixelScale) -> Result<()> {
    if record.pixel_scale != scale {
        return Err(VisionError::ScaleMismatch {
            enrolled: record.pixel_scale,
            query: scale,
        });
    }
    Ok(())
}

/// Compare an enrolled record with a query embedding computed under `scale`.
pub fn compare_record(
    record: &IdentityRecord,
    query: &[f32],
    scale: PixelScale,
    threshold: f32,
) -> Result<MatchOutcome> {
    check_scale(record, scale)?;
    compare(&record.embedding, query, threshold)
}

/// Highest-scoring record for `query`. A dimension or scale mismatch on any
/// record fails the whole search.
pub fn best_match<'a>(
    records: &'a [IdentityRecord],
    query: &[f32],
    scale: PixelScale,
    threshold: f32,
) -> Result<Option<(&'a IdentityRecord, MatchOutcome)>> {
    let mut best: Option<(&IdentityRecord, MatchOutcome)> = None;
    for record in records {
        let outcome = compare_record(record, query, scale, threshold)?;
        match best {
            Some((_, b)) if b.similarity >= outcome.similarity => {}
            _ => best = Some((record, outcome)),
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, embedding: Vec<f32>, pixel_scale: PixelScale) -> IdentityRecord {
        IdentityRecord {
            id,
            key: format!("person_{}", id),
            name: format!("Person {}", id),
            embedding,
            pixel_scale,
        }
    }

    #[test]
    fn test_decide_boundary() {
        assert!(decide(0.6, 0.6));
        assert!(decide(0.61, 0.6));
        assert!(!decide(0.59, 0.6));
        assert!(decide(1.0, 1.0));
        assert!(!decide(0.0, 0.6));
    }

    #[test]
    fn test_enroll_then_compare_self() {
        let enrolled = Embedding::normalize(&[3.0, 4.0]);
        assert!((enrolled.as_slice()[0] - 0.6).abs() < 1e-6);
        assert!((enrolled.as_slice()[1] - 0.8).abs() < 1e-6);

        let outcome = compare(enrolled.as_slice(), &[3.0, 4.0], 0.6).unwrap();
        assert!((outcome.similarity - 1.0).abs() < 1e-6);
        assert!(outcome.matched);
    }

    #[test]
    fn test_orthogonal_does_not_match() {
        let outcome = compare(&[1.0, 0.0], &[0.0, 1.0], 0.6).unwrap();
        assert!(outcome.similarity.abs() < 1e-6);
        assert!(!outcome.matched);
    }

    #[test]
    fn test_dimension_mismatch_is_not_a_non_match() {
        let stored = vec![0.05; 512];
        let query = vec![0.05; 511];
        let err = compare(&stored, &query, 0.6).unwrap_err();
        assert!(matches!(err, VisionError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_zero_query_scores_zero() {
        let outcome = compare(&[1.0, 2.0], &[0.0, 0.0], 0.0).unwrap();
        assert_eq!(outcome.similarity, 0.0);
        assert!(outcome.matched);
    }

    #[test]
    fn test_compare_record_checks_scale() {
        let enrolled = record(1, vec![0.6, 0.8], PixelScale::Unit);
        let outcome = compare_record(&enrolled, &[3.0, 4.0], PixelScale::Unit, 0.6).unwrap();
        assert!(outcome.matched);

        let err = compare_record(&enrolled, &[3.0, 4.0], PixelScale::Symmetric, 0.6).unwrap_err();
        assert!(matches!(
            err,
            VisionError::ScaleMismatch {
                enrolled: PixelScale::Unit,
                query: PixelScale::Symmetric,
            }
        ));
    }

    #[test]
    fn test_best_match() {
        let records = vec![
            record(1, vec![1.0, 0.0], PixelScale::Symmetric),
            record(2, vec![1.0, 1.0], PixelScale::Symmetric),
            record(3, vec![0.0, 1.0], PixelScale::Symmetric),
        ];
        let (found, best) = best_match(&records, &[1.0, 0.9], PixelScale::Symmetric, 0.6)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, 2);
        assert!(best.similarity > 0.99);
        assert!(best.matched);

        assert!(best_match(&[], &[1.0], PixelScale::Symmetric, 0.6).unwrap().is_none());
    }

    #[test]
    fn test_best_match_rejects_mixed_scales() {
        let records = vec![
            record(1, vec![1.0, 0.0], PixelScale::Symmetric),
            record(2, vec![1.0, 1.0], PixelScale::Unit),
        ];
        let err = best_match(&records, &[1.0, 0.9], PixelScale::Symmetric, 0.6).unwrap_err();
        assert_eq!(err.kind(), facematch_vision::ErrorKind::ScaleMismatch);
    }
}
