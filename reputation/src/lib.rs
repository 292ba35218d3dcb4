//! The reputation publisher (component C5): turns closure results into
//! best-effort external reputation/validation events, each wrapped in a
//! failure-isolating boundary so one bad publish never aborts the rest
//! of an epoch close.

use std::collections::BTreeSet;

use chaoschain_runtime::interfaces::{ReputationInterface, ValidationInterface};
use chaoschain_runtime::{feedback_idempotence_key, h, AccountId, Hash32, WorkId};
use log::warn;

/// Fixed universal PoA dimension tags, in the same order as the
/// universal consensus dimensions.
pub const UNIVERSAL_DIMENSION_TAGS: [&str; 5] =
    ["INITIATIVE", "COLLABORATION", "REASONING_DEPTH", "COMPLIANCE", "EFFICIENCY"];

const VALIDATOR_ACCURACY_TAG: &str = "VALIDATOR_ACCURACY";
const CONSENSUS_MATCH_TAG: &str = "CONSENSUS_MATCH";
const CHAOSCHAIN_CONSENSUS_TAG: &str = "CHAOSCHAIN_CONSENSUS";
const ENGINE_ENDPOINT: &str = "CHAOSCHAIN_VERIFICATION_ENGINE";

/// One (worker, work, dimension) feedback event.
#[derive(Debug, Clone)]
pub struct WorkerDimensionEvent {
    pub work_id: WorkId,
    pub worker: AccountId,
    pub studio_id: AccountId,
    pub dimension_tag: String,
    pub score: u8,
    pub evidence_pointer: String,
}

/// One (validator, work) accuracy event.
#[derive(Debug, Clone)]
pub struct ValidatorAccuracyEvent {
    pub work_id: WorkId,
    pub validator: AccountId,
    pub perf: u8,
}

/// One per-work validation-summary event.
#[derive(Debug, Clone)]
pub struct ConsensusSummaryEvent {
    pub work_id: WorkId,
    pub mean_universal_score: u8,
}

/// Publishes reputation/validation events, deduplicating by the hash
/// rules' idempotence key so a retried epoch close never republishes
/// an event it already sent.
#[derive(Default)]
pub struct Publisher {
    published: BTreeSet<Hash32>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes one feedback event per universal/custom dimension for
    /// a (worker, work) pair with a non-default consensus result.
    pub fn publish_worker_dimension(
        &mut self,
        reputation: &mut dyn ReputationInterface,
        event: &WorkerDimensionEvent,
    ) {
        let key = feedback_idempotence_key(&event.work_id, &event.worker, &event.dimension_tag, event.score);
        if !self.published.insert(key) {
            return;
        }
        let studio_tag = event.studio_id.to_string();
        let content_hash = h(&[event.evidence_pointer.as_bytes()]);
        if let Err(err) = reputation.give_feedback(
            event.worker,
            event.score,
            &event.dimension_tag,
            &studio_tag,
            ENGINE_ENDPOINT,
            &event.evidence_pointer,
            content_hash,
        ) {
            warn!(
                "reputation publish failed for worker {} work {} dimension {}: {err}",
                event.worker, event.work_id, event.dimension_tag
            );
        }
    }

    /// Publishes the validator accuracy event for one (validator, work)
    /// pair.
    pub fn publish_validator_accuracy(
        &mut self,
        reputation: &mut dyn ReputationInterface,
        event: &ValidatorAccuracyEvent,
    ) {
        let key =
            feedback_idempotence_key(&event.work_id, &event.validator, VALIDATOR_ACCURACY_TAG, event.perf);
        if !self.published.insert(key) {
            return;
        }
        if let Err(err) = reputation.give_feedback(
            event.validator,
            event.perf,
            VALIDATOR_ACCURACY_TAG,
            CONSENSUS_MATCH_TAG,
            ENGINE_ENDPOINT,
            "",
            Hash32::ZERO,
        ) {
            warn!(
                "reputation publish failed for validator {} work {}: {err}",
                event.validator, event.work_id
            );
        }
    }

    /// Publishes one validation-summary event per work.
    pub fn publish_consensus_summary(
        &mut self,
        validation: &mut dyn ValidationInterface,
        event: &ConsensusSummaryEvent,
    ) {
        let key = h(&[CHAOSCHAIN_CONSENSUS_TAG.as_bytes(), &event.work_id.0]);
        if !self.published.insert(key) {
            return;
        }
        let request_hash = Hash32::new(event.work_id.0);
        if let Err(err) = validation.validation_response(
            request_hash,
            event.mean_universal_score,
            "",
            Hash32::ZERO,
            CHAOSCHAIN_CONSENSUS_TAG,
        ) {
            warn!("validation summary publish failed for work {}: {err}", event.work_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaoschain_runtime::EngineError;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingReputation {
        calls: RefCell<Vec<(AccountId, u8, String, String)>>,
        fail_next: bool,
    }

    impl ReputationInterface for RecordingReputation {
        fn give_feedback(
            &mut self,
            target: AccountId,
            score: u8,
            tag1: &str,
            tag2: &str,
            _endpoint: &str,
            _uri: &str,
            _content_hash: Hash32,
        ) -> Result<(), EngineError> {
            if self.fail_next {
                return Err(EngineError::external("simulated failure"));
            }
            self.calls.borrow_mut().push((target, score, tag1.to_string(), tag2.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingValidation {
        calls: RefCell<Vec<(Hash32, u8, String)>>,
    }

    impl ValidationInterface for RecordingValidation {
        fn validation_response(
            &mut self,
            request_hash: Hash32,
            score: u8,
            _uri: &str,
            _hash: Hash32,
            tag: &str,
        ) -> Result<(), EngineError> {
            self.calls.borrow_mut().push((request_hash, score, tag.to_string()));
            Ok(())
        }
    }

    #[test]
    fn worker_dimension_event_is_published_once_on_retry() {
        let mut publisher = Publisher::new();
        let mut reputation = RecordingReputation::default();
        let event = WorkerDimensionEvent {
            work_id: WorkId::new([1u8; 32]),
            worker: AccountId::new([2u8; 20]),
            studio_id: AccountId::new([3u8; 20]),
            dimension_tag: UNIVERSAL_DIMENSION_TAGS[0].to_string(),
            score: 80,
            evidence_pointer: "ipfs://evidence".to_string(),
        };
        publisher.publish_worker_dimension(&mut reputation, &event);
        publisher.publish_worker_dimension(&mut reputation, &event);
        assert_eq!(reputation.calls.borrow().len(), 1);
    }

    #[test]
    fn publish_failure_is_swallowed() {
        let mut publisher = Publisher::new();
        let mut reputation = RecordingReputation { fail_next: true, ..Default::default() };
        let event = ValidatorAccuracyEvent {
            work_id: WorkId::new([1u8; 32]),
            validator: AccountId::new([9u8; 20]),
            perf: 97,
        };
        // Must not panic even though give_feedback fails.
        publisher.publish_validator_accuracy(&mut reputation, &event);
        assert!(reputation.calls.borrow().is_empty());
    }

    #[test]
    fn consensus_summary_binds_work_id() {
        let mut publisher = Publisher::new();
        let mut validation = RecordingValidation::default();
        let work_id = WorkId::new([5u8; 32]);
        publisher.publish_consensus_summary(
            &mut validation,
            &ConsensusSummaryEvent { work_id, mean_universal_score: 77 },
        );
        let calls = validation.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0 .0, work_id.0);
        assert_eq!(calls[0].1, 77);
        assert_eq!(calls[0].2, "CHAOSCHAIN_CONSENSUS");
    }
}
