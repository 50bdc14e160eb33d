//! Chunk aggregation: turn per-attempt increments into caller-visible deltas.
//!
//! ## The watermark
//!
//! The aggregator tracks two texts. The *delivered* text is everything the
//! caller has already received as `Chunk` events; its length in characters is
//! the watermark, and it only ever grows. The *attempt* position counts how
//! many characters the current model attempt has produced so far.
//!
//! An increment's characters below the watermark were already delivered by an
//! earlier attempt and are suppressed; only the suffix beyond the watermark
//! becomes a delta. When an attempt fails, [`ChunkAggregator::begin_attempt`]
//! resets the attempt position to zero but keeps the delivered text, so a retry
//! that regenerates the document from the top re-emits nothing until it passes
//! the point the caller has already seen.
//!
//! ```text
//! attempt 1:  [The loan ag]  ✗ transport error
//! delivered:  The loan ag                      watermark = 11
//! attempt 2:  [The lo][an agreem][ent]
//! deltas:      —       "reem"     "ent"
//! ```

use crate::client::TextIncrement;
use crate::error::ModelError;
use tracing::warn;

/// New text to hand to the caller, with the progress estimate after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub text: String,
    /// Heuristic completion percentage, 0–99.
    pub progress: u8,
    /// 1-based count of deltas emitted so far in this session.
    pub chunk_index: u64,
}

/// Accumulates increments and computes deltas beyond the delivered watermark.
#[derive(Debug)]
pub struct ChunkAggregator {
    delivered: String,
    watermark: usize,
    expected_chars: usize,
    chunks_emitted: u64,

    // Per-attempt state, reset by `begin_attempt`.
    next_seq: u64,
    attempt_chars: usize,
    /// Byte offset into `delivered` matching `attempt_chars`, while the
    /// attempt still agrees with what was delivered.
    replay_cursor: Option<usize>,

    attempts: u32,
    divergent_attempts: u32,
}

impl ChunkAggregator {
    /// `expected_chars` is the output length at which progress would read 100%.
    pub fn new(expected_chars: usize) -> Self {
        Self {
            delivered: String::new(),
            watermark: 0,
            expected_chars: expected_chars.max(1),
            chunks_emitted: 0,
            next_seq: 0,
            attempt_chars: 0,
            replay_cursor: Some(0),
            attempts: 0,
            divergent_attempts: 0,
        }
    }

    /// Start a new model attempt. The in-flight buffer of the previous attempt
    /// is discarded; the delivered text and watermark are kept.
    pub fn begin_attempt(&mut self) {
        self.next_seq = 0;
        self.attempt_chars = 0;
        self.replay_cursor = Some(0);
        self.attempts += 1;
    }

    /// Accept the next increment of the current attempt.
    ///
    /// Returns the part of the increment beyond the watermark, or `None` when
    /// all of it was already delivered (or it was empty).
    ///
    /// # Errors
    /// [`ModelError::SequenceGap`] when `increment.seq` is not the next
    /// expected number. The attempt must be abandoned; the aggregator itself
    /// is left unchanged.
    pub fn accept(&mut self, increment: &TextIncrement) -> Result<Option<Delta>, ModelError> {
        if increment.seq != self.next_seq {
            return Err(ModelError::SequenceGap {
                expected: self.next_seq,
                got: increment.seq,
            });
        }
        self.next_seq += 1;

        let text = increment.text.as_str();
        let len = text.chars().count();
        let already_delivered = self.watermark.saturating_sub(self.attempt_chars).min(len);
        let split = text
            .char_indices()
            .nth(already_delivered)
            .map_or(text.len(), |(i, _)| i);
        let (replayed, fresh) = text.split_at(split);

        self.check_replay(replayed);
        self.attempt_chars += len;

        if fresh.is_empty() {
            return Ok(None);
        }

        self.delivered.push_str(fresh);
        self.watermark += len - already_delivered;
        self.chunks_emitted += 1;
        // Past the watermark the attempt is the delivered text by definition.
        self.replay_cursor = self.replay_cursor.map(|_| self.delivered.len());

        Ok(Some(Delta {
            text: fresh.to_string(),
            progress: self.progress(),
            chunk_index: self.chunks_emitted,
        }))
    }

    /// Compare replayed text against what was delivered; a retry that writes
    /// something different is logged once and counted.
    fn check_replay(&mut self, replayed: &str) {
        if replayed.is_empty() {
            return;
        }
        let Some(cursor) = self.replay_cursor else {
            return;
        };
        if self.delivered[cursor..].starts_with(replayed) {
            self.replay_cursor = Some(cursor + replayed.len());
        } else {
            self.replay_cursor = None;
            self.divergent_attempts += 1;
            warn!(
                "Attempt {} diverges from delivered text near char {}; keeping delivered text",
                self.attempts, self.attempt_chars
            );
        }
    }

    /// `min(99, round(100 * watermark / expected_chars))`.
    pub fn progress(&self) -> u8 {
        let pct = (100.0 * self.watermark as f64 / self.expected_chars as f64).round();
        pct.min(99.0) as u8
    }

    /// Characters delivered so far.
    pub fn watermark(&self) -> usize {
        self.watermark
    }

    /// The text delivered to the caller so far.
    pub fn delivered(&self) -> &str {
        &self.delivered
    }

    pub fn into_delivered(self) -> String {
        self.delivered
    }

    /// Characters the current attempt has produced, delivered or not.
    pub fn attempt_chars(&self) -> usize {
        self.attempt_chars
    }

    pub fn chunks_emitted(&self) -> u64 {
        self.chunks_emitted
    }

    /// Attempts started, including the current one.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Retries whose replayed prefix did not match the delivered text.
    pub fn divergent_attempts(&self) -> u32 {
        self.divergent_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inc(seq: u64, text: &str) -> TextIncrement {
        TextIncrement {
            seq,
            text: text.to_string(),
        }
    }

    fn feed(agg: &mut ChunkAggregator, parts: &[&str]) -> Vec<String> {
        parts
            .iter()
            .enumerate()
            .filter_map(|(i, p)| agg.accept(&inc(i as u64, p)).unwrap())
            .map(|d| d.text)
            .collect()
    }

    #[test]
    fn single_attempt_passes_everything_through() {
        let mut agg = ChunkAggregator::new(100);
        agg.begin_attempt();
        let deltas = feed(&mut agg, &["Hello ", "world"]);
        assert_eq!(deltas, vec!["Hello ", "world"]);
        assert_eq!(agg.delivered(), "Hello world");
        assert_eq!(agg.watermark(), 11);
        assert_eq!(agg.chunks_emitted(), 2);
    }

    #[test]
    fn retry_suppresses_delivered_prefix() {
        let mut agg = ChunkAggregator::new(100);
        agg.begin_attempt();
        feed(&mut agg, &["The loan", " ag"]);
        assert_eq!(agg.watermark(), 11);

        agg.begin_attempt();
        let deltas = feed(&mut agg, &["The lo", "an agreem", "ent"]);
        assert_eq!(deltas, vec!["reem", "ent"]);
        assert_eq!(agg.delivered(), "The loan agreement");
        assert_eq!(agg.divergent_attempts(), 0);
        assert_eq!(agg.attempts(), 2);
    }

    #[test]
    fn retry_that_stops_short_emits_nothing() {
        let mut agg = ChunkAggregator::new(100);
        agg.begin_attempt();
        feed(&mut agg, &["abcdef"]);
        agg.begin_attempt();
        assert!(feed(&mut agg, &["abc"]).is_empty());
        assert_eq!(agg.delivered(), "abcdef");
    }

    #[test]
    fn watermark_counts_characters_not_bytes() {
        let mut agg = ChunkAggregator::new(100);
        agg.begin_attempt();
        feed(&mut agg, &["ऋण "]);
        assert_eq!(agg.watermark(), 3);

        agg.begin_attempt();
        let deltas = feed(&mut agg, &["ऋण समझौता"]);
        assert_eq!(deltas, vec!["समझौता"]);
        assert_eq!(agg.delivered(), "ऋण समझौता");
    }

    #[test]
    fn sequence_gap_is_rejected_without_side_effects() {
        let mut agg = ChunkAggregator::new(100);
        agg.begin_attempt();
        agg.accept(&inc(0, "a")).unwrap();
        let err = agg.accept(&inc(2, "c")).unwrap_err();
        assert_eq!(
            err,
            ModelError::SequenceGap {
                expected: 1,
                got: 2
            }
        );
        assert_eq!(agg.delivered(), "a");
        // The expected number is unchanged; the attempt may not skip ahead.
        assert!(agg.accept(&inc(1, "b")).unwrap().is_some());
    }

    #[test]
    fn new_attempt_restarts_sequence_numbers() {
        let mut agg = ChunkAggregator::new(100);
        agg.begin_attempt();
        feed(&mut agg, &["x", "y"]);
        agg.begin_attempt();
        assert!(agg.accept(&inc(0, "xyz")).is_ok());
    }

    #[test]
    fn divergent_retry_is_counted_but_delivered_text_wins() {
        let mut agg = ChunkAggregator::new(100);
        agg.begin_attempt();
        feed(&mut agg, &["Dear customer"]);
        agg.begin_attempt();
        let deltas = feed(&mut agg, &["Dear Customer, hello"]);
        assert_eq!(deltas, vec![", hello"]);
        assert_eq!(agg.delivered(), "Dear customer, hello");
        assert_eq!(agg.divergent_attempts(), 1);
    }

    #[test]
    fn progress_is_capped_below_100() {
        let mut agg = ChunkAggregator::new(10);
        agg.begin_attempt();
        let d = agg.accept(&inc(0, "12345")).unwrap().unwrap();
        assert_eq!(d.progress, 50);
        let d = agg.accept(&inc(1, "123456789012345")).unwrap().unwrap();
        assert_eq!(d.progress, 99);
        assert_eq!(d.chunk_index, 2);
    }

    #[test]
    fn empty_increment_yields_nothing() {
        let mut agg = ChunkAggregator::new(10);
        agg.begin_attempt();
        assert_eq!(agg.accept(&inc(0, "")).unwrap(), None);
        assert_eq!(agg.chunks_emitted(), 0);
    }
}
