//! Fragmentation engine: turns one raw generator reply into a burst of
//! 1..=4 short chat messages.
//!
//! Steps, in order:
//! 1. split the reply on newlines, drop blank lines, keep at most
//!    `max_fragments`;
//! 2. a lone fragment longer than `split_threshold_chars` is cut after its
//!    first sentence; a lone fragment that cannot be cut may get a stock
//!    follow-up;
//! 3. a two-fragment burst may get a stock third fragment;
//! 4. every fragment without an emoji gets one appended.

use marianna_types::persona::{MAX_BURST_FRAGMENTS, PersonaPolicy};
use rand::Rng;
use rand::seq::IndexedRandom;

use super::emoji::has_expressive_symbol;

const DEFAULT_EMOJI: &str = "💜";

pub struct FragmentEngine<'a> {
    policy: &'a PersonaPolicy,
}

impl<'a> FragmentEngine<'a> {
    pub fn new(policy: &'a PersonaPolicy) -> Self {
        Self { policy }
    }

    /// Split a raw reply into a burst. Never returns an empty burst.
    pub fn fragment<R: Rng>(&self, raw: &str, rng: &mut R) -> Vec<String> {
        let policy = self.policy;

        let mut fragments: Vec<String> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(policy.effective_max_fragments())
            .map(str::to_string)
            .collect();

        if fragments.len() == 1 {
            let single = fragments[0].clone();
            match split_first_sentence(&single, policy.split_threshold_chars) {
                Some((first, rest)) => fragments = vec![first, rest],
                None => {
                    if rng.random::<f64>() < policy.follow_up_probability {
                        if let Some(follow_up) = pick(&policy.follow_up_pool, rng) {
                            fragments.push(follow_up);
                        }
                    }
                }
            }
        }

        if fragments.len() == 2 && rng.random::<f64>() < policy.third_fragment_probability {
            if let Some(third) = pick(&policy.third_fragment_pool, rng) {
                fragments.push(third);
            }
        }

        if fragments.is_empty() {
            fragments.push(self.last_resort());
        }

        fragments.truncate(MAX_BURST_FRAGMENTS);
        fragments
            .into_iter()
            .map(|fragment| self.ensure_expressive(fragment, rng))
            .collect()
    }

    /// The burst sent when generation failed outright.
    pub fn fallback(&self) -> Vec<String> {
        let mut burst: Vec<String> = self
            .policy
            .fallback_fragments
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .take(MAX_BURST_FRAGMENTS)
            .map(str::to_string)
            .collect();

        if burst.is_empty() {
            burst.push(self.last_resort());
        }
        burst
    }

    fn last_resort(&self) -> String {
        let text = self.policy.last_resort_fragment.trim();
        if text.is_empty() {
            DEFAULT_EMOJI.to_string()
        } else {
            text.to_string()
        }
    }

    fn ensure_expressive<R: Rng>(&self, fragment: String, rng: &mut R) -> String {
        if has_expressive_symbol(&fragment) {
            return fragment;
        }
        let emoji = pick(&self.policy.emoji_pool, rng).unwrap_or_else(|| DEFAULT_EMOJI.to_string());
        format!("{fragment} {emoji}")
    }
}

/// Pick a random non-blank entry from a pool.
fn pick<R: Rng>(pool: &[String], rng: &mut R) -> Option<String> {
    let usable: Vec<&str> = pool
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    usable.choose(rng).map(|s| s.to_string())
}

/// Cut `text` after its first sentence when it is longer than `threshold`
/// chars and the cut leaves a non-empty remainder.
///
/// Sentence terminators (`.`, `!`, `?`, in runs like `...` or `?!`) stay
/// with the sentence they end.
fn split_first_sentence(text: &str, threshold: usize) -> Option<(String, String)> {
    if text.chars().count() <= threshold {
        return None;
    }

    let mut in_terminator_run = false;
    for (idx, c) in text.char_indices() {
        let is_terminator = matches!(c, '.' | '!' | '?');
        if in_terminator_run && !is_terminator {
            let (first, rest) = text.split_at(idx);
            let (first, rest) = (first.trim(), rest.trim());
            if !first.is_empty() && !rest.is_empty() {
                return Some((first.to_string(), rest.to_string()));
            }
            return None;
        }
        in_terminator_run = is_terminator;
    }
    None
}
