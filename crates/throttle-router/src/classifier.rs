// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic prompt complexity classification.
//!
//! Scores a prompt on five dimensions, combines them with configurable
//! weights into a composite score in `[0, 1]`, and buckets that score into a
//! [`Tier`]. No LLM pre-call, no network, no allocation beyond a lowercase copy.

use std::time::Instant;

use serde::Serialize;
use throttle_config::{ClassifierWeights, TierThresholds};
use throttle_core::Tier;

/// Characters at which the length dimension saturates.
const LENGTH_SATURATION_CHARS: f64 = 4000.0;

/// System prompt characters at which the system dimension saturates.
const SYSTEM_SATURATION_CHARS: f64 = 2000.0;

/// Prior turns at which the depth dimension saturates.
const DEPTH_SATURATION_TURNS: f64 = 10.0;

/// Distinct indicator hits at which a keyword dimension saturates.
const INDICATOR_SATURATION: f64 = 3.0;

/// Code indicator patterns (contains, case-sensitive).
const CODE_INDICATORS: &[&str] = &[
    "```", "def ", "fn ", "function ", "class ", "import ", "#include", "public static",
    "const ", "let ", "=>", "SELECT ", "impl ", "struct ", "return ", "async ",
];

/// Multi-step reasoning patterns (contains, case-insensitive).
const REASONING_INDICATORS: &[&str] = &[
    "analyze", "compare", "evaluate", "implement", "design",
    "architecture", "trade-off", "tradeoff", "pros and cons",
    "step by step", "explain in detail", "debug", "refactor",
    "code review", "write a function", "write code", "write a program",
    "optimize", "algorithm", "strategy", "in depth", "comprehensive",
    "prove", "derive", "why does", "reason about",
];

/// Request context the classifier considers besides the prompt text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyContext<'a> {
    /// User plus assistant turns in the conversation, including this one.
    pub message_count: usize,
    pub system_prompt: Option<&'a str>,
}

/// Per-dimension sub-scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DimensionScores {
    pub length: f64,
    pub code: f64,
    pub reasoning: f64,
    pub depth: f64,
    pub system: f64,
}

/// Complexity assessment of one request.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Classification {
    pub tier: Tier,
    pub composite_score: f64,
    pub dimensions: DimensionScores,
    /// Time spent classifying, in microseconds.
    pub elapsed_us: u64,
}

// Timing is measurement noise, not part of the assessment.
impl PartialEq for Classification {
    fn eq(&self, other: &Self) -> bool {
        self.tier == other.tier
            && self.composite_score == other.composite_score
            && self.dimensions == other.dimensions
    }
}

/// Classify a prompt.
///
/// Deterministic for identical inputs. Weights are normalized by their sum,
/// so they need not add up to one.
pub fn classify(
    text: &str,
    context: &ClassifyContext<'_>,
    weights: &ClassifierWeights,
    thresholds: &TierThresholds,
) -> Classification {
    let started = Instant::now();

    let dimensions = DimensionScores {
        length: saturate(text.chars().count() as f64, LENGTH_SATURATION_CHARS),
        code: saturate(count_hits(text, CODE_INDICATORS) as f64, INDICATOR_SATURATION),
        reasoning: saturate(
            count_hits(&text.to_lowercase(), REASONING_INDICATORS) as f64,
            INDICATOR_SATURATION,
        ),
        depth: saturate(
            context.message_count.saturating_sub(1) as f64,
            DEPTH_SATURATION_TURNS,
        ),
        system: saturate(
            context.system_prompt.map_or(0, |s| s.chars().count()) as f64,
            SYSTEM_SATURATION_CHARS,
        ),
    };

    let composite_score = composite(&dimensions, weights);
    let tier = tier_for_score(composite_score, thresholds);

    Classification {
        tier,
        composite_score,
        dimensions,
        elapsed_us: u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
    }
}

/// Bucket a composite score into a tier.
pub fn tier_for_score(score: f64, thresholds: &TierThresholds) -> Tier {
    if score >= thresholds.reasoning {
        Tier::Reasoning
    } else if score >= thresholds.complex {
        Tier::Complex
    } else if score >= thresholds.standard {
        Tier::Standard
    } else {
        Tier::Simple
    }
}

fn composite(d: &DimensionScores, w: &ClassifierWeights) -> f64 {
    let total = w.sum();
    if total <= 0.0 {
        return 0.0;
    }
    let weighted = d.length * w.length
        + d.code * w.code
        + d.reasoning * w.reasoning
        + d.depth * w.depth
        + d.system * w.system;
    (weighted / total).clamp(0.0, 1.0)
}

fn saturate(value: f64, at: f64) -> f64 {
    (value / at).min(1.0)
}

fn count_hits(haystack: &str, patterns: &[&str]) -> usize {
    patterns.iter().filter(|p| haystack.contains(*p)).count()
}
