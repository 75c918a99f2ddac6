use crate::game::judgment::HitRating;
use serde::Serialize;

pub const SCORE_PERFECT: u64 = 100;
pub const SCORE_GOOD: u64 = 50;

// Multiplier grows by 0.1 every COMBO_STEP consecutive hits, capped at 2.0.
// Kept in tenths so score arithmetic stays exact.
pub const COMBO_STEP: u32 = 10;
pub const COMBO_MAX_MULT: f64 = 2.0;
const MULT_BASE_TENTHS: u64 = 10;
const MULT_MAX_TENTHS: u64 = 20;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RatingCounts {
    pub perfect: u32,
    pub good: u32,
    pub miss: u32,
}

impl RatingCounts {
    #[inline(always)]
    pub const fn judged(&self) -> u32 {
        self.perfect + self.good + self.miss
    }
}

/// Score and combo state of one session.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScoreTally {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub stats: RatingCounts,
}

#[inline(always)]
pub const fn points_for(rating: HitRating) -> u64 {
    match rating {
        HitRating::Perfect => SCORE_PERFECT,
        HitRating::Good => SCORE_GOOD,
    }
}

#[inline(always)]
const fn multiplier_tenths(combo: u32) -> u64 {
    let steps = (combo / COMBO_STEP) as u64;
    let tenths = MULT_BASE_TENTHS + steps;
    if tenths > MULT_MAX_TENTHS {
        MULT_MAX_TENTHS
    } else {
        tenths
    }
}

/// `min(1 + floor(combo / 10) * 0.1, 2.0)`
#[inline(always)]
pub fn combo_multiplier(combo: u32) -> f64 {
    multiplier_tenths(combo) as f64 / 10.0
}

/// `round(points * multiplier)`, rounding halves up.
#[inline(always)]
pub const fn scaled_points(points: u64, combo: u32) -> u64 {
    (points * multiplier_tenths(combo) + 5) / 10
}

/// Applies one resolved hit. `None` is the silent-consume case and changes nothing.
pub fn apply_rating(tally: ScoreTally, rating: Option<HitRating>) -> ScoreTally {
    let Some(rating) = rating else {
        return tally;
    };
    let mut next = tally;
    next.combo = next.combo.saturating_add(1);
    next.score = next
        .score
        .saturating_add(scaled_points(points_for(rating), next.combo));
    next.max_combo = next.max_combo.max(next.combo);
    match rating {
        HitRating::Perfect => next.stats.perfect = next.stats.perfect.saturating_add(1),
        HitRating::Good => next.stats.good = next.stats.good.saturating_add(1),
    }
    next
}

/// Applies a batch of notes missed in the same sweep: one combo break for the whole batch.
pub fn apply_miss_batch(tally: ScoreTally, missed: u32) -> ScoreTally {
    if missed == 0 {
        return tally;
    }
    let mut next = tally;
    next.combo = 0;
    next.stats.miss = next.stats.miss.saturating_add(missed);
    next
}

/// Score of an all-perfect run over `note_count` notes.
pub fn max_possible_score(note_count: usize) -> u64 {
    let mut tally = ScoreTally::default();
    for _ in 0..note_count {
        tally = apply_rating(tally, Some(HitRating::Perfect));
    }
    tally.score
}

/// Fraction (0.0–1.0) of the best achievable score.
pub fn score_percent(tally: &ScoreTally, note_count: usize) -> f64 {
    let possible = max_possible_score(note_count);
    if possible == 0 {
        return 0.0;
    }
    (tally.score as f64 / possible as f64).clamp(0.0, 1.0)
}
