//! Deterministic seeded synthesis.
//!
//! Each day gets a focus from a fixed rotation keyed on the number of
//! training days. Candidates are shuffled with a seeded RNG, then stably
//! sorted so exercises used less this week and compounds come first. The
//! day is filled in two passes (focus functions first, then anything not
//! already on the day) under the block cap and optional session time cap.
//! Emphasized muscles still missing at the end are patched in.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::Synthesizer;
use crate::allowed::AllowedList;
use crate::llm::StageResult;
use crate::model::{
    DayPlan, Exercise, ExerciseBlock, ExerciseId, ExerciseType, Mode, MovementFunction, Muscle,
    Plan, PlanMeta, SetScheme, UserProfile,
};

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Training focus of a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayFocus {
    FullBody,
    Upper,
    Lower,
    Push,
    Pull,
    Legs,
}

impl DayFocus {
    pub fn label(self) -> &'static str {
        match self {
            Self::FullBody => "Full Body",
            Self::Upper => "Upper Body",
            Self::Lower => "Lower Body",
            Self::Push => "Push",
            Self::Pull => "Pull",
            Self::Legs => "Legs",
        }
    }

    /// Movement functions that fill the day in the first pass.
    pub fn targets(self) -> &'static [MovementFunction] {
        use MovementFunction as F;
        match self {
            Self::Push => &[F::Push],
            Self::Pull => &[F::Pull],
            Self::Legs | Self::Lower => &[F::Legs, F::Core],
            Self::Upper => &[F::Push, F::Pull],
            Self::FullBody => &[F::FullBody, F::Legs, F::Push, F::Pull, F::Core],
        }
    }
}

impl fmt::Display for DayFocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Day foci for a week with `days` training days.
pub fn rotation(days: usize) -> Vec<DayFocus> {
    use DayFocus::*;
    match days {
        0 => Vec::new(),
        1 => vec![FullBody],
        2 => vec![Upper, Lower],
        3 => vec![Push, Pull, Legs],
        4 => vec![Upper, Lower, Upper, Lower],
        5 => vec![Push, Pull, Legs, Upper, Lower],
        n => {
            let mut week: Vec<DayFocus> = [Push, Pull, Legs, Push, Pull, Legs].to_vec();
            week.extend(std::iter::repeat_n(FullBody, n - 6));
            week
        }
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Build a plan locally. Total over any non-empty allowed list.
pub fn generate_local(allowed: &AllowedList<'_>, profile: &UserProfile, seed: u64) -> Plan {
    let mut rng = StdRng::seed_from_u64(seed);
    let scheme = profile.set_scheme();
    let mut uses: HashMap<&ExerciseId, usize> = HashMap::new();

    let mut days: Vec<DayPlan> = rotation(profile.days_per_week())
        .into_iter()
        .enumerate()
        .map(|(day_index, focus)| {
            let picked = pick_day(allowed, profile, &scheme, focus, &uses, &mut rng);
            for &exercise in &picked {
                *uses.entry(&exercise.id).or_insert(0) += 1;
            }
            DayPlan {
                day_index,
                label: focus.label().to_owned(),
                blocks: picked
                    .into_iter()
                    .map(|e| block_for(e, &scheme))
                    .collect(),
            }
        })
        .collect();

    place_emphasis(&mut days, allowed, profile, &scheme);

    tracing::debug!(
        seed,
        days = days.len(),
        blocks = days.iter().map(|d| d.blocks.len()).sum::<usize>(),
        "generated local plan"
    );

    Plan {
        days,
        meta: PlanMeta {
            seed,
            mode: Mode::Local,
            attempt_count: 0,
        },
    }
}

pub(crate) fn block_for(exercise: &Exercise, scheme: &SetScheme) -> ExerciseBlock {
    ExerciseBlock {
        exercise_id: exercise.id.clone(),
        set_scheme: scheme.clone(),
    }
}

fn type_rank(kind: ExerciseType) -> u8 {
    match kind {
        ExerciseType::Compound => 0,
        ExerciseType::Isolation => 1,
        ExerciseType::Other => 2,
    }
}

/// Tracks what a day holds while it is being filled.
struct DayFill<'a> {
    picked: Vec<&'a Exercise>,
    minutes: u32,
    max_blocks: usize,
    minutes_cap: Option<u32>,
}

impl<'a> DayFill<'a> {
    fn has_room(&self) -> bool {
        self.picked.len() < self.max_blocks
    }

    fn holds(&self, exercise: &Exercise) -> bool {
        self.picked.iter().any(|p| p.id == exercise.id)
    }

    fn holds_function(&self, function: MovementFunction) -> bool {
        self.picked.iter().any(|p| p.function == function)
    }

    /// Whether `exercise` can be added without breaking a cap. The first
    /// block of a day is always accepted.
    fn fits(&self, exercise: &Exercise, scheme: &SetScheme) -> bool {
        if !self.has_room() || self.holds(exercise) {
            return false;
        }
        match self.minutes_cap {
            Some(cap) if !self.picked.is_empty() => {
                self.minutes
                    .saturating_add(scheme.estimated_minutes(exercise.is_compound()))
                    <= cap
            }
            _ => true,
        }
    }

    fn push(&mut self, exercise: &'a Exercise, scheme: &SetScheme) {
        self.minutes = self
            .minutes
            .saturating_add(scheme.estimated_minutes(exercise.is_compound()));
        self.picked.push(exercise);
    }
}

fn pick_day<'a>(
    allowed: &AllowedList<'a>,
    profile: &UserProfile,
    scheme: &SetScheme,
    focus: DayFocus,
    uses: &HashMap<&ExerciseId, usize>,
    rng: &mut StdRng,
) -> Vec<&'a Exercise> {
    let mut candidates: Vec<&'a Exercise> = allowed.iter().collect();
    candidates.shuffle(rng);
    candidates.sort_by_key(|e| (uses.get(&e.id).copied().unwrap_or(0), type_rank(e.kind)));

    let mut day = DayFill {
        picked: Vec::new(),
        minutes: 0,
        max_blocks: profile.max_exercises_per_day(),
        minutes_cap: profile.session_minutes_cap(),
    };

    let targets = focus.targets();
    for &exercise in &candidates {
        if targets.contains(&exercise.function) && day.fits(exercise, scheme) {
            day.push(exercise, scheme);
        }
    }

    while day.has_room() {
        let fresh = candidates
            .iter()
            .copied()
            .find(|e| !day.holds_function(e.function) && day.fits(e, scheme));
        let next = fresh.or_else(|| candidates.iter().copied().find(|e| day.fits(e, scheme)));
        match next {
            Some(exercise) => day.push(exercise, scheme),
            None => break,
        }
    }

    day.picked
}

/// Patch in emphasized muscles the week does not train yet.
///
/// A block is appended to the first day with room (and time, under a
/// session cap) that lacks it; failing that, the last block of the first
/// day whose last exercise trains no emphasized muscle is replaced, as long
/// as the swap keeps that day within the cap. Muscles that cannot be placed
/// are left for the validator to report.
pub(crate) fn place_emphasis(
    days: &mut [DayPlan],
    allowed: &AllowedList<'_>,
    profile: &UserProfile,
    scheme: &SetScheme,
) {
    let emphasis = profile.emphasis();
    let cap = profile.max_exercises_per_day();
    let minutes_cap = profile.session_minutes_cap();
    let trains_emphasis = |id: &ExerciseId| {
        allowed
            .get(id)
            .is_some_and(|e| e.primary_muscles.iter().any(|m| emphasis.contains(m)))
    };
    let is_compound = |id: &ExerciseId| {
        allowed
            .catalog()
            .get(id)
            .is_some_and(Exercise::is_compound)
    };
    let within_cap = |minutes: u32| minutes_cap.is_none_or(|limit| minutes <= limit);

    for muscle in emphasis {
        if week_trains(days, allowed, muscle) {
            continue;
        }
        let Some(exercise) = allowed.iter().find(|e| e.trains(muscle)) else {
            tracing::debug!(%muscle, "no allowed exercise trains emphasized muscle");
            continue;
        };
        let added = scheme.estimated_minutes(exercise.is_compound());

        if let Some(day) = days.iter_mut().find(|d| {
            d.blocks.len() < cap
                && !d.contains(&exercise.id)
                && within_cap(d.estimated_minutes(is_compound).saturating_add(added))
        }) {
            day.blocks.push(block_for(exercise, scheme));
            continue;
        }

        let target = days.iter_mut().find(|d| {
            let Some(last) = d.blocks.last() else {
                return false;
            };
            if d.contains(&exercise.id) || trains_emphasis(&last.exercise_id) {
                return false;
            }
            let removed = last
                .set_scheme
                .estimated_minutes(is_compound(&last.exercise_id));
            let swapped = d
                .estimated_minutes(is_compound)
                .saturating_sub(removed)
                .saturating_add(added);
            d.blocks.len() == 1 || within_cap(swapped)
        });
        match target.and_then(|d| d.blocks.last_mut()) {
            Some(last) => *last = block_for(exercise, scheme),
            None => tracing::debug!(%muscle, "no day can take emphasized muscle"),
        }
    }
}

/// Whether any block in the week trains `muscle`, resolving through the
/// allowed list.
pub(crate) fn week_trains(days: &[DayPlan], allowed: &AllowedList<'_>, muscle: &Muscle) -> bool {
    days.iter()
        .flat_map(DayPlan::exercise_ids)
        .filter_map(|id| allowed.get(id))
        .any(|e| e.trains(muscle))
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// [`Synthesizer`] backed by [`generate_local`]. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSynthesizer;

#[async_trait]
impl Synthesizer for LocalSynthesizer {
    fn mode(&self) -> Mode {
        Mode::Local
    }

    async fn generate(
        &self,
        allowed: &AllowedList<'_>,
        profile: &UserProfile,
        seed: u64,
    ) -> StageResult<Plan> {
        StageResult::Ok(generate_local(allowed, profile, seed))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::allowed::filter;
    use crate::catalog::Catalog;
    use crate::model::Equipment;

    fn bodyweight(days: u8, max: u8) -> UserProfile {
        UserProfile::builder(days, max)
            .equipment([Equipment::Bodyweight])
            .build()
            .unwrap()
    }

    #[test]
    fn rotation_matches_day_count() {
        for days in 1..=7 {
            assert_eq!(rotation(days).len(), days);
        }
        assert_eq!(
            rotation(3),
            vec![DayFocus::Push, DayFocus::Pull, DayFocus::Legs]
        );
        assert_eq!(rotation(7)[6], DayFocus::FullBody);
        assert_eq!(rotation(1), vec![DayFocus::FullBody]);
    }

    #[test]
    fn same_seed_same_plan() {
        let catalog = Catalog::builtin();
        let profile = UserProfile::builder(5, 5)
            .equipment(Equipment::ALL)
            .build()
            .unwrap();
        let allowed = filter(&catalog, &profile).unwrap();
        assert_eq!(
            generate_local(&allowed, &profile, 99),
            generate_local(&allowed, &profile, 99)
        );
    }

    #[test]
    fn respects_structural_invariants() {
        let catalog = Catalog::builtin();
        for days in 1..=7u8 {
            let profile = bodyweight(days, 4);
            let allowed = filter(&catalog, &profile).unwrap();
            let plan = generate_local(&allowed, &profile, u64::from(days));
            assert_eq!(plan.days.len(), usize::from(days));
            assert_eq!(plan.meta.mode, Mode::Local);
            for (i, day) in plan.days.iter().enumerate() {
                assert_eq!(day.day_index, i);
                assert!(!day.blocks.is_empty());
                assert!(day.blocks.len() <= 4);
                let unique: HashSet<_> = day.exercise_ids().collect();
                assert_eq!(unique.len(), day.blocks.len(), "duplicate on day {i}");
                assert!(day.exercise_ids().all(|id| allowed.contains(id)));
            }
        }
    }

    #[test]
    fn focus_functions_fill_first() {
        let catalog = Catalog::builtin();
        let profile = bodyweight(3, 3);
        let allowed = filter(&catalog, &profile).unwrap();
        let plan = generate_local(&allowed, &profile, 1);
        assert_eq!(plan.days[0].label, "Push");
        // Three bodyweight push movements exist, so the push day is all push.
        for id in plan.days[0].exercise_ids() {
            assert_eq!(allowed.get(id).unwrap().function, MovementFunction::Push);
        }
    }

    #[test]
    fn session_cap_limits_blocks_but_keeps_one() {
        let catalog = Catalog::builtin();
        // Hypertrophy blocks take 6-7 minutes, so only one fits in 10.
        let profile = UserProfile::builder(3, 5)
            .equipment([Equipment::Bodyweight])
            .session_minutes_cap(10)
            .build()
            .unwrap();
        let allowed = filter(&catalog, &profile).unwrap();
        let plan = generate_local(&allowed, &profile, 3);
        for day in &plan.days {
            assert_eq!(day.blocks.len(), 1);
        }
    }

    #[test]
    fn emphasis_is_placed_when_possible() {
        let catalog = Catalog::builtin();
        let profile = UserProfile::builder(3, 2)
            .equipment([Equipment::Bodyweight])
            .emphasize("hip_flexors")
            .build()
            .unwrap();
        let allowed = filter(&catalog, &profile).unwrap();
        let plan = generate_local(&allowed, &profile, 11);
        assert!(week_trains(&plan.days, &allowed, &Muscle::new("hip_flexors")));
        assert!(plan.days.iter().all(|d| d.blocks.len() <= 2));
    }

    #[test]
    fn emphasis_respects_session_cap() {
        let catalog = Catalog::builtin();
        let profile = UserProfile::builder(3, 5)
            .equipment([Equipment::Bodyweight])
            .session_minutes_cap(10)
            .emphasize("hip_flexors")
            .build()
            .unwrap();
        let allowed = filter(&catalog, &profile).unwrap();
        let is_compound =
            |id: &ExerciseId| allowed.get(id).is_some_and(Exercise::is_compound);

        for seed in 0..10 {
            let plan = generate_local(&allowed, &profile, seed);
            for day in &plan.days {
                let minutes = day.estimated_minutes(is_compound);
                assert!(minutes <= 10, "seed {seed} day {}: {minutes} min", day.day_index);
                assert_eq!(day.blocks.len(), 1);
            }
            // Swapped in rather than appended.
            assert!(week_trains(&plan.days, &allowed, &Muscle::new("hip_flexors")));
        }
    }

    #[test]
    fn huge_rest_does_not_overflow() {
        let catalog = Catalog::builtin();
        let uncapped = UserProfile::builder(3, 4)
            .equipment([Equipment::Bodyweight])
            .rest_seconds(u32::MAX)
            .build()
            .unwrap();
        let allowed = filter(&catalog, &uncapped).unwrap();
        let plan = generate_local(&allowed, &uncapped, 2);
        assert!(plan.days.iter().all(|d| d.blocks.len() == 4));

        let capped = UserProfile::builder(3, 4)
            .equipment([Equipment::Bodyweight])
            .rest_seconds(u32::MAX)
            .session_minutes_cap(60)
            .emphasize("hip_flexors")
            .build()
            .unwrap();
        let plan = generate_local(&allowed, &capped, 2);
        // Only the guaranteed first block fits.
        assert!(plan.days.iter().all(|d| d.blocks.len() == 1));
    }

    #[test]
    fn uses_profile_set_scheme() {
        let catalog = Catalog::builtin();
        let profile = UserProfile::builder(2, 3)
            .equipment([Equipment::Bodyweight])
            .sets(4)
            .rest_seconds(45)
            .build()
            .unwrap();
        let allowed = filter(&catalog, &profile).unwrap();
        let plan = generate_local(&allowed, &profile, 5);
        for block in plan.days.iter().flat_map(|d| &d.blocks) {
            assert_eq!(block.set_scheme, profile.set_scheme());
            assert_eq!(block.set_scheme.sets, 4);
        }
    }

    #[tokio::test]
    async fn strategy_always_succeeds() {
        let catalog = Catalog::builtin();
        let profile = bodyweight(2, 2);
        let allowed = filter(&catalog, &profile).unwrap();
        let result = LocalSynthesizer.generate(&allowed, &profile, 8).await;
        assert!(matches!(result, StageResult::Ok(ref plan) if plan.days.len() == 2));
        assert_eq!(LocalSynthesizer.mode(), Mode::Local);
    }
}
