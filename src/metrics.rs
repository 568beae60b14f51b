//! Grade-point and credit metrics over a set of transcript rows.
//!
//! Every function here accepts an empty slice and returns a zero value.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::catalog::SuPolicy;
use crate::models::{CourseRecord, Grade, SuQuota, TermCgpa};

/// Round to `decimals` places with ties going away from zero, so that
/// `2.345` becomes `2.35` rather than the `2.34` banker's rounding gives.
///
/// The value goes through its shortest decimal representation first; the
/// binary expansion of `2.345` sits just below the midpoint.
pub fn round_half_up(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .map(|d| d.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Drop exact duplicate rows, then collapse repeated attempts of the same
/// module under the same track to the most recent one.
///
/// The result is in chronological order.
pub fn deduplicate(records: &[CourseRecord]) -> Vec<&CourseRecord> {
    let mut seen_rows = HashSet::new();
    let mut rows: Vec<&CourseRecord> = records
        .iter()
        .filter(|record| seen_rows.insert(*record))
        .collect();

    rows.sort_by_key(|record| Reverse(record.term()));
    let mut seen_modules = HashSet::new();
    let mut kept: Vec<&CourseRecord> = rows
        .into_iter()
        .filter(|&record| {
            seen_modules.insert((
                record.module_code.as_str(),
                record.module_title.as_str(),
                record.units,
                record.module_type.as_str(),
            ))
        })
        .collect();

    kept.sort_by_key(|record| record.term());
    kept
}

/// Credits earned (or in progress) after de-duplication.
pub fn compute_total_credits(records: &[CourseRecord]) -> u32 {
    deduplicate(records)
        .into_iter()
        .filter(|record| record.grade.earns_credit())
        .map(|record| record.units)
        .sum()
}

/// Unit-weighted grade-point average over graded rows, rounded half-up to
/// two places.
pub fn compute_cgpa(records: &[CourseRecord]) -> f64 {
    let graded: Vec<CourseRecord> = records
        .iter()
        .filter(|record| record.grade.is_graded())
        .cloned()
        .collect();

    let (weighted, units) = deduplicate(&graded)
        .into_iter()
        .fold((0.0_f64, 0_u32), |(weighted, units), record| {
            (
                weighted + record.grade_points() * f64::from(record.units),
                units + record.units,
            )
        });

    if units == 0 {
        return 0.0;
    }
    round_half_up(weighted / f64::from(units), 2)
}

/// Share of the graduation credit target, as a percentage to one place.
pub fn compute_completion_rate(records: &[CourseRecord], graduation_credits: u32) -> f64 {
    if graduation_credits == 0 {
        return 0.0;
    }
    let earned = f64::from(compute_total_credits(records));
    round_half_up(earned / f64::from(graduation_credits) * 100.0, 1)
}

pub fn current_year(records: &[CourseRecord]) -> u32 {
    records.iter().map(|record| record.year).max().unwrap_or(0)
}

/// Pass/fail credits consumed against the two-tier allowance.
///
/// While the student is in year one the whole first-year pool is available.
/// From year two on only the carried-over remainder (capped) plus any
/// later-year pool can be drawn.
pub fn compute_su_quota(records: &[CourseRecord], policy: &SuPolicy) -> SuQuota {
    let rows = deduplicate(records);
    let year = rows.iter().map(|record| record.year).max().unwrap_or(0);

    let (first_year_used, later_used) = rows
        .iter()
        .filter(|record| record.grade.is_pass_fail())
        .fold((0_u32, 0_u32), |(first, later), record| {
            if record.year <= 1 {
                (first + record.units, later)
            } else {
                (first, later + record.units)
            }
        });

    let first_year_overdrawn = first_year_used.saturating_sub(policy.first_year_credits);
    let unused = policy.first_year_credits.saturating_sub(first_year_used);

    if year <= 1 {
        return SuQuota {
            first_year_used,
            carried_forward: 0,
            later_used,
            remaining: unused,
            overdrawn: first_year_overdrawn,
        };
    }

    let carried_forward = unused.min(policy.carry_over_cap);
    let allowance = carried_forward + policy.later_year_credits;
    SuQuota {
        first_year_used,
        carried_forward,
        later_used,
        remaining: allowance.saturating_sub(later_used),
        overdrawn: first_year_overdrawn + later_used.saturating_sub(allowance),
    }
}

/// Row count per grade, zero-filled over the full scale.
pub fn grade_distribution(records: &[CourseRecord]) -> BTreeMap<Grade, usize> {
    let mut distribution: BTreeMap<Grade, usize> =
        Grade::ALL.into_iter().map(|grade| (grade, 0)).collect();
    for record in records {
        *distribution.entry(record.grade).or_insert(0) += 1;
    }
    distribution
}

/// Cumulative CGPA after each term, with the change from the term before.
pub fn cgpa_trajectory(records: &[CourseRecord]) -> Vec<TermCgpa> {
    let terms: BTreeSet<u32> = records.iter().map(CourseRecord::term).collect();
    let mut trajectory = Vec::with_capacity(terms.len());
    let mut previous: Option<f64> = None;

    for term in terms {
        let upto: Vec<CourseRecord> = records
            .iter()
            .filter(|record| record.term() <= term)
            .cloned()
            .collect();
        let cgpa = compute_cgpa(&upto);
        let delta = match previous {
            Some(prev) => round_half_up(cgpa - prev, 2),
            None => cgpa,
        };
        trajectory.push(TermCgpa {
            term,
            label: format!("Y{}S{}", term / 10, term % 10),
            cgpa,
            delta,
        });
        previous = Some(cgpa);
    }

    trajectory
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn course(code: &str, year: u32, semester: u32, units: u32, grade: Grade) -> CourseRecord {
        CourseRecord {
            module_code: code.to_string(),
            module_title: format!("{code} title"),
            year,
            semester,
            units,
            module_type: "BBA-CORE".to_string(),
            grade,
        }
    }

    #[test]
    fn rounds_half_up_not_to_even() {
        assert_eq!(round_half_up(2.345, 2), 2.35);
        assert_eq!(round_half_up(2.5, 0), 3.0);
        assert_eq!(round_half_up(4.125, 2), 4.13);
        assert_eq!(round_half_up(-0.125, 2), -0.13);
        assert_eq!(round_half_up(4.0, 2), 4.0);
    }

    #[test]
    fn empty_sets_produce_zeroes() {
        assert_eq!(compute_total_credits(&[]), 0);
        assert_eq!(compute_cgpa(&[]), 0.0);
        assert_eq!(compute_completion_rate(&[], 160), 0.0);
        assert_eq!(current_year(&[]), 0);
        assert!(cgpa_trajectory(&[]).is_empty());
        assert_eq!(
            compute_su_quota(&[], &SuPolicy::default()).remaining,
            32
        );
    }

    #[test]
    fn cgpa_of_core_and_ge_course() {
        let mut ge = course("GEA1000", 1, 1, 4, Grade::BPlus);
        ge.module_type = "GE".to_string();
        let records = vec![course("ACC1701", 1, 1, 4, Grade::A), ge];
        assert_eq!(compute_total_credits(&records), 8);
        assert_eq!(compute_cgpa(&records), 4.5);
    }

    #[test]
    fn cgpa_is_zero_when_nothing_is_graded() {
        let records = vec![
            course("ACC1701", 1, 1, 4, Grade::S),
            course("BSP1702", 1, 2, 4, Grade::InProgress),
        ];
        assert_eq!(compute_cgpa(&records), 0.0);
        assert_eq!(compute_total_credits(&records), 8);
    }

    #[test]
    fn retakes_keep_latest_attempt() {
        let records = vec![
            course("FIN2704", 1, 2, 4, Grade::F),
            course("FIN2704", 2, 1, 4, Grade::B),
        ];
        assert_eq!(compute_total_credits(&records), 4);
        assert_eq!(compute_cgpa(&records), 3.5);
    }

    #[test]
    fn failed_modules_earn_no_credit_but_count_in_cgpa() {
        let records = vec![
            course("ACC1701", 1, 1, 4, Grade::A),
            course("BSP1702", 1, 1, 4, Grade::F),
        ];
        assert_eq!(compute_total_credits(&records), 4);
        assert_eq!(compute_cgpa(&records), 2.5);
    }

    #[test]
    fn completion_rate_is_uncapped_percentage() {
        let records: Vec<CourseRecord> = (0..41)
            .map(|i| course(&format!("MOD{i:04}"), 4, 1, 4, Grade::B))
            .collect();
        assert_eq!(compute_completion_rate(&records, 160), 102.5);
    }

    #[test]
    fn su_quota_carries_capped_remainder_forward() {
        let policy = SuPolicy::default();
        let records = vec![
            course("ACC1701", 1, 1, 4, Grade::S),
            course("BSP1702", 1, 2, 4, Grade::S),
            course("FIN2704", 2, 1, 4, Grade::S),
            course("MKT1705", 2, 1, 4, Grade::S),
            course("MNO2705", 2, 2, 4, Grade::U),
        ];
        let quota = compute_su_quota(&records, &policy);
        assert_eq!(quota.first_year_used, 8);
        assert_eq!(quota.carried_forward, 12);
        assert_eq!(quota.later_used, 12);
        assert_eq!(quota.remaining, 0);
        assert_eq!(quota.overdrawn, 0);
    }

    #[test]
    fn su_quota_exhausted_in_first_year_leaves_nothing_later() {
        let policy = SuPolicy::default();
        let mut records: Vec<CourseRecord> = (0..8)
            .map(|i| course(&format!("Y1M{i}"), 1, 1 + i % 2, 4, Grade::S))
            .collect();
        let quota = compute_su_quota(&records, &policy);
        assert_eq!(quota.first_year_used, 32);
        assert_eq!(quota.remaining, 0);

        records.push(course("Y2M0", 2, 1, 4, Grade::A));
        let quota = compute_su_quota(&records, &policy);
        assert_eq!(quota.carried_forward, 0);
        assert_eq!(quota.remaining, 0);
    }

    #[test]
    fn su_quota_with_no_usage() {
        let policy = SuPolicy::default();
        let year_one = vec![course("ACC1701", 1, 1, 4, Grade::A)];
        assert_eq!(compute_su_quota(&year_one, &policy).remaining, 32);

        let year_two = vec![
            course("ACC1701", 1, 1, 4, Grade::A),
            course("FIN2704", 2, 1, 4, Grade::A),
        ];
        let quota = compute_su_quota(&year_two, &policy);
        assert_eq!(quota.carried_forward, 12);
        assert_eq!(quota.remaining, 12);
    }

    #[test]
    fn su_quota_reports_overdraw() {
        let policy = SuPolicy::default();
        let records = vec![
            course("ACC1701", 1, 1, 4, Grade::A),
            course("FIN2704", 2, 1, 8, Grade::S),
            course("MKT3401", 3, 1, 8, Grade::S),
        ];
        let quota = compute_su_quota(&records, &policy);
        assert_eq!(quota.remaining, 0);
        assert_eq!(quota.overdrawn, 4);
    }

    #[test]
    fn grade_distribution_is_zero_filled() {
        let records = vec![
            course("ACC1701", 1, 1, 4, Grade::A),
            course("BSP1702", 1, 1, 4, Grade::A),
            course("DAO1704", 1, 2, 4, Grade::S),
        ];
        let distribution = grade_distribution(&records);
        assert_eq!(distribution.len(), Grade::ALL.len());
        assert_eq!(distribution[&Grade::A], 2);
        assert_eq!(distribution[&Grade::S], 1);
        assert_eq!(distribution[&Grade::F], 0);
    }

    #[test]
    fn trajectory_tracks_cumulative_cgpa_per_term() {
        let records = vec![
            course("ACC1701", 1, 1, 4, Grade::A),
            course("BSP1702", 1, 2, 4, Grade::B),
            course("DAO2702", 2, 1, 4, Grade::B),
        ];
        let trajectory = cgpa_trajectory(&records);
        let labels: Vec<&str> = trajectory.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["Y1S1", "Y1S2", "Y2S1"]);
        assert_eq!(trajectory[0].cgpa, 5.0);
        assert_eq!(trajectory[0].delta, 5.0);
        assert_eq!(trajectory[1].cgpa, 4.25);
        assert_eq!(trajectory[1].delta, -0.75);
        assert_eq!(trajectory[2].cgpa, 4.0);
        assert_eq!(trajectory[2].delta, -0.25);
    }

    fn arb_grade() -> impl Strategy<Value = Grade> {
        prop::sample::select(Grade::ALL.to_vec())
    }

    fn arb_record() -> impl Strategy<Value = CourseRecord> {
        (
            prop::sample::select(vec!["ACC1701", "FIN3101", "GEA1000", "MKT4401", "IS1128"]),
            1_u32..=4,
            1_u32..=2,
            prop::sample::select(vec![2_u32, 4, 6, 8]),
            prop::sample::select(vec!["BBA-CORE", "GE", "BBA-FIN", "UE"]),
            arb_grade(),
        )
            .prop_map(|(code, year, semester, units, module_type, grade)| CourseRecord {
                module_code: code.to_string(),
                module_title: format!("{code} title"),
                year,
                semester,
                units,
                module_type: module_type.to_string(),
                grade,
            })
    }

    proptest! {
        #[test]
        fn exact_duplicates_do_not_change_totals(
            records in prop::collection::vec(arb_record(), 0..12),
            pick in any::<prop::sample::Index>(),
        ) {
            prop_assume!(!records.is_empty());
            let mut doubled = records.clone();
            doubled.push(records[pick.index(records.len())].clone());
            prop_assert_eq!(compute_total_credits(&doubled), compute_total_credits(&records));
            prop_assert_eq!(compute_cgpa(&doubled), compute_cgpa(&records));
        }

        #[test]
        fn ungraded_rows_do_not_move_cgpa(
            records in prop::collection::vec(arb_record(), 0..12),
            grade in prop::sample::select(vec![Grade::S, Grade::U, Grade::InProgress, Grade::NoGrade]),
        ) {
            let mut extended = records.clone();
            extended.push(CourseRecord {
                module_code: "SU9999".to_string(),
                module_title: "Pass fail elective".to_string(),
                year: 2,
                semester: 1,
                units: 4,
                module_type: "UE".to_string(),
                grade,
            });
            prop_assert_eq!(compute_cgpa(&extended), compute_cgpa(&records));
        }

        #[test]
        fn cgpa_stays_on_scale(records in prop::collection::vec(arb_record(), 0..16)) {
            let cgpa = compute_cgpa(&records);
            prop_assert!((0.0..=5.0).contains(&cgpa));
        }
    }
}
