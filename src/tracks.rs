//! Per-track completion: one resolution strategy per [`TrackKind`].
//!
//! [`TrackKind`]: crate::catalog::TrackKind

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::catalog::{RequirementsCatalog, ResolvedTrack, TrackRequirement};
use crate::error::{Error, Result};
use crate::metrics::{compute_cgpa, deduplicate};
use crate::models::{CourseRecord, TrackStatus};

fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    done as f64 / total as f64
}

fn electives(count: u32) -> &'static str {
    if count == 1 {
        "elective"
    } else {
        "electives"
    }
}

/// Every required course must appear among the completed codes.
pub fn exact_match(required: &BTreeSet<String>, completed: &BTreeSet<&str>) -> (f64, Vec<String>) {
    let outstanding: Vec<String> = required
        .iter()
        .filter(|code| !completed.contains(code.as_str()))
        .cloned()
        .collect();
    let done = required.len() - outstanding.len();
    (fraction(done, required.len()), outstanding)
}

/// A prefix is satisfied by any completed code that starts with it.
pub fn prefix_match(prefixes: &BTreeSet<String>, completed: &BTreeSet<&str>) -> (f64, Vec<String>) {
    let outstanding: Vec<String> = prefixes
        .iter()
        .filter(|prefix| !completed.iter().any(|code| code.starts_with(prefix.as_str())))
        .cloned()
        .collect();
    let done = prefixes.len() - outstanding.len();
    (fraction(done, prefixes.len()), outstanding)
}

/// Compulsory courses plus elective counts at level 3000 and level 4000+.
///
/// Quotas arrive in credits and are converted to elective counts with
/// `credits_per_elective`, rounding up.
pub fn tiered_major(
    track: &str,
    required: &BTreeSet<String>,
    level_3000_credits: u32,
    level_4000_credits: u32,
    completed: &[&CourseRecord],
    credits_per_elective: u32,
) -> (f64, Vec<String>) {
    let codes: BTreeSet<&str> = completed
        .iter()
        .map(|record| record.module_code.as_str())
        .collect();
    let (_, mut outstanding) = exact_match(required, &codes);
    let required_done = required.len() - outstanding.len();

    let per_elective = credits_per_elective.max(1);
    let needed_3000 = level_3000_credits.div_ceil(per_elective);
    let needed_4000 = level_4000_credits.div_ceil(per_elective);

    let (taken_3000, taken_4000) = completed
        .iter()
        .filter(|record| !required.contains(&record.module_code))
        .fold((0_u32, 0_u32), |(l3, l4), record| match record.level() {
            Some(3) => (l3 + 1, l4),
            Some(level) if level >= 4 => (l3, l4 + 1),
            _ => (l3, l4),
        });

    let missing_3000 = needed_3000.saturating_sub(taken_3000);
    let missing_4000 = needed_4000.saturating_sub(taken_4000);
    if missing_3000 > 0 {
        outstanding.push(format!(
            "{missing_3000} more level-3000 {track} {}",
            electives(missing_3000)
        ));
    }
    if missing_4000 > 0 {
        outstanding.push(format!(
            "{missing_4000} more level-4000 {track} {}",
            electives(missing_4000)
        ));
    }

    let done = required_done + taken_3000.min(needed_3000) as usize + taken_4000.min(needed_4000) as usize;
    let total = required.len() + needed_3000 as usize + needed_4000 as usize;
    (fraction(done, total), outstanding)
}

/// Completed credits over required credits, uncapped.
pub fn flat_quota(track: &str, required_credits: u32, completed_credits: u32) -> (f64, Vec<String>) {
    let completion = if required_credits == 0 {
        1.0
    } else {
        f64::from(completed_credits) / f64::from(required_credits)
    };
    let gap = required_credits.saturating_sub(completed_credits);
    let outstanding = if gap > 0 {
        vec![format!("{gap} more {track} credits")]
    } else {
        Vec::new()
    };
    (completion, outstanding)
}

pub fn residual_bucket(track: &str, required_count: u32, completed_count: u32) -> (f64, Vec<String>) {
    let completion = fraction(completed_count as usize, required_count as usize);
    let remaining = required_count.saturating_sub(completed_count);
    let outstanding = if remaining > 0 {
        vec![format!("{remaining} more {track} {}", electives(remaining))]
    } else {
        Vec::new()
    };
    (completion, outstanding)
}

/// Resolve every track present in `records`, plus the residual bucket when
/// anything lands in it.
///
/// `tracks` must hold a resolution for every `module_type` in `records`;
/// a missing one is a configuration error.
pub fn compute_progress(
    records: &[CourseRecord],
    tracks: &BTreeMap<String, ResolvedTrack>,
    catalog: &RequirementsCatalog,
    main_specialization: Option<&str>,
) -> Result<BTreeMap<String, TrackStatus>> {
    let credited: Vec<&CourseRecord> = deduplicate(records)
        .into_iter()
        .filter(|record| record.grade.earns_credit())
        .collect();
    let tags: BTreeSet<&str> = records
        .iter()
        .map(|record| record.module_type.as_str())
        .collect();

    let mut status = BTreeMap::new();

    for tag in tags {
        let track = tracks
            .get(tag)
            .ok_or_else(|| Error::UnknownTrack(tag.to_string()))?;
        let completed: Vec<&CourseRecord> = credited
            .iter()
            .copied()
            .filter(|record| record.module_type == tag)
            .collect();
        let codes: BTreeSet<&str> = completed
            .iter()
            .map(|record| record.module_code.as_str())
            .collect();

        let (completion, outstanding) = match &track.requirement {
            TrackRequirement::Core { required_courses } => exact_match(required_courses, &codes),
            TrackRequirement::GePillar { required_prefixes } => {
                prefix_match(required_prefixes, &codes)
            }
            TrackRequirement::TieredMajor {
                required_courses,
                level_3000_credits,
                level_4000_credits,
            } => tiered_major(
                tag,
                required_courses,
                *level_3000_credits,
                *level_4000_credits,
                &completed,
                catalog.credits_per_elective,
            ),
            TrackRequirement::FlatQuota { required_credits } => {
                let credits = completed.iter().map(|record| record.units).sum();
                flat_quota(tag, *required_credits, credits)
            }
            // Filled below from every folded track.
            TrackRequirement::Residual { .. } => continue,
        };

        let members: Vec<CourseRecord> = records
            .iter()
            .filter(|record| record.module_type == tag)
            .cloned()
            .collect();
        debug!(track = tag, kind = ?track.kind(), completion, "resolved track");
        status.insert(
            tag.to_string(),
            TrackStatus {
                completion,
                outstanding,
                track_cgpa: compute_cgpa(&members),
            },
        );
    }

    if let Some((residual_tag, required_count)) = residual_requirement(catalog) {
        let in_bucket = |record: &CourseRecord| {
            record.module_type == residual_tag
                || tracks
                    .get(&record.module_type)
                    .is_some_and(|track| track.folds_into_residual(main_specialization))
        };

        let bucket: Vec<CourseRecord> = records.iter().filter(|r| in_bucket(*r)).cloned().collect();
        if !bucket.is_empty() {
            let count = credited.iter().filter(|record| in_bucket(**record)).count() as u32;
            debug!(track = residual_tag, count, "folded unrestricted electives");
            let (completion, outstanding) = residual_bucket(residual_tag, required_count, count);
            status.insert(
                residual_tag.to_string(),
                TrackStatus {
                    completion,
                    outstanding,
                    track_cgpa: compute_cgpa(&bucket),
                },
            );
        }
    }

    Ok(status)
}

fn residual_requirement(catalog: &RequirementsCatalog) -> Option<(&str, u32)> {
    catalog
        .tracks
        .iter()
        .find_map(|(tag, requirement)| match requirement {
            TrackRequirement::Residual { required_count } => Some((tag.as_str(), *required_count)),
            _ => None,
        })
}
