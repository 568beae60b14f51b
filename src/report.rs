use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::engine::ProgressEngine;
use crate::metrics::{compute_cgpa, deduplicate};
use crate::models::{CourseRecord, ProgressSnapshot, TrackGpaSummary};

pub fn summarize_by_track(records: &[CourseRecord]) -> Vec<TrackGpaSummary> {
    let mut groups: BTreeMap<&str, Vec<CourseRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.module_type.as_str())
            .or_default()
            .push(record.clone());
    }

    let mut summaries: Vec<TrackGpaSummary> = groups
        .into_iter()
        .map(|(track, members)| TrackGpaSummary {
            track: track.to_string(),
            module_count: deduplicate(&members).len(),
            cgpa: compute_cgpa(&members),
        })
        .collect();

    summaries.sort_by(|a, b| b.cgpa.partial_cmp(&a.cgpa).unwrap_or(std::cmp::Ordering::Equal));
    summaries
}

fn signed(delta: f64) -> String {
    if delta > 0.0 {
        format!("+{delta:.2}")
    } else {
        format!("{delta:.2}")
    }
}

/// Short plain-text rendering of a snapshot for the terminal.
pub fn format_summary(snapshot: &ProgressSnapshot, graduation_credits: u32) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Credits: {} / {} ({:.1}%)",
        snapshot.total_units,
        graduation_credits,
        snapshot.completion_rate.min(100.0)
    );
    let _ = writeln!(
        output,
        "CGPA: {:.2} ({} vs full transcript)",
        snapshot.cgpa,
        signed(snapshot.cgpa_delta)
    );
    let _ = writeln!(
        output,
        "Year of study: {} ({} to go)",
        snapshot.current_year, snapshot.years_remaining
    );
    let _ = writeln!(output, "S/U credits remaining: {}", snapshot.su_quota.remaining);
    let _ = writeln!(output, "Tracks:");
    for (track, status) in &snapshot.track_status {
        let _ = writeln!(
            output,
            "- {} {:.2}% (GPA {:.2})",
            track,
            status.percent(),
            status.track_cgpa
        );
        if !status.outstanding.is_empty() {
            let _ = writeln!(output, "  outstanding: {}", status.outstanding.join(", "));
        }
    }

    output
}

pub fn build_report(engine: &ProgressEngine<'_>, generated_on: NaiveDate) -> String {
    let mut output = String::new();
    let main_label = engine.main_specialization().unwrap_or("none selected");

    let _ = writeln!(output, "# Academic Progress Report");
    let _ = writeln!(
        output,
        "Generated on {} (main specialisation: {})",
        generated_on, main_label
    );
    let _ = writeln!(output);

    let (Some(snapshot), Some(records)) = (engine.snapshot(), engine.view()) else {
        let _ = writeln!(output, "No data available for the current track selection.");
        return output;
    };

    let _ = writeln!(output, "## Overall Metrics");
    let _ = writeln!(
        output,
        "- Total credits: {} of {} ({:.1}% complete)",
        snapshot.total_units,
        engine.catalog().graduation_credits,
        snapshot.completion_rate.min(100.0)
    );
    let _ = writeln!(
        output,
        "- Cumulative GPA: {:.2} ({})",
        snapshot.cgpa,
        signed(snapshot.cgpa_delta)
    );
    let _ = writeln!(
        output,
        "- Year of study: {} ({} year(s) to go)",
        snapshot.current_year, snapshot.years_remaining
    );
    let _ = writeln!(
        output,
        "- S/U credits remaining: {}",
        snapshot.su_quota.remaining
    );
    if snapshot.su_quota.overdrawn > 0 {
        let _ = writeln!(
            output,
            "- S/U allowance exceeded by {} credits",
            snapshot.su_quota.overdrawn
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Track Completion");
    if snapshot.track_status.is_empty() {
        let _ = writeln!(output, "No tracks in this view.");
    } else {
        for (track, status) in &snapshot.track_status {
            let _ = writeln!(output, "- {}: {:.2}%", track, status.percent());
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Outstanding Requirements");
    let outstanding: Vec<_> = snapshot
        .track_status
        .iter()
        .filter(|(_, status)| !status.outstanding.is_empty())
        .collect();
    if outstanding.is_empty() {
        let _ = writeln!(output, "Nothing outstanding for the selected tracks.");
    } else {
        for (track, status) in outstanding {
            let _ = writeln!(output, "- {}: {}", track, status.outstanding.join(", "));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## GPA by Track");
    for summary in summarize_by_track(records) {
        let _ = writeln!(
            output,
            "- {}: {:.2} across {} modules",
            summary.track, summary.cgpa, summary.module_count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## CGPA by Term");
    for term in &snapshot.cgpa_by_term {
        let _ = writeln!(
            output,
            "- {}: {:.2} ({})",
            term.label,
            term.cgpa,
            signed(term.delta)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Distribution");
    for (grade, count) in snapshot
        .grade_distribution
        .iter()
        .filter(|(_, count)| **count > 0)
    {
        let _ = writeln!(output, "- {}: {}", grade, count);
    }

    output
}
