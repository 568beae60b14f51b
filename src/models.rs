use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Letter grades plus the zero-valued pass/fail and pending markers.
///
/// Variants are declared in scale order, so sorting grades yields the order a
/// transcript prints them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "F")]
    F,
    /// Satisfactory (pass) under the S/U option
    #[serde(rename = "S")]
    S,
    /// Unsatisfactory (fail) under the S/U option
    #[serde(rename = "U")]
    U,
    /// Module currently being taken
    #[serde(rename = "IP")]
    InProgress,
    /// Grade not yet released
    #[serde(rename = "NG")]
    NoGrade,
}

impl Grade {
    pub const ALL: [Grade; 15] = [
        Grade::APlus,
        Grade::A,
        Grade::AMinus,
        Grade::BPlus,
        Grade::B,
        Grade::BMinus,
        Grade::CPlus,
        Grade::C,
        Grade::DPlus,
        Grade::D,
        Grade::F,
        Grade::S,
        Grade::U,
        Grade::InProgress,
        Grade::NoGrade,
    ];

    /// Letter grades that carry grade points, best first.
    pub const LETTERS: [Grade; 11] = [
        Grade::APlus,
        Grade::A,
        Grade::AMinus,
        Grade::BPlus,
        Grade::B,
        Grade::BMinus,
        Grade::CPlus,
        Grade::C,
        Grade::DPlus,
        Grade::D,
        Grade::F,
    ];

    pub fn points(self) -> f64 {
        match self {
            Grade::APlus | Grade::A => 5.0,
            Grade::AMinus => 4.5,
            Grade::BPlus => 4.0,
            Grade::B => 3.5,
            Grade::BMinus => 3.0,
            Grade::CPlus => 2.5,
            Grade::C => 2.0,
            Grade::DPlus => 1.5,
            Grade::D => 1.0,
            Grade::F | Grade::S | Grade::U | Grade::InProgress | Grade::NoGrade => 0.0,
        }
    }

    /// Whether the grade takes part in grade-point averaging.
    pub fn is_graded(self) -> bool {
        !matches!(
            self,
            Grade::S | Grade::U | Grade::InProgress | Grade::NoGrade
        )
    }

    /// Pass/fail grades drawn from the S/U quota.
    pub fn is_pass_fail(self) -> bool {
        matches!(self, Grade::S | Grade::U)
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Grade::InProgress | Grade::NoGrade)
    }

    /// Pending modules count as projected completions; only failures earn nothing.
    pub fn earns_credit(self) -> bool {
        !matches!(self, Grade::F | Grade::U)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::F => "F",
            Grade::S => "S",
            Grade::U => "U",
            Grade::InProgress => "IP",
            Grade::NoGrade => "NG",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Grade::ALL
            .into_iter()
            .find(|grade| grade.as_str() == normalized)
            .ok_or_else(|| value.to_string())
    }
}

/// One row of a student's transcript.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseRecord {
    pub module_code: String,
    pub module_title: String,
    pub year: u32,
    pub semester: u32,
    pub units: u32,
    pub module_type: String,
    pub grade: Grade,
}

impl CourseRecord {
    /// Sortable term key, `year * 10 + semester`.
    pub fn term(&self) -> u32 {
        self.year * 10 + self.semester
    }

    pub fn grade_points(&self) -> f64 {
        self.grade.points()
    }

    /// Course level taken from the first digit of the numeric part of the
    /// code: `FIN3101` is level 3, `GEA1000HX` is level 1.
    pub fn level(&self) -> Option<u32> {
        self.module_code
            .chars()
            .find(char::is_ascii_digit)
            .and_then(|c| c.to_digit(10))
    }
}

/// Completion state of a single requirement track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackStatus {
    /// Fraction of the track completed; flat quotas may exceed 1.0.
    pub completion: f64,
    pub outstanding: Vec<String>,
    pub track_cgpa: f64,
}

impl TrackStatus {
    /// Completion as a display percentage clamped to 100.
    pub fn percent(&self) -> f64 {
        (self.completion * 100.0).clamp(0.0, 100.0)
    }

    pub fn is_complete(&self) -> bool {
        self.completion >= 1.0
    }
}

/// Pass/fail credit accounting across study years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SuQuota {
    pub first_year_used: u32,
    pub carried_forward: u32,
    pub later_used: u32,
    pub remaining: u32,
    /// Credits consumed beyond the allowance.
    pub overdrawn: u32,
}

/// Cumulative CGPA as of one term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermCgpa {
    pub term: u32,
    pub label: String,
    pub cgpa: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackGpaSummary {
    pub track: String,
    pub module_count: usize,
    pub cgpa: f64,
}

/// Derived metrics for the current filtered view, rebuilt on every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub total_units: u32,
    /// Percentage of the graduation credit target, uncapped.
    pub completion_rate: f64,
    pub cgpa: f64,
    /// Change against the CGPA of the unfiltered transcript.
    pub cgpa_delta: f64,
    pub current_year: u32,
    pub years_remaining: u32,
    pub su_quota: SuQuota,
    pub grade_distribution: BTreeMap<Grade, usize>,
    pub cgpa_by_term: Vec<TermCgpa>,
    pub track_status: BTreeMap<String, TrackStatus>,
}

impl ProgressSnapshot {
    pub fn su_quota_remaining(&self) -> u32 {
        self.su_quota.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str) -> CourseRecord {
        CourseRecord {
            module_code: code.to_string(),
            module_title: "Title".to_string(),
            year: 2,
            semester: 1,
            units: 4,
            module_type: "BBA-FIN".to_string(),
            grade: Grade::A,
        }
    }

    #[test]
    fn parses_grades_case_insensitively() {
        assert_eq!("a-".parse::<Grade>(), Ok(Grade::AMinus));
        assert_eq!(" ip ".parse::<Grade>(), Ok(Grade::InProgress));
        assert_eq!("S".parse::<Grade>(), Ok(Grade::S));
        assert!("E".parse::<Grade>().is_err());
    }

    #[test]
    fn pass_fail_and_pending_grades_are_ungraded() {
        for grade in [Grade::S, Grade::U, Grade::InProgress, Grade::NoGrade] {
            assert!(!grade.is_graded());
            assert_eq!(grade.points(), 0.0);
        }
        assert!(Grade::F.is_graded());
    }

    #[test]
    fn only_failures_forfeit_credit() {
        assert!(!Grade::F.earns_credit());
        assert!(!Grade::U.earns_credit());
        assert!(Grade::S.earns_credit());
        assert!(Grade::InProgress.earns_credit());
    }

    #[test]
    fn term_and_level_derive_from_fields() {
        let rec = record("FIN3101");
        assert_eq!(rec.term(), 21);
        assert_eq!(rec.level(), Some(3));
        assert_eq!(record("GEA1000HX").level(), Some(1));
        assert_eq!(record("NOLEVEL").level(), None);
    }

    #[test]
    fn percent_is_clamped_for_display() {
        let status = TrackStatus {
            completion: 1.5,
            outstanding: Vec::new(),
            track_cgpa: 0.0,
        };
        assert_eq!(status.percent(), 100.0);
        assert!(status.is_complete());
    }
}
