//! The progress engine: one raw transcript, one filtered view, one snapshot.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::catalog::{RequirementsCatalog, ResolvedTrack, TrackKind};
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{CourseRecord, ProgressSnapshot};
use crate::tracks;

/// Owns a student's transcript and derives a [`ProgressSnapshot`] for the
/// current track filter and main specialisation.
///
/// The raw table is never modified. Every call to [`apply_filter`] or
/// [`set_main_specialization`] rebuilds the view and the snapshot from it.
///
/// [`apply_filter`]: ProgressEngine::apply_filter
/// [`set_main_specialization`]: ProgressEngine::set_main_specialization
#[derive(Debug)]
pub struct ProgressEngine<'a> {
    catalog: &'a RequirementsCatalog,
    raw: Vec<CourseRecord>,
    tracks: BTreeMap<String, ResolvedTrack>,
    baseline_cgpa: f64,
    main_specialization: Option<String>,
    selected: Option<BTreeSet<String>>,
    view: Option<Vec<CourseRecord>>,
    snapshot: Option<ProgressSnapshot>,
}

impl<'a> ProgressEngine<'a> {
    /// Take ownership of a validated transcript.
    ///
    /// Every track tag in `records` is resolved against `catalog` here, so a
    /// tag the catalog does not know fails immediately. The view starts
    /// unfiltered.
    pub fn load(catalog: &'a RequirementsCatalog, records: Vec<CourseRecord>) -> Result<Self> {
        let mut tracks = BTreeMap::new();
        for record in &records {
            if tracks.contains_key(&record.module_type) {
                continue;
            }
            let track = catalog.resolve(&record.module_type)?;
            debug!(track = %track.tag, kind = ?track.kind(), "resolved track tag");
            tracks.insert(record.module_type.clone(), track);
        }

        let baseline_cgpa = metrics::compute_cgpa(&records);
        info!(
            records = records.len(),
            tracks = tracks.len(),
            baseline_cgpa,
            "loaded transcript"
        );

        let mut engine = Self {
            catalog,
            view: Some(records.clone()),
            raw: records,
            tracks,
            baseline_cgpa,
            main_specialization: None,
            selected: None,
            snapshot: None,
        };
        engine.rebuild()?;
        Ok(engine)
    }

    /// Keep only modules whose track is in `selected`. An empty selection
    /// leaves no view at all, and [`snapshot`](Self::snapshot) returns `None`.
    /// A selection that matches no rows yields a zero-valued snapshot.
    ///
    /// Every selected tag must be known to the catalog.
    pub fn apply_filter<I, S>(&mut self, selected: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let selected: BTreeSet<String> = selected.into_iter().map(Into::into).collect();
        for tag in &selected {
            if !self.tracks.contains_key(tag) {
                self.catalog.resolve(tag)?;
            }
        }
        self.view = if selected.is_empty() {
            None
        } else {
            Some(
                self.raw
                    .iter()
                    .filter(|record| selected.contains(&record.module_type))
                    .cloned()
                    .collect(),
            )
        };
        info!(
            selected = ?selected,
            rows = self.view.as_ref().map_or(0, Vec::len),
            "applied track filter"
        );
        self.selected = Some(selected);
        self.rebuild()
    }

    /// Declare the tiered major that keeps its own bucket; every other major
    /// folds into unrestricted electives. `None` folds them all.
    pub fn set_main_specialization(&mut self, tag: Option<&str>) -> Result<()> {
        if let Some(tag) = tag {
            let track = match self.tracks.get(tag) {
                Some(track) => track.clone(),
                None => self.catalog.resolve(tag)?,
            };
            if track.kind() != TrackKind::TieredMajor {
                return Err(Error::NotSpecialization(tag.to_string()));
            }
        }
        self.main_specialization = tag.map(str::to_string);
        info!(main = ?self.main_specialization, "set main specialisation");
        self.rebuild()
    }

    fn rebuild(&mut self) -> Result<()> {
        self.snapshot = match &self.view {
            Some(view) => Some(self.build_snapshot(view)?),
            None => None,
        };
        Ok(())
    }

    fn build_snapshot(&self, records: &[CourseRecord]) -> Result<ProgressSnapshot> {
        let cgpa = metrics::compute_cgpa(records);
        let current_year = metrics::current_year(records);
        let su_quota = metrics::compute_su_quota(records, &self.catalog.su_policy);
        if su_quota.overdrawn > 0 {
            warn!(overdrawn = su_quota.overdrawn, "S/U allowance exceeded");
        }

        let track_status = tracks::compute_progress(
            records,
            &self.tracks,
            self.catalog,
            self.main_specialization.as_deref(),
        )?;

        Ok(ProgressSnapshot {
            total_units: metrics::compute_total_credits(records),
            completion_rate: metrics::compute_completion_rate(
                records,
                self.catalog.graduation_credits,
            ),
            cgpa,
            cgpa_delta: metrics::round_half_up(cgpa - self.baseline_cgpa, 2),
            current_year,
            years_remaining: self.catalog.programme_years.saturating_sub(current_year),
            su_quota,
            grade_distribution: metrics::grade_distribution(records),
            cgpa_by_term: metrics::cgpa_trajectory(records),
            track_status,
        })
    }

    /// Snapshot of the current view, or `None` after an empty selection.
    pub fn snapshot(&self) -> Option<&ProgressSnapshot> {
        self.snapshot.as_ref()
    }

    /// The filtered view, or `None` after an empty selection.
    pub fn view(&self) -> Option<&[CourseRecord]> {
        self.view.as_deref()
    }

    pub fn raw(&self) -> &[CourseRecord] {
        &self.raw
    }

    pub fn catalog(&self) -> &RequirementsCatalog {
        self.catalog
    }

    /// CGPA of the unfiltered transcript, computed at load.
    pub fn baseline_cgpa(&self) -> f64 {
        self.baseline_cgpa
    }

    pub fn main_specialization(&self) -> Option<&str> {
        self.main_specialization.as_deref()
    }

    /// Track tags present in the raw transcript.
    pub fn track_tags(&self) -> Vec<&str> {
        self.tracks.keys().map(String::as_str).collect()
    }

    /// Tiered majors that can be picked as main specialisation, limited to
    /// the current selection once a filter has been applied.
    pub fn specialization_options(&self) -> Vec<&str> {
        self.tracks
            .values()
            .filter(|track| track.kind() == TrackKind::TieredMajor)
            .filter(|track| {
                self.selected
                    .as_ref()
                    .map_or(true, |selected| selected.contains(&track.tag))
            })
            .map(|track| track.tag.as_str())
            .collect()
    }
}
