//! Static degree requirements, loaded once and shared read-only.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const BUILTIN_CATALOG: &str = include_str!("../data/track_requirements.json");

/// How a track's completion is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackKind {
    Core,
    GePillar,
    TieredMajor,
    FlatQuota,
    Residual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackRequirement {
    /// Every listed course must be taken.
    Core { required_courses: BTreeSet<String> },
    /// One course per prefix.
    GePillar { required_prefixes: BTreeSet<String> },
    /// Compulsory courses plus elective credits at two course levels.
    TieredMajor {
        required_courses: BTreeSet<String>,
        level_3000_credits: u32,
        level_4000_credits: u32,
    },
    FlatQuota { required_credits: u32 },
    /// Unrestricted electives; absorbs modules no named requirement claims.
    Residual { required_count: u32 },
}

impl TrackRequirement {
    pub fn kind(&self) -> TrackKind {
        match self {
            TrackRequirement::Core { .. } => TrackKind::Core,
            TrackRequirement::GePillar { .. } => TrackKind::GePillar,
            TrackRequirement::TieredMajor { .. } => TrackKind::TieredMajor,
            TrackRequirement::FlatQuota { .. } => TrackKind::FlatQuota,
            TrackRequirement::Residual { .. } => TrackKind::Residual,
        }
    }
}

/// Flat credit quota applied to every tag starting with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixQuota {
    pub prefix: String,
    pub required_credits: u32,
}

/// Pass/fail allowance: a first-year pool whose unused part carries forward,
/// capped, into later years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuPolicy {
    pub first_year_credits: u32,
    pub carry_over_cap: u32,
    #[serde(default)]
    pub later_year_credits: u32,
}

impl Default for SuPolicy {
    fn default() -> Self {
        Self {
            first_year_credits: 32,
            carry_over_cap: 12,
            later_year_credits: 0,
        }
    }
}

/// Where a resolved requirement came from. Prefix-derived quotas (minors,
/// second majors) fold into the residual bucket; named ones do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOrigin {
    Named,
    Prefix(String),
}

/// A track tag bound to its requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub tag: String,
    pub requirement: TrackRequirement,
    pub origin: TrackOrigin,
}

impl ResolvedTrack {
    pub fn kind(&self) -> TrackKind {
        self.requirement.kind()
    }

    /// Whether modules under this track count as unrestricted electives
    /// given the student's main specialisation.
    pub fn folds_into_residual(&self, main_specialization: Option<&str>) -> bool {
        match (&self.origin, self.kind()) {
            (TrackOrigin::Prefix(_), _) => true,
            (TrackOrigin::Named, TrackKind::TieredMajor) => {
                main_specialization != Some(self.tag.as_str())
            }
            (TrackOrigin::Named, _) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementsCatalog {
    pub graduation_credits: u32,
    pub programme_years: u32,
    pub credits_per_elective: u32,
    #[serde(default)]
    pub su_policy: SuPolicy,
    pub tracks: BTreeMap<String, TrackRequirement>,
    #[serde(default)]
    pub prefix_quotas: Vec<PrefixQuota>,
}

impl RequirementsCatalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.graduation_credits == 0 {
            return Err(Error::InvalidCatalog(
                "graduation_credits must be positive".to_string(),
            ));
        }
        if self.credits_per_elective == 0 {
            return Err(Error::InvalidCatalog(
                "credits_per_elective must be positive".to_string(),
            ));
        }

        let residuals: Vec<&str> = self
            .tracks
            .iter()
            .filter(|(_, req)| req.kind() == TrackKind::Residual)
            .map(|(tag, _)| tag.as_str())
            .collect();
        if residuals.len() > 1 {
            return Err(Error::InvalidCatalog(format!(
                "only one residual track is allowed, found {}",
                residuals.join(", ")
            )));
        }

        if let Some(rule) = self.prefix_quotas.iter().find(|rule| rule.prefix.is_empty()) {
            return Err(Error::InvalidCatalog(format!(
                "prefix quota of {} credits has an empty prefix",
                rule.required_credits
            )));
        }

        Ok(())
    }

    /// Look up a tag, first by exact name and then by prefix rule.
    pub fn resolve(&self, tag: &str) -> Result<ResolvedTrack> {
        if let Some(requirement) = self.tracks.get(tag) {
            return Ok(ResolvedTrack {
                tag: tag.to_string(),
                requirement: requirement.clone(),
                origin: TrackOrigin::Named,
            });
        }

        self.prefix_quotas
            .iter()
            .find(|rule| tag.starts_with(&rule.prefix))
            .map(|rule| ResolvedTrack {
                tag: tag.to_string(),
                requirement: TrackRequirement::FlatQuota {
                    required_credits: rule.required_credits,
                },
                origin: TrackOrigin::Prefix(rule.prefix.clone()),
            })
            .ok_or_else(|| Error::UnknownTrack(tag.to_string()))
    }

    pub fn residual_tag(&self) -> Option<&str> {
        self.tracks
            .iter()
            .find(|(_, req)| req.kind() == TrackKind::Residual)
            .map(|(tag, _)| tag.as_str())
    }

    pub fn is_known(&self, tag: &str) -> bool {
        self.resolve(tag).is_ok()
    }
}
