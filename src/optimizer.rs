//! Hypothetical-grade planning: which grades in upcoming modules reach a
//! target CGPA with the least effort.

use serde::Serialize;
use tracing::{debug, warn};

use crate::metrics::{deduplicate, round_half_up};
use crate::models::{CourseRecord, Grade};

/// Upcoming modules to plan for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HypotheticalPlan {
    pub target_cgpa: f64,
    pub modules: usize,
    pub units_per_module: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeAssignment {
    /// One grade per planned module, best first.
    pub grades: Vec<Grade>,
    pub projected_cgpa: f64,
    pub effort_penalty: f64,
}

/// Something that can pick grades for a plan. Returns `None` when the
/// target cannot be reached.
pub trait GradeSolver {
    fn solve(&self, records: &[CourseRecord], plan: &HypotheticalPlan) -> Option<GradeAssignment>;
}

/// Relative effort of earning a grade.
pub fn effort_penalty(grade: Grade) -> f64 {
    match grade {
        Grade::APlus | Grade::A => 3.0,
        Grade::AMinus => 2.5,
        Grade::BPlus => 2.0,
        Grade::B => 1.5,
        Grade::BMinus => 1.0,
        Grade::CPlus => 0.8,
        Grade::C => 0.6,
        Grade::DPlus => 0.4,
        Grade::D => 0.2,
        _ => 0.0,
    }
}

/// Tries every multiset of letter grades for the planned modules and keeps
/// the one maximising `cgpa - lambda * penalty` among those reaching the
/// target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExhaustiveSolver {
    pub lambda_penalty: f64,
    /// Plans larger than this are refused.
    pub max_modules: usize,
}

impl Default for ExhaustiveSolver {
    fn default() -> Self {
        Self {
            lambda_penalty: 0.05,
            max_modules: 10,
        }
    }
}

struct Search {
    fixed_points: f64,
    total_units: f64,
    units_per_module: f64,
    target: f64,
    lambda: f64,
}

impl Search {
    fn visit(
        &self,
        start: usize,
        remaining: usize,
        chosen: &mut Vec<Grade>,
        best: &mut Option<(f64, GradeAssignment)>,
    ) {
        if remaining == 0 {
            let planned: f64 = chosen
                .iter()
                .map(|grade| grade.points() * self.units_per_module)
                .sum();
            let cgpa = (self.fixed_points + planned) / self.total_units;
            if cgpa + 1e-9 < self.target {
                return;
            }
            let penalty: f64 = chosen.iter().copied().map(effort_penalty).sum();
            let objective = cgpa - self.lambda * penalty;
            if best.as_ref().map_or(true, |(score, _)| objective > *score) {
                *best = Some((
                    objective,
                    GradeAssignment {
                        grades: chosen.clone(),
                        projected_cgpa: round_half_up(cgpa, 2),
                        effort_penalty: penalty,
                    },
                ));
            }
            return;
        }

        for index in start..Grade::LETTERS.len() {
            chosen.push(Grade::LETTERS[index]);
            self.visit(index, remaining - 1, chosen, best);
            chosen.pop();
        }
    }
}

impl GradeSolver for ExhaustiveSolver {
    fn solve(&self, records: &[CourseRecord], plan: &HypotheticalPlan) -> Option<GradeAssignment> {
        if plan.modules > self.max_modules {
            warn!(
                modules = plan.modules,
                max = self.max_modules,
                "grade plan too large to search"
            );
            return None;
        }

        let graded: Vec<CourseRecord> = records
            .iter()
            .filter(|record| record.grade.is_graded())
            .cloned()
            .collect();
        let (fixed_points, fixed_units) = deduplicate(&graded)
            .into_iter()
            .fold((0.0_f64, 0_u32), |(points, units), record| {
                (
                    points + record.grade_points() * f64::from(record.units),
                    units + record.units,
                )
            });

        let planned_units = plan.modules as f64 * f64::from(plan.units_per_module);
        let total_units = f64::from(fixed_units) + planned_units;
        if total_units == 0.0 {
            return None;
        }

        let search = Search {
            fixed_points,
            total_units,
            units_per_module: f64::from(plan.units_per_module),
            target: plan.target_cgpa,
            lambda: self.lambda_penalty,
        };
        let mut best = None;
        search.visit(0, plan.modules, &mut Vec::with_capacity(plan.modules), &mut best);

        match best {
            Some((objective, assignment)) => {
                debug!(objective, cgpa = assignment.projected_cgpa, "found grade plan");
                Some(assignment)
            }
            None => {
                warn!(target = plan.target_cgpa, "target CGPA is out of reach");
                None
            }
        }
    }
}
