use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::catalog::RequirementsCatalog;
use crate::error::{Error, Result};
use crate::models::{CourseRecord, Grade};

/// Latest study year a transcript row may carry.
pub const MAX_YEAR: u32 = 10;
/// Largest unit weight of a single row.
pub const MAX_UNITS: u32 = 40;

/// Read a transcript CSV with columns
/// `module_code, module_title, year, semester, units, module_type, grade`.
///
/// Codes, track tags and grades are upper-cased. Rows are rejected for a
/// year outside `1..=MAX_YEAR`, a unit count outside `1..=MAX_UNITS`, a
/// semester outside 1..=4, an unknown
/// grade or track, or an exact duplicate. Year-long modules split across
/// semesters are merged into one row.
pub fn read_records<R: Read>(reader: R, catalog: &RequirementsCatalog) -> Result<Vec<CourseRecord>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        module_code: String,
        module_title: String,
        year: i64,
        semester: i64,
        units: i64,
        module_type: String,
        grade: String,
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        // header is line 1
        let line = index as u64 + 2;
        let invalid = |reason: String| Error::InvalidRecord { line, reason };

        let module_code = row.module_code.to_ascii_uppercase();
        let module_type = row.module_type.to_ascii_uppercase();
        if module_code.is_empty() {
            return Err(invalid("module_code is empty".to_string()));
        }
        if module_type.is_empty() {
            return Err(invalid(format!("module_type is empty for {module_code}")));
        }
        let year = u32::try_from(row.year)
            .ok()
            .filter(|year| (1..=MAX_YEAR).contains(year))
            .ok_or_else(|| invalid(format!("year must be 1 to {MAX_YEAR}, got {}", row.year)))?;
        let semester = u32::try_from(row.semester)
            .ok()
            .filter(|semester| (1..=4).contains(semester))
            .ok_or_else(|| invalid(format!("semester must be 1 to 4, got {}", row.semester)))?;
        let units = u32::try_from(row.units)
            .ok()
            .filter(|units| (1..=MAX_UNITS).contains(units))
            .ok_or_else(|| invalid(format!("units must be 1 to {MAX_UNITS}, got {}", row.units)))?;
        let grade: Grade = row.grade.parse().map_err(|value| Error::UnknownGrade { line, value })?;
        if !catalog.is_known(&module_type) {
            return Err(Error::UnknownTrack(module_type));
        }

        let record = CourseRecord {
            module_code,
            module_title: row.module_title,
            year,
            semester,
            units,
            module_type,
            grade,
        };
        if !seen.insert(record.clone()) {
            return Err(invalid(format!("duplicate row for {}", record.module_code)));
        }
        records.push(record);
    }

    let rows = records.len();
    let records = merge_year_long(records);
    info!(rows, modules = records.len(), "loaded transcript");
    Ok(records)
}

pub fn load_csv(path: &Path, catalog: &RequirementsCatalog) -> Result<Vec<CourseRecord>> {
    let file = std::fs::File::open(path)?;
    read_records(file, catalog)
}

/// Merge modules taken across more than one semester of the same study
/// year: units are summed, the latest semester is kept, and the grade comes
/// from the latest row that carries a final grade.
///
/// The same code in a different year is a retake and is left alone.
pub fn merge_year_long(records: Vec<CourseRecord>) -> Vec<CourseRecord> {
    let mut semesters: HashMap<(String, u32), BTreeSet<u32>> = HashMap::new();
    for record in &records {
        semesters
            .entry((record.module_code.clone(), record.year))
            .or_default()
            .insert(record.semester);
    }

    let mut merged: Vec<CourseRecord> = Vec::with_capacity(records.len());
    let mut slots: HashMap<(String, u32), usize> = HashMap::new();

    for record in records {
        let key = (record.module_code.clone(), record.year);
        let spans_semesters = semesters.get(&key).is_some_and(|terms| terms.len() > 1);
        if !spans_semesters {
            merged.push(record);
            continue;
        }

        match slots.get(&key) {
            Some(&slot) => {
                let target = &mut merged[slot];
                target.units += record.units;
                let later = record.semester >= target.semester;
                if later {
                    target.semester = record.semester;
                }
                if (later && !record.grade.is_pending()) || target.grade.is_pending() {
                    target.grade = record.grade;
                }
            }
            None => {
                debug!(module = %record.module_code, year = record.year, "merging year-long module");
                slots.insert(key, merged.len());
                merged.push(record);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "module_code,module_title,year,semester,units,module_type,grade\n";

    fn read(body: &str) -> Result<Vec<CourseRecord>> {
        let catalog = RequirementsCatalog::builtin().unwrap();
        let csv = format!("{HEADER}{body}");
        read_records(csv.as_bytes(), &catalog)
    }

    #[test]
    fn reads_and_normalises_rows() {
        let records = read(
            "acc1701,Accounting for Decision Makers,1,1,4,bba-core,a\n\
             GEA1000,Quantitative Reasoning with Data,1,2,4,GE,b+\n",
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].module_code, "ACC1701");
        assert_eq!(records[0].module_type, "BBA-CORE");
        assert_eq!(records[0].grade, Grade::A);
        assert_eq!(records[1].grade, Grade::BPlus);
        assert_eq!(records[1].term(), 12);
    }

    #[test]
    fn ignores_extra_columns() {
        let catalog = RequirementsCatalog::builtin().unwrap();
        let csv = "module_code,module_title,year,semester,units,module_type,grade,remarks\n\
                   ACC1701,Accounting,1,1,4,BBA-CORE,A,retaken\n";
        let records = read_records(csv.as_bytes(), &catalog).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn missing_column_is_rejected() {
        let catalog = RequirementsCatalog::builtin().unwrap();
        let csv = "module_code,module_title,year,semester,units,grade\nACC1701,Accounting,1,1,4,A\n";
        assert!(matches!(read_records(csv.as_bytes(), &catalog), Err(Error::Csv(_))));
    }

    #[test]
    fn rejects_invalid_rows_with_line_numbers() {
        match read("ACC1701,Accounting,1,1,4,BBA-CORE,A\nBSP1702,Economics,1,1,0,BBA-CORE,A\n") {
            Err(Error::InvalidRecord { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("units"));
            }
            other => panic!("expected InvalidRecord, got {other:?}"),
        }
        assert!(matches!(
            read("ACC1701,Accounting,0,1,4,BBA-CORE,A\n"),
            Err(Error::InvalidRecord { line: 2, .. })
        ));
        assert!(matches!(
            read("ACC1701,Accounting,1,5,4,BBA-CORE,A\n"),
            Err(Error::InvalidRecord { .. })
        ));
    }

    #[test]
    fn rejects_oversized_years_and_units() {
        match read("ACC1701,Accounting,1,1,3000000000,BBA-CORE,A\n") {
            Err(Error::InvalidRecord { line: 2, reason }) => assert!(reason.contains("units")),
            other => panic!("expected InvalidRecord, got {other:?}"),
        }
        match read("ACC1701,Accounting,500000000,1,4,BBA-CORE,A\n") {
            Err(Error::InvalidRecord { line: 2, reason }) => assert!(reason.contains("year")),
            other => panic!("expected InvalidRecord, got {other:?}"),
        }
        assert!(matches!(
            read("ACC1701,Accounting,11,1,4,BBA-CORE,A\n"),
            Err(Error::InvalidRecord { .. })
        ));
        assert!(matches!(
            read("ACC1701,Accounting,1,1,41,BBA-CORE,A\n"),
            Err(Error::InvalidRecord { .. })
        ));
        let records = read("BSN4001,Capstone,10,4,40,BBA-HONS,A\n").unwrap();
        assert_eq!(records[0].term(), 104);
    }

    #[test]
    fn rejects_unknown_grades_and_tracks() {
        assert!(matches!(
            read("ACC1701,Accounting,1,1,4,BBA-CORE,E\n"),
            Err(Error::UnknownGrade { line: 2, value }) if value == "E"
        ));
        assert!(matches!(
            read("ACC1701,Accounting,1,1,4,BBA-PHYSICS,A\n"),
            Err(Error::UnknownTrack(tag)) if tag == "BBA-PHYSICS"
        ));
    }

    #[test]
    fn rejects_duplicate_rows() {
        let result = read(
            "ACC1701,Accounting,1,1,4,BBA-CORE,A\n\
             ACC1701,Accounting,1,1,4,BBA-CORE,A\n",
        );
        assert!(matches!(result, Err(Error::InvalidRecord { line: 3, .. })));
    }

    #[test]
    fn merges_year_long_modules() {
        let records = read(
            "BSN3702,Honours Thesis,4,1,4,BBA-HONS,IP\n\
             FIN3101,Corporate Finance,4,1,4,BBA-FIN,B\n\
             BSN3702,Honours Thesis,4,2,4,BBA-HONS,A-\n",
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        let thesis = &records[0];
        assert_eq!(thesis.module_code, "BSN3702");
        assert_eq!(thesis.units, 8);
        assert_eq!(thesis.semester, 2);
        assert_eq!(thesis.grade, Grade::AMinus);
    }

    #[test]
    fn retakes_in_later_years_stay_separate() {
        let records = read(
            "FIN2704,Finance,1,2,4,BBA-CORE,F\n\
             FIN2704,Finance,2,1,4,BBA-CORE,B\n",
        )
        .unwrap();
        assert_eq!(records.len(), 2);
    }
}
