use tracing::info;

use crate::qc::{BatchRecord, Verdict};

const PROVISIONAL_FAIL: &str = "FAIL";

pub fn is_provisional_fail(provisional: Option<&str>) -> bool {
    provisional.is_some_and(|value| value.trim().eq_ignore_ascii_case(PROVISIONAL_FAIL))
}

/// Forces `Fail` where an external provisional verdict says so. Never touches
/// the failure code and never turns a `Fail` back into a `Pass`.
pub fn override_record(record: &BatchRecord) -> BatchRecord {
    if is_provisional_fail(record.provisional.as_deref()) {
        BatchRecord {
            result: Verdict::Fail,
            ..record.clone()
        }
    } else {
        record.clone()
    }
}

/// Applies provisional overrides after classification of every record has
/// finished. Returns the records and how many were downgraded.
pub fn apply_provisional_overrides(records: Vec<BatchRecord>) -> (Vec<BatchRecord>, usize) {
    let mut downgraded = 0;
    let records = records
        .into_iter()
        .map(|record| {
            if record.result == Verdict::Pass && is_provisional_fail(record.provisional.as_deref())
            {
                downgraded += 1;
            }
            override_record(&record)
        })
        .collect::<Vec<_>>();

    if downgraded > 0 {
        info!(downgraded, "applied provisional fail verdicts");
    }

    (records, downgraded)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::qc::FailureCode;

    fn record(result: Verdict, provisional: Option<&str>) -> BatchRecord {
        BatchRecord {
            source_row: 1,
            timestamp: NaiveDate::from_ymd_opt(2024, 2, 1)
                .expect("valid date")
                .and_hms_opt(0, 0, 0)
                .expect("valid time"),
            category: "Red".to_string(),
            cells: Vec::new(),
            provisional: provisional.map(ToOwned::to_owned),
            result,
            failure_code: FailureCode::from_raw(Some("LOW FLOW".to_string())),
        }
    }

    #[test]
    fn provisional_fail_downgrades_pass_case_insensitively() {
        let (records, downgraded) = apply_provisional_overrides(vec![
            record(Verdict::Pass, Some("fail")),
            record(Verdict::Pass, Some("Pass")),
            record(Verdict::Pass, None),
        ]);

        assert_eq!(downgraded, 1);
        assert_eq!(records[0].result, Verdict::Fail);
        assert_eq!(records[0].failure_code.as_str(), "LOW FLOW");
        assert_eq!(records[1].result, Verdict::Pass);
        assert_eq!(records[2].result, Verdict::Pass);
    }

    #[test]
    fn override_never_resurrects_a_pass() {
        let failed = record(Verdict::Fail, Some("PASS"));
        assert_eq!(override_record(&failed).result, Verdict::Fail);
    }
}
