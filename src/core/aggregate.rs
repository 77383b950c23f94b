//! Reduction of independent perspective reports into one assessment.

use crate::core::types::{Assessment, PerspectiveReport, PerspectiveStatus};

/// Aggregate perspective reports into a single verdict.
///
/// Overall status by priority: fail > warning > pass > unknown. Overall
/// confidence is the arithmetic mean of the confidences that are present;
/// perspectives that declined to score are excluded rather than counted as
/// zero (failed perspectives carry an explicit 0.0). All individual reports
/// are retained for downstream Adapt reasoning.
pub fn aggregate(reports: Vec<PerspectiveReport>) -> Assessment {
    let overall = overall_status(&reports);
    let confidences: Vec<f64> = reports.iter().filter_map(|r| r.confidence).collect();
    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };
    Assessment {
        overall,
        confidence,
        reports,
    }
}

fn overall_status(reports: &[PerspectiveReport]) -> PerspectiveStatus {
    let mut overall = PerspectiveStatus::Unknown;
    for report in reports {
        match report.status {
            PerspectiveStatus::Fail => return PerspectiveStatus::Fail,
            PerspectiveStatus::Warning => overall = PerspectiveStatus::Warning,
            PerspectiveStatus::Pass if overall == PerspectiveStatus::Unknown => {
                overall = PerspectiveStatus::Pass;
            }
            _ => {}
        }
    }
    overall
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, status: PerspectiveStatus, confidence: Option<f64>) -> PerspectiveReport {
        PerspectiveReport {
            perspective: name.to_string(),
            status,
            confidence,
            feasible: status == PerspectiveStatus::Pass,
            blockers: Vec::new(),
            observations: vec![format!("{name} observation")],
            error: None,
        }
    }

    #[test]
    fn warning_outranks_pass() {
        let assessment = aggregate(vec![
            report("a", PerspectiveStatus::Pass, Some(0.9)),
            report("b", PerspectiveStatus::Warning, Some(0.6)),
            report("c", PerspectiveStatus::Pass, Some(0.9)),
        ]);
        assert_eq!(assessment.overall, PerspectiveStatus::Warning);
    }

    #[test]
    fn fail_outranks_everything() {
        let assessment = aggregate(vec![
            report("a", PerspectiveStatus::Pass, Some(0.9)),
            report("b", PerspectiveStatus::Fail, Some(0.3)),
            report("c", PerspectiveStatus::Warning, Some(0.9)),
        ]);
        assert_eq!(assessment.overall, PerspectiveStatus::Fail);
    }

    #[test]
    fn all_pass_stays_pass() {
        let assessment = aggregate(vec![
            report("a", PerspectiveStatus::Pass, Some(1.0)),
            report("b", PerspectiveStatus::Pass, Some(0.5)),
        ]);
        assert_eq!(assessment.overall, PerspectiveStatus::Pass);
        assert!((assessment.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn missing_confidences_are_excluded_from_the_mean() {
        let assessment = aggregate(vec![
            report("a", PerspectiveStatus::Pass, Some(0.8)),
            report("b", PerspectiveStatus::Pass, None),
        ]);
        assert!((assessment.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn errored_perspective_drags_confidence_down() {
        let assessment = aggregate(vec![
            report("a", PerspectiveStatus::Pass, Some(1.0)),
            PerspectiveReport::from_error("b", "timed out"),
        ]);
        assert_eq!(assessment.overall, PerspectiveStatus::Pass);
        assert!((assessment.confidence - 0.5).abs() < 1e-9);
        assert_eq!(assessment.reports.len(), 2);
    }

    #[test]
    fn no_reports_yields_unknown_with_zero_confidence() {
        let assessment = aggregate(Vec::new());
        assert_eq!(assessment.overall, PerspectiveStatus::Unknown);
        assert_eq!(assessment.confidence, 0.0);
    }
}
