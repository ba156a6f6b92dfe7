//! Keyword heuristics turning agent reports into scores.
//!
//! Every function here is pure and total: an absent or blank report gives
//! an absent value with the `no report` note, never an error.

use crate::models::ScoreResult;
use once_cell::sync::Lazy;
use regex::Regex;

static NON_COMPLIANT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)non[- ]?compliant|non[- ]?conform").unwrap());

// Case-sensitive: only "Batch <n>" tokens count as analyzed batches.
static BATCH_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"Batch\s+\d+").unwrap());

static FULL_COMPLIANCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)full compliance|pleine conformité").unwrap());

static ECO_DEVIATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)exceeded|deviation|hotspot|dépassement|écart").unwrap()
});

static CRITICAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)critical|priorit[yé]\s*haute|high priority").unwrap()
});

static WARNING_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)warn|overheat|drift|overheating|avertissement").unwrap()
});

static PROCESS_ISSUE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)deviation|out[- ]of[- ]spec|instability|écart|instabilité").unwrap()
});

/// Note used for every category when there is nothing to score.
pub const NO_REPORT: &str = "no report";

/// Note used by the quality scorer when no batch is mentioned.
pub const NO_BATCHES: &str = "—";

/// Base score of an eco or process report without findings.
const BASELINE_SCORE: f64 = 95.0;

/// Lowest score the eco and process heuristics can reach.
const SCORE_FLOOR: f64 = 40.0;

fn non_blank(report: Option<&str>) -> Option<&str> {
    report.filter(|r| !r.trim().is_empty())
}

fn count(pattern: &Regex, text: &str) -> usize {
    pattern.find_iter(text).count()
}

fn clamp_score(raw: f64) -> u8 {
    raw.round().clamp(0.0, 100.0) as u8
}

/// Score a quality report from its batch and non-compliance mentions.
pub fn score_quality(report: Option<&str>) -> ScoreResult {
    let Some(report) = non_blank(report) else {
        return ScoreResult::score(None, NO_REPORT);
    };

    let non_compliant = count(&NON_COMPLIANT_PATTERN, report);
    let batches = count(&BATCH_PATTERN, report);

    if batches == 0 {
        return ScoreResult::score(None, NO_BATCHES);
    }

    let ratio = non_compliant as f64 / batches as f64;
    let score = clamp_score((100.0 - ratio * 100.0).max(0.0));
    ScoreResult::score(Some(score), format!("{} batches", batches))
}

/// Score an eco report: full compliance wins, otherwise each deviation costs 8.
pub fn score_eco(report: Option<&str>) -> ScoreResult {
    let Some(report) = non_blank(report) else {
        return ScoreResult::score(None, NO_REPORT);
    };

    if FULL_COMPLIANCE_PATTERN.is_match(report) {
        return ScoreResult::score(Some(clamp_score(BASELINE_SCORE)), "full compliance");
    }

    let deviations = count(&ECO_DEVIATION_PATTERN, report);
    let raw = (BASELINE_SCORE - 8.0 * deviations as f64).max(SCORE_FLOOR);
    ScoreResult::score(Some(clamp_score(raw)), format!("{} deviations", deviations))
}

/// Count maintenance alerts: every critical mention plus at most one for warnings.
pub fn score_maintenance(report: Option<&str>) -> ScoreResult {
    let Some(report) = non_blank(report) else {
        return ScoreResult::alerts(None, NO_REPORT);
    };

    let critical = count(&CRITICAL_PATTERN, report);
    let warnings = count(&WARNING_PATTERN, report);
    let alerts = critical + warnings.min(1);

    ScoreResult::alerts(
        Some(alerts as u32),
        format!("{} critical / {} warnings", critical, warnings),
    )
}

/// Score a process report: each deviation or instability mention costs 7.
pub fn score_process(report: Option<&str>) -> ScoreResult {
    let Some(report) = non_blank(report) else {
        return ScoreResult::score(None, NO_REPORT);
    };

    let issues = count(&PROCESS_ISSUE_PATTERN, report);
    let raw = (BASELINE_SCORE - 7.0 * issues as f64).max(SCORE_FLOOR);
    ScoreResult::score(Some(clamp_score(raw)), format!("{} issues", issues))
}
