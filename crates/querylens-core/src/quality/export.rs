//! Markdown and JSON renderings of suite results

use std::fmt::{self, Write};

use crate::error::Result;
use crate::models::{TestStatus, TestSuiteResult};

fn glyph(passed: bool) -> &'static str {
    if passed {
        "✅"
    } else {
        "❌"
    }
}

/// Render a suite result as a markdown report
pub fn to_markdown(suite: &TestSuiteResult) -> String {
    let mut out = String::new();
    write_markdown(&mut out, suite).expect("writing to a String never fails");
    out
}

fn write_markdown(out: &mut impl Write, suite: &TestSuiteResult) -> fmt::Result {
    writeln!(out, "# Quality Test Report")?;
    writeln!(out)?;
    writeln!(
        out,
        "**Date:** {}",
        suite.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out, "**Suite:** {}", suite.suite_name)?;
    writeln!(
        out,
        "**Pass Rate:** {:.1}% ({}/{})",
        suite.pass_rate(),
        suite.passed_tests,
        suite.total_tests
    )?;
    writeln!(out, "**Average Score:** {:.2}", suite.average_score)?;
    writeln!(out, "**Total Duration:** {}ms", suite.total_duration_ms)?;
    writeln!(out)?;
    writeln!(out, "## Test Results")?;

    for result in &suite.results {
        let status = match result.status {
            TestStatus::Errored => " (errored)",
            _ => "",
        };
        writeln!(out)?;
        writeln!(
            out,
            "### {} {}{}",
            glyph(result.passed),
            result.test_name,
            status
        )?;
        writeln!(out)?;
        writeln!(out, "- **Test ID:** {}", result.test_id)?;
        writeln!(out, "- **Category:** {}", result.category)?;
        writeln!(out, "- **Score:** {:.2}", result.score)?;
        writeln!(out, "- **Duration:** {}ms", result.duration_ms)?;
        if let Some(error) = &result.error {
            writeln!(out, "- **Error:** {error}")?;
        }

        if !result.details.is_empty() {
            writeln!(out)?;
            writeln!(out, "**Expectations:**")?;
            writeln!(out)?;
            for detail in &result.details {
                writeln!(
                    out,
                    "- {} {}: {} (score {:.2})",
                    glyph(detail.passed),
                    detail.description,
                    detail.message,
                    detail.score
                )?;
            }
        }
    }

    Ok(())
}

/// Render a suite result as pretty-printed JSON
pub fn to_json(suite: &TestSuiteResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(suite)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExpectationDetail, ExpectationKind, TestCategory, TestResult};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn result(id: &str, passed: bool, error: Option<&str>) -> TestResult {
        TestResult {
            test_id: id.to_string(),
            test_name: format!("Test {id}"),
            category: TestCategory::Citation,
            status: match (passed, error) {
                (true, _) => TestStatus::Passed,
                (false, Some(_)) => TestStatus::Errored,
                (false, None) => TestStatus::Failed,
            },
            passed,
            score: if passed { 1.0 } else { 0.0 },
            duration_ms: 120,
            details: if error.is_some() {
                Vec::new()
            } else {
                vec![ExpectationDetail {
                    kind: ExpectationKind::CitationAccuracy,
                    description: "Cites § 823 BGB".to_string(),
                    passed,
                    actual: passed.to_string(),
                    score: if passed { 1.0 } else { 0.0 },
                    message: if passed { "Answer cites § 823" } else { "§ 823 not cited" }
                        .to_string(),
                }]
            },
            response: None,
            error: error.map(str::to_string),
            timestamp: Utc.with_ymd_and_hms(2026, 10, 1, 9, 30, 0).unwrap(),
        }
    }

    fn suite() -> TestSuiteResult {
        TestSuiteResult::from_results(
            "Citation",
            vec![
                result("a", true, None),
                result("b", false, None),
                result("c", false, Some("Test c timed out after 100ms")),
            ],
            Utc.with_ymd_and_hms(2026, 10, 1, 9, 30, 0).unwrap(),
        )
    }

    #[test]
    fn test_markdown_document() {
        let expected = "\
# Quality Test Report

**Date:** 2026-10-01 09:30:00 UTC
**Suite:** Citation
**Pass Rate:** 33.3% (1/3)
**Average Score:** 0.33
**Total Duration:** 360ms

## Test Results

### ✅ Test a

- **Test ID:** a
- **Category:** citation
- **Score:** 1.00
- **Duration:** 120ms

**Expectations:**

- ✅ Cites § 823 BGB: Answer cites § 823 (score 1.00)

### ❌ Test b

- **Test ID:** b
- **Category:** citation
- **Score:** 0.00
- **Duration:** 120ms

**Expectations:**

- ❌ Cites § 823 BGB: § 823 not cited (score 0.00)

### ❌ Test c (errored)

- **Test ID:** c
- **Category:** citation
- **Score:** 0.00
- **Duration:** 120ms
- **Error:** Test c timed out after 100ms
";
        assert_eq!(to_markdown(&suite()), expected);
    }

    #[test]
    fn test_empty_suite_pass_rate() {
        let empty = TestSuiteResult::from_results(
            "Empty",
            Vec::new(),
            Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
        );
        let markdown = to_markdown(&empty);
        assert!(markdown.starts_with("# Quality Test Report"));
        assert!(markdown.contains("**Pass Rate:** 0.0% (0/0)"));
    }

    #[test]
    fn test_json_roundtrip() {
        let suite = suite();
        let json = to_json(&suite).unwrap();
        let parsed: TestSuiteResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.suite_name, suite.suite_name);
        assert_eq!(parsed.results.len(), 3);
        assert_eq!(parsed.results[2].status, TestStatus::Errored);
        assert_eq!(parsed.timestamp, suite.timestamp);
    }
}
