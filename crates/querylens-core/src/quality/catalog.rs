//! Built-in quality test catalog

use std::time::Duration;

use crate::models::{
    Expectation, LegalArea, QualityTest, QueryType, TestCategory, TestExpectation,
};

fn test(
    id: &str,
    name: &str,
    category: TestCategory,
    query: &str,
    timeout_secs: u64,
    expectations: Vec<TestExpectation>,
) -> QualityTest {
    QualityTest {
        id: id.to_string(),
        name: name.to_string(),
        category,
        query: query.to_string(),
        expectations,
        timeout: Duration::from_secs(timeout_secs),
    }
}

fn expect(check: Expectation, description: &str) -> TestExpectation {
    TestExpectation::new(check, description)
}

fn contains(text: &str) -> Expectation {
    Expectation::ContainsText {
        text: text.to_string(),
    }
}

fn cites(citation: &str) -> Expectation {
    Expectation::CitationAccuracy {
        citation: citation.to_string(),
    }
}

/// The fixed catalog, in execution order
pub fn default_catalog() -> Vec<QualityTest> {
    vec![
        // Citation
        test(
            "citation-tort-liability",
            "Tort liability provision",
            TestCategory::Citation,
            "What does § 823 BGB regulate?",
            30,
            vec![
                expect(cites("§ 823"), "Cites § 823 BGB"),
                expect(contains("damage"), "Explains the duty to compensate damage"),
                expect(Expectation::LegalArea { area: LegalArea::Civil }, "Classified as civil law"),
                expect(Expectation::MinRelevance { threshold: 0.7 }, "Top source is relevant"),
            ],
        ),
        test(
            "citation-extraordinary-termination",
            "Extraordinary termination of employment",
            TestCategory::Citation,
            "Under which conditions can an employment contract be terminated without notice?",
            30,
            vec![
                expect(cites("§ 626"), "Cites § 626 BGB"),
                expect(contains("good cause"), "Mentions the good cause requirement"),
                expect(Expectation::LegalArea { area: LegalArea::Labor }, "Classified as labor law"),
            ],
        ),
        // Semantic
        test(
            "semantic-theft-definition",
            "Definition of theft",
            TestCategory::Semantic,
            "What counts as theft under criminal law?",
            30,
            vec![
                expect(contains("movable"), "Mentions movable property"),
                expect(contains("appropriat"), "Mentions intent to appropriate"),
                expect(Expectation::LegalArea { area: LegalArea::Criminal }, "Classified as criminal law"),
                expect(Expectation::QueryType { query_type: QueryType::Definition }, "Recognized as a definition question"),
            ],
        ),
        test(
            "semantic-lay-language",
            "Lay phrasing of a rent question",
            TestCategory::Semantic,
            "my landlord wants way more rent than before, is that even allowed??",
            30,
            vec![
                expect(contains("rent"), "Stays on the topic of rent"),
                expect(Expectation::LegalArea { area: LegalArea::Civil }, "Classified as civil law"),
                expect(Expectation::DocumentCount { min: Some(2) }, "Retrieves at least two sources"),
            ],
        ),
        // Cross-reference
        test(
            "cross-reference-damages",
            "Contractual and tort damages",
            TestCategory::CrossReference,
            "How do contractual damages under § 280 BGB relate to tort claims under § 823 BGB?",
            45,
            vec![
                expect(cites("§ 280"), "Cites § 280 BGB"),
                expect(cites("§ 823"), "Cites § 823 BGB"),
                expect(Expectation::QueryType { query_type: QueryType::Comparison }, "Recognized as a comparison"),
                expect(Expectation::DocumentCount { min: Some(2) }, "Retrieves both provisions"),
            ],
        ),
        test(
            "cross-reference-dismissal-protection",
            "Dismissal protection and works council",
            TestCategory::CrossReference,
            "Does the works council have to be heard before an ordinary dismissal?",
            45,
            vec![
                expect(contains("works council"), "Addresses the works council"),
                expect(Expectation::LegalArea { area: LegalArea::Labor }, "Classified as labor law"),
                expect(Expectation::DocumentCount { min: Some(2) }, "Links at least two provisions"),
            ],
        ),
        // Contradiction
        test(
            "contradiction-special-rule",
            "Special rule overrides general rule",
            TestCategory::Contradiction,
            "The general limitation period is three years, but what applies to warranty claims for buildings?",
            45,
            vec![
                expect(contains("five years"), "States the special limitation period"),
                expect(cites("§ 438"), "Cites the warranty provision"),
                expect(Expectation::MinRelevance { threshold: 0.6 }, "Top source is relevant"),
            ],
        ),
        test(
            "contradiction-false-premise",
            "Question with a false premise",
            TestCategory::Contradiction,
            "Since verbal leases are invalid, how do I prove my tenancy?",
            45,
            vec![
                expect(contains("oral"), "Corrects the premise about oral agreements"),
                expect(Expectation::LegalArea { area: LegalArea::Civil }, "Classified as civil law"),
            ],
        ),
        // Performance
        test(
            "performance-simple-lookup",
            "Simple lookup latency",
            TestCategory::Performance,
            "What is the statutory notice period for tenants?",
            10,
            vec![
                expect(Expectation::MaxLatency { threshold_ms: 3000 }, "Answers within 3 seconds"),
                expect(Expectation::DocumentCount { min: None }, "Returns at least one source"),
            ],
        ),
        test(
            "performance-complex-analysis",
            "Complex analysis latency",
            TestCategory::Performance,
            "Compare the liability of a managing director under § 43 GmbHG with the liability of a board member under § 93 AktG, including burden of proof.",
            20,
            vec![
                expect(Expectation::MaxLatency { threshold_ms: 8000 }, "Answers within 8 seconds"),
                expect(Expectation::QueryType { query_type: QueryType::Comparison }, "Recognized as a comparison"),
                expect(Expectation::LegalArea { area: LegalArea::Commercial }, "Classified as commercial law"),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let catalog = default_catalog();
        let ids: HashSet<&str> = catalog.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn test_every_category_is_covered() {
        let catalog = default_catalog();
        for category in TestCategory::ALL {
            assert!(
                catalog.iter().any(|t| t.category == category),
                "no test for {category}"
            );
        }
    }

    #[test]
    fn test_every_test_has_expectations_and_budget() {
        for test in default_catalog() {
            assert!(!test.expectations.is_empty(), "{} has no expectations", test.id);
            assert!(!test.timeout.is_zero(), "{} has no timeout", test.id);
        }
    }
}
