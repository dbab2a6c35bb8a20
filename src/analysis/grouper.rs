//! Report grouping by test category.
//!
//! Resolves each result of a lab report against the test catalog, fills in
//! reference range and method where the report left them blank, flags
//! out-of-range values and groups the results by category for printing.

use crate::analysis::reference_range::{evaluate, AbnormalFlag};
use crate::models::{CatalogEntry, TestResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Category for results with no catalog entry.
pub const OTHER_CATEGORY: &str = "Other Tests";

/// Method printed when neither the result nor the catalog names one.
pub const DEFAULT_METHOD: &str = "Standard";

/// Printed in place of a missing reference range.
pub const RANGE_NOT_AVAILABLE: &str = "Not available";

/// A result ready for printing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedResult {
    pub name: String,
    pub result: String,
    pub unit: String,
    pub reference_range: Option<String>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub flag: Option<AbnormalFlag>,
}

impl GroupedResult {
    /// The reference range as printed.
    pub fn display_range(&self) -> &str {
        self.reference_range
            .as_deref()
            .unwrap_or(RANGE_NOT_AVAILABLE)
    }
}

/// All results of one category, in report order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub category: String,
    pub results: Vec<GroupedResult>,
}

/// A report's results grouped by category, categories in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedReport {
    pub groups: Vec<CategoryGroup>,
    pub total_results: usize,
    pub abnormal_results: usize,
}

/// Read-only index over the test catalog.
pub struct Catalog<'a> {
    by_name: HashMap<String, &'a CatalogEntry>,
    by_code: HashMap<String, &'a CatalogEntry>,
}

fn lookup_key(s: &str) -> String {
    s.trim().to_lowercase()
}

impl<'a> Catalog<'a> {
    /// Index `entries` by name and code. The first entry wins on duplicates.
    pub fn new(entries: &'a [CatalogEntry]) -> Self {
        let mut by_name = HashMap::new();
        let mut by_code = HashMap::new();

        for entry in entries {
            by_name.entry(lookup_key(&entry.name)).or_insert(entry);
            if let Some(code) = entry.code.as_deref().filter(|c| !c.trim().is_empty()) {
                by_code.entry(lookup_key(code)).or_insert(entry);
            }
        }

        Self { by_name, by_code }
    }

    /// Find the catalog entry for a result, by name and then by code.
    pub fn lookup(&self, result: &TestResult) -> Option<&'a CatalogEntry> {
        self.by_name
            .get(&lookup_key(&result.name))
            .or_else(|| {
                result
                    .code
                    .as_deref()
                    .and_then(|code| self.by_code.get(&lookup_key(code)))
            })
            .copied()
    }
}

/// First non-blank value of the two.
fn fill_forward(own: Option<&str>, fallback: Option<&str>) -> Option<String> {
    own.map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| fallback.map(str::trim).filter(|s| !s.is_empty()))
        .map(String::from)
}

/// Resolve one result against the catalog.
fn resolve(result: &TestResult, entry: Option<&CatalogEntry>) -> (String, GroupedResult) {
    let category = entry
        .map(|e| e.category.trim())
        .filter(|c| !c.is_empty())
        .unwrap_or(OTHER_CATEGORY)
        .to_string();

    let reference_range = fill_forward(
        result.reference_range.as_deref(),
        entry.and_then(|e| e.reference_range.as_deref()),
    );
    let method = fill_forward(result.method.as_deref(), entry.and_then(|e| e.method.as_deref()))
        .unwrap_or_else(|| DEFAULT_METHOD.to_string());
    let unit = fill_forward(Some(result.unit.as_str()), entry.and_then(|e| e.unit.as_deref()))
        .unwrap_or_default();
    let flag = evaluate(reference_range.as_deref(), &result.result);

    (
        category,
        GroupedResult {
            name: result.name.clone(),
            result: result.result.clone(),
            unit,
            reference_range,
            method,
            code: result.code.clone(),
            flag,
        },
    )
}

/// Group a report's results by catalog category.
pub fn group_report(results: &[TestResult], catalog: &[CatalogEntry]) -> GroupedReport {
    let catalog = Catalog::new(catalog);
    let mut grouped: BTreeMap<String, Vec<GroupedResult>> = BTreeMap::new();

    for result in results {
        let (category, resolved) = resolve(result, catalog.lookup(result));
        grouped.entry(category).or_default().push(resolved);
    }

    let abnormal_results = grouped
        .values()
        .flatten()
        .filter(|r| r.flag.is_some())
        .count();

    GroupedReport {
        groups: grouped
            .into_iter()
            .map(|(category, results)| CategoryGroup { category, results })
            .collect(),
        total_results: results.len(),
        abnormal_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_catalog_entry(name: &str, category: &str, range: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            category: category.to_string(),
            reference_range: range.map(String::from),
            ..Default::default()
        }
    }

    fn create_test_result(name: &str, result: &str) -> TestResult {
        TestResult {
            name: name.to_string(),
            result: result.to_string(),
            unit: String::new(),
            reference_range: None,
            method: None,
            code: None,
        }
    }

    #[test]
    fn test_catalogued_and_unknown_tests() {
        let catalog = vec![create_catalog_entry("CBC", "Hematology", None)];
        let results = vec![
            create_test_result("Mystery Test", "7"),
            create_test_result("CBC", "normal"),
        ];

        let report = group_report(&results, &catalog);
        let categories: Vec<_> = report.groups.iter().map(|g| g.category.as_str()).collect();

        assert_eq!(categories, vec!["Hematology", OTHER_CATEGORY]);
        assert_eq!(report.groups[0].results[0].name, "CBC");
        assert_eq!(report.groups[1].results[0].name, "Mystery Test");
        assert_eq!(report.groups[1].results[0].method, DEFAULT_METHOD);
        assert_eq!(report.groups[1].results[0].display_range(), RANGE_NOT_AVAILABLE);
        assert_eq!(report.total_results, 2);
    }

    #[test]
    fn test_categories_sorted_and_order_preserved() {
        let catalog = vec![
            create_catalog_entry("TSH", "Thyroid", None),
            create_catalog_entry("T3", "Thyroid", None),
            create_catalog_entry("ALT", "Biochemistry", None),
            create_catalog_entry("Hemoglobin", "Hematology", None),
        ];
        let results = vec![
            create_test_result("TSH", "2.1"),
            create_test_result("Hemoglobin", "13"),
            create_test_result("T3", "1.1"),
            create_test_result("ALT", "30"),
        ];

        let report = group_report(&results, &catalog);
        let categories: Vec<_> = report.groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(categories, vec!["Biochemistry", "Hematology", "Thyroid"]);

        let thyroid: Vec<_> = report.groups[2].results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(thyroid, vec!["TSH", "T3"]);
    }

    #[test]
    fn test_fill_forward_prefers_result_values() {
        let mut entry = create_catalog_entry("Hemoglobin", "Hematology", Some("12.0 - 15.0"));
        entry.method = Some("Cyanmethemoglobin".to_string());
        entry.unit = Some("g/dL".to_string());
        let catalog = vec![entry];

        let mut own = create_test_result("hemoglobin", "16.0");
        own.reference_range = Some("13.0 - 17.0".to_string());
        own.method = Some("  ".to_string());
        let inherited = create_test_result("Hemoglobin", "16.0");

        let report = group_report(&[own, inherited], &catalog);
        let results = &report.groups[0].results;

        assert_eq!(results[0].display_range(), "13.0 - 17.0");
        assert_eq!(results[0].method, "Cyanmethemoglobin");
        assert_eq!(results[0].flag, None);
        assert_eq!(results[1].display_range(), "12.0 - 15.0");
        assert_eq!(results[1].unit, "g/dL");
        assert_eq!(results[1].flag, Some(AbnormalFlag::High));
        assert_eq!(report.abnormal_results, 1);
    }

    #[test]
    fn test_lookup_by_code() {
        let mut entry = create_catalog_entry("Thyroid Stimulating Hormone", "Thyroid", None);
        entry.code = Some("TSH".to_string());
        let catalog = vec![entry];

        let mut result = create_test_result("TSH (3rd gen)", "2.0");
        result.code = Some("tsh".to_string());

        let report = group_report(&[result], &catalog);
        assert_eq!(report.groups[0].category, "Thyroid");
    }

    #[test]
    fn test_blank_category_falls_back() {
        let catalog = vec![create_catalog_entry("ESR", "  ", None)];
        let report = group_report(&[create_test_result("ESR", "10")], &catalog);
        assert_eq!(report.groups[0].category, OTHER_CATEGORY);
    }

    #[test]
    fn test_empty_report() {
        let report = group_report(&[], &[]);
        assert_eq!(report, GroupedReport::default());
    }
}
