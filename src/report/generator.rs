//! Markdown and JSON rendering.
//!
//! Turns the computed dashboard and grouped lab reports into printable
//! Markdown, or pretty JSON for other tools to consume.

use crate::analysis::{Dashboard, GroupedReport, GrowthTrend, Insights};
use crate::models::{LabReport, LabSettings};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

fn timestamp(value: Option<&DateTime<Utc>>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Human-readable message for the growth insight.
pub fn growth_message(growth: &GrowthTrend) -> String {
    match growth {
        GrowthTrend::Up { percent } => format!(
            "Revenue is up {}% compared to yesterday.",
            percent.normalize()
        ),
        GrowthTrend::Flat => "Good activity today, orders are coming in.".to_string(),
        GrowthTrend::NoData => "No orders yet today. Business is steady.".to_string(),
    }
}

/// Generate the Markdown dashboard.
pub fn generate_dashboard_markdown(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    output.push_str("# Lab Dashboard\n\n");
    output.push_str(&format!(
        "*Generated {} | Range: last {} days*\n\n",
        dashboard.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        dashboard.range.days()
    ));

    output.push_str(&generate_stats_section(dashboard));
    output.push_str(&generate_insights_section(&dashboard.insights));
    output.push_str(&generate_revenue_section(dashboard));
    output.push_str(&generate_breakdowns_section(dashboard));
    output.push_str(&generate_activity_section(dashboard));

    output
}

fn generate_stats_section(dashboard: &Dashboard) -> String {
    let stats = &dashboard.stats;
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str("| Patients | Orders | Pending | Revenue | Today |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} |\n\n",
        stats.total_patients,
        stats.total_orders,
        stats.pending_orders,
        money(stats.total_revenue),
        stats.today_orders
    ));

    section
}

fn generate_insights_section(insights: &Insights) -> String {
    let mut section = String::new();

    section.push_str("## Insights\n\n");
    section.push_str(&format!("- **Growth:** {}\n", growth_message(&insights.growth)));
    section.push_str(&format!(
        "- **Revenue today / yesterday:** {} / {}\n",
        money(insights.today_revenue),
        money(insights.yesterday_revenue)
    ));

    match &insights.top_referrer {
        Some(referrer) => section.push_str(&format!(
            "- **Top referrer this month:** {} ({} orders)\n",
            referrer.name, referrer.count
        )),
        None => section.push_str("- **Top referrer this month:** none yet\n"),
    }

    match &insights.top_test {
        Some(test) => section.push_str(&format!(
            "- **Most ordered test:** {} ({} times)\n",
            test.name, test.count
        )),
        None => section.push_str("- **Most ordered test:** none yet\n"),
    }

    section.push('\n');
    section
}

fn generate_revenue_section(dashboard: &Dashboard) -> String {
    let mut section = String::new();

    section.push_str("## Revenue\n\n");
    section.push_str("| Day | Date | Orders | Revenue |\n");
    section.push_str("|:---|:---|:---:|---:|\n");

    for point in &dashboard.revenue_series {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            point.label,
            point.date,
            point.orders,
            money(point.revenue)
        ));
    }

    let total = dashboard
        .revenue_series
        .iter()
        .fold(Decimal::ZERO, |sum, p| sum.saturating_add(p.revenue));
    section.push_str(&format!("| **Total** | | | **{}** |\n\n", money(total)));

    section
}

fn generate_breakdowns_section(dashboard: &Dashboard) -> String {
    let mut section = String::new();

    section.push_str("## Breakdowns\n\n");

    section.push_str("### Patients by Gender\n\n");
    if dashboard.demographics.is_empty() {
        section.push_str("No patients registered.\n\n");
    } else {
        section.push_str("| Gender | Patients |\n|:---|:---:|\n");
        for slice in &dashboard.demographics {
            section.push_str(&format!("| {} | {} |\n", slice.name, slice.count));
        }
        section.push('\n');
    }

    section.push_str("### Orders by Status\n\n");
    if dashboard.status_breakdown.is_empty() {
        section.push_str("No active orders.\n\n");
    } else {
        section.push_str("| Status | Orders |\n|:---|:---:|\n");
        for slice in &dashboard.status_breakdown {
            section.push_str(&format!("| {} | {} |\n", slice.name, slice.count));
        }
        section.push('\n');
    }

    section.push_str("### Top Tests\n\n");
    if dashboard.top_tests.is_empty() {
        section.push_str("No tests ordered.\n\n");
    } else {
        section.push_str("| # | Test | Orders |\n|:---:|:---|:---:|\n");
        for (i, test) in dashboard.top_tests.iter().enumerate() {
            section.push_str(&format!("| {} | {} | {} |\n", i + 1, test.name, test.count));
        }
        section.push('\n');
    }

    section
}

fn generate_activity_section(dashboard: &Dashboard) -> String {
    let mut section = String::new();

    section.push_str("## Recent Activity\n\n");
    if dashboard.recent_activity.is_empty() {
        section.push_str("Nothing recorded yet.\n");
        return section;
    }

    for item in &dashboard.recent_activity {
        section.push_str(&format!(
            "- `{}` **{}**: {}\n",
            item.timestamp.format("%Y-%m-%d %H:%M"),
            item.title,
            item.description
        ));
    }

    section
}

/// Generate the printable Markdown lab report.
pub fn generate_lab_report_markdown(
    report: &LabReport,
    grouped: &GroupedReport,
    settings: &LabSettings,
) -> String {
    let mut output = String::new();

    output.push_str(&generate_letterhead(settings));
    output.push_str(&generate_patient_section(report));
    output.push_str(&generate_results_section(grouped));
    output.push_str(&generate_signatures(settings));

    output
}

fn generate_letterhead(settings: &LabSettings) -> String {
    let mut section = String::new();

    let name = if settings.lab_name.trim().is_empty() {
        "Laboratory Report"
    } else {
        settings.lab_name.trim()
    };
    section.push_str(&format!("# {}\n\n", name));

    if let Some(ref header) = settings.header_image {
        section.push_str(&format!("![header]({})\n\n", header));
    }

    let contact: Vec<&str> = [&settings.address, &settings.phone, &settings.email]
        .into_iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !contact.is_empty() {
        section.push_str(&format!("{}\n\n", contact.join(" | ")));
    }

    section
}

fn generate_patient_section(report: &LabReport) -> String {
    let mut section = String::new();

    section.push_str("## Patient\n\n");
    section.push_str(&format!("- **Name:** {}\n", report.patient_name));
    section.push_str(&format!("- **Patient ID:** {}\n", report.patient_id));
    section.push_str(&format!(
        "- **Age / Gender:** {} / {}\n",
        report
            .age
            .map(|a| format!("{} yrs", a))
            .unwrap_or_else(|| "-".to_string()),
        if report.gender.is_empty() { "-" } else { report.gender.as_str() }
    ));
    if !report.phone.is_empty() {
        section.push_str(&format!("- **Phone:** {}\n", report.phone));
    }
    if let Some(ref referred_by) = report.referred_by {
        section.push_str(&format!("- **Referred By:** {}\n", referred_by));
    }
    section.push_str(&format!("- **Report ID:** {}\n", report.id));
    section.push_str(&format!(
        "- **Sample Collected:** {}\n",
        timestamp(report.sample_date.as_ref())
    ));
    section.push_str(&format!(
        "- **Billed:** {}\n",
        timestamp(report.billing_date.as_ref())
    ));
    section.push_str(&format!(
        "- **Reported:** {}\n\n",
        timestamp(report.report_date.as_ref())
    ));

    section
}

fn generate_results_section(grouped: &GroupedReport) -> String {
    let mut section = String::new();

    section.push_str("## Results\n\n");

    if grouped.groups.is_empty() {
        section.push_str("No results recorded for this report.\n\n");
        return section;
    }

    for group in &grouped.groups {
        section.push_str(&format!("### {}\n\n", group.category));
        section.push_str("| Test | Result | Unit | Reference Range | Method |\n");
        section.push_str("|:---|:---:|:---:|:---|:---|\n");

        for result in &group.results {
            let value = match result.flag {
                Some(flag) => format!("**{}** {}", result.result, flag),
                None => result.result.clone(),
            };
            section.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                result.name,
                value,
                result.unit,
                result.display_range(),
                result.method
            ));
        }
        section.push('\n');
    }

    section.push_str(&format!(
        "*{} results, {} outside the reference range.*\n\n",
        grouped.total_results, grouped.abnormal_results
    ));

    section
}

fn generate_signatures(settings: &LabSettings) -> String {
    let mut section = String::new();

    if !settings.signatures.is_empty() {
        section.push_str("---\n\n");
        for signature in &settings.signatures {
            section.push_str(&format!("**{}**", signature.name));
            if !signature.designation.is_empty() {
                section.push_str(&format!("  \n{}", signature.designation));
            }
            section.push_str("\n\n");
        }
    }

    if let Some(ref footer) = settings.footer_image {
        section.push_str(&format!("![footer]({})\n", footer));
    }

    section
}

/// A lab report with its grouped results and the lab details it prints under.
#[derive(Debug, Serialize)]
pub struct LabReportView<'a> {
    pub lab: &'a LabSettings,
    pub report: &'a LabReport,
    pub results: &'a GroupedReport,
}

/// Render any result as pretty JSON.
pub fn generate_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{compute_dashboard, group_report, TimeRange};
    use crate::models::{CatalogEntry, Order, Patient, Signature, TestResult};
    use chrono::TimeZone;

    fn create_test_dashboard() -> Dashboard {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let orders = vec![Order {
            id: "O-1".to_string(),
            patient_id: "P-1".to_string(),
            patient_name: Some("Amina Yusuf".to_string()),
            total_amount: Decimal::from(500),
            created_at: Some(now),
            ..Default::default()
        }];
        let patients = vec![Patient {
            id: "P-1".to_string(),
            name: "Amina Yusuf".to_string(),
            gender: "Female".to_string(),
            created_at: Some(now),
            ..Default::default()
        }];
        compute_dashboard(&patients, &orders, TimeRange::Week, &now)
    }

    #[test]
    fn test_growth_messages() {
        assert_eq!(
            growth_message(&GrowthTrend::Up {
                percent: Decimal::new(2250, 1)
            }),
            "Revenue is up 225% compared to yesterday."
        );
        assert!(growth_message(&GrowthTrend::Flat).contains("Good activity"));
        assert!(growth_message(&GrowthTrend::NoData).contains("No orders yet"));
    }

    #[test]
    fn test_generate_dashboard_markdown() {
        let markdown = generate_dashboard_markdown(&create_test_dashboard());

        assert!(markdown.contains("# Lab Dashboard"));
        assert!(markdown.contains("## Overview"));
        assert!(markdown.contains("| 1 | 1 | 1 | 500.00 | 1 |"));
        assert!(markdown.contains("Revenue is up 100%"));
        assert!(markdown.contains("| Female | 1 |"));
        assert!(markdown.contains("Amina Yusuf registered"));
        assert!(markdown.contains("| **Total** | | | **500.00** |"));
    }

    #[test]
    fn test_generate_lab_report_markdown() {
        let report = LabReport {
            id: "R-1".to_string(),
            patient_name: "Amina Yusuf".to_string(),
            patient_id: "P-1".to_string(),
            age: Some(34),
            gender: "Female".to_string(),
            tests: vec![
                TestResult {
                    name: "Hemoglobin".to_string(),
                    result: "10.0".to_string(),
                    unit: "g/dL".to_string(),
                    ..Default::default()
                },
                TestResult {
                    name: "Mystery Test".to_string(),
                    result: "Positive".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let catalog = vec![CatalogEntry {
            name: "Hemoglobin".to_string(),
            category: "Hematology".to_string(),
            reference_range: Some("12.0 - 15.0".to_string()),
            ..Default::default()
        }];
        let settings = LabSettings {
            lab_name: "Hodan Diagnostics".to_string(),
            phone: "+252 61 000 0000".to_string(),
            signatures: vec![Signature {
                name: "Dr. Faisal".to_string(),
                designation: "Pathologist".to_string(),
            }],
            ..Default::default()
        };

        let grouped = group_report(&report.tests, &catalog);
        let markdown = generate_lab_report_markdown(&report, &grouped, &settings);

        assert!(markdown.starts_with("# Hodan Diagnostics"));
        assert!(markdown.contains("34 yrs / Female"));
        assert!(markdown.contains("### Hematology"));
        assert!(markdown.contains("**10.0** LOW"));
        assert!(markdown.contains("| Mystery Test | Positive |  | Not available | Standard |"));
        assert!(markdown.find("### Hematology") < markdown.find("### Other Tests"));
        assert!(markdown.contains("2 results, 1 outside"));
        assert!(markdown.contains("**Dr. Faisal**"));
    }

    #[test]
    fn test_generate_json() {
        let json = generate_json(&create_test_dashboard()).unwrap();

        assert!(json.contains("\"stats\""));
        assert!(json.contains("\"revenue_series\""));
        assert!(json.contains("\"trend\": \"up\""));
    }

    #[test]
    fn test_lab_report_view_json() {
        let report = LabReport {
            id: "R-1".to_string(),
            tests: vec![TestResult {
                name: "Glucose".to_string(),
                result: "180".to_string(),
                reference_range: Some("70 - 110".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let grouped = group_report(&report.tests, &[]);
        let settings = LabSettings::default();

        let json = generate_json(&LabReportView {
            lab: &settings,
            report: &report,
            results: &grouped,
        })
        .unwrap();

        assert!(json.contains("\"category\": \"Other Tests\""));
        assert!(json.contains("\"flag\": \"HIGH\""));
    }
}
