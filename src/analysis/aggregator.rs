//! Dashboard aggregation and statistics.
//!
//! This module turns the raw patient and order collections into the
//! headline numbers, revenue series, breakdowns, insights and activity
//! feed shown on the dashboard. Every function here is pure: the caller
//! passes the current instant, and records whose timestamps are missing
//! are left out of the day-keyed views only.

use crate::analysis::ranking::{RankedItem, Tally};
use crate::models::{Order, OrderStatus, Patient};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Number of tests listed in the top-tests chart.
pub const TOP_TESTS_LIMIT: usize = 5;

/// Number of events kept in the recent activity feed.
pub const RECENT_ACTIVITY_LIMIT: usize = 6;

/// Referral value meaning the patient came on their own.
const SELF_REFERRAL: &str = "Self";

/// Trailing window for the revenue series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    /// Last 7 days, today included.
    #[default]
    Week,
    /// Last 30 days, today included.
    Month,
}

impl TimeRange {
    /// Number of daily buckets in the window.
    pub fn days(&self) -> i64 {
        match self {
            TimeRange::Week => 7,
            TimeRange::Month => 30,
        }
    }

    fn label_format(&self) -> &'static str {
        match self {
            TimeRange::Week => "%a",
            TimeRange::Month => "%b %d",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::Week => write!(f, "week"),
            TimeRange::Month => write!(f, "month"),
        }
    }
}

/// Headline counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_patients: usize,
    pub total_orders: usize,
    pub pending_orders: usize,
    pub total_revenue: Decimal,
    pub today_orders: usize,
}

/// Today's revenue compared with yesterday's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trend", rename_all = "snake_case")]
pub enum GrowthTrend {
    /// Today beat yesterday by `percent`.
    Up { percent: Decimal },
    /// Orders came in today but revenue did not beat yesterday.
    Flat,
    /// Nothing was ordered today.
    NoData,
}

/// Ranked highlights for the insights card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub growth: GrowthTrend,
    pub today_revenue: Decimal,
    pub yesterday_revenue: Decimal,
    /// Most frequent referral this calendar month.
    pub top_referrer: Option<RankedItem>,
    /// Most frequently ordered test overall.
    pub top_test: Option<RankedItem>,
}

/// One calendar-day bucket of the revenue series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub date: NaiveDate,
    pub label: String,
    pub revenue: Decimal,
    pub orders: usize,
}

/// A named count in a categorical breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownSlice {
    pub name: String,
    pub count: usize,
}

/// Which kind of record produced an activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Order,
    Patient,
}

/// An entry in the recent activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub kind: ActivityKind,
    pub id: String,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything the dashboard displays, computed in one pass over the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub range: TimeRange,
    pub generated_at: DateTime<Utc>,
    pub stats: DashboardStats,
    pub insights: Insights,
    pub revenue_series: Vec<RevenuePoint>,
    pub demographics: Vec<BreakdownSlice>,
    pub status_breakdown: Vec<BreakdownSlice>,
    pub top_tests: Vec<RankedItem>,
    pub recent_activity: Vec<ActivityItem>,
}

/// Compute the full dashboard as of `now`.
///
/// Calendar days are taken in `now`'s time zone.
pub fn compute_dashboard<Tz: TimeZone>(
    patients: &[Patient],
    orders: &[Order],
    range: TimeRange,
    now: &DateTime<Tz>,
) -> Dashboard {
    let undated_orders = orders.iter().filter(|o| o.created_at.is_none()).count();
    let undated_patients = patients.iter().filter(|p| p.created_at.is_none()).count();
    if undated_orders > 0 || undated_patients > 0 {
        debug!(
            "Excluding {} orders and {} patients without timestamps from dated views",
            undated_orders, undated_patients
        );
    }

    Dashboard {
        range,
        generated_at: now.with_timezone(&Utc),
        stats: compute_stats(patients, orders, now),
        insights: compute_insights(orders, now),
        revenue_series: revenue_series(orders, range, now),
        demographics: demographic_breakdown(patients),
        status_breakdown: status_breakdown(orders),
        top_tests: top_tests(orders, TOP_TESTS_LIMIT),
        recent_activity: recent_activity(patients, orders, RECENT_ACTIVITY_LIMIT),
    }
}

/// Calendar date of a stored timestamp in the given zone.
fn local_date<Tz: TimeZone>(timestamp: Option<&DateTime<Utc>>, tz: &Tz) -> Option<NaiveDate> {
    timestamp.map(|t| t.with_timezone(tz).date_naive())
}

fn orders_on<'a, Tz: TimeZone>(
    orders: &'a [Order],
    day: NaiveDate,
    tz: &'a Tz,
) -> impl Iterator<Item = &'a Order> + 'a {
    orders
        .iter()
        .filter(move |o| local_date(o.created_at.as_ref(), tz) == Some(day))
}

/// Sum order totals, saturating instead of overflowing.
fn revenue_of<'a>(orders: impl Iterator<Item = &'a Order>) -> Decimal {
    orders.fold(Decimal::ZERO, |sum, o| sum.saturating_add(o.total_amount))
}

/// Percentage change from `yesterday` to `today`, one decimal place.
///
/// `yesterday` must be non-zero. Saturates at `Decimal::MAX` when the ratio
/// does not fit.
fn growth_percent(today: Decimal, yesterday: Decimal) -> Decimal {
    today
        .checked_sub(yesterday)
        .and_then(|delta| delta.checked_div(yesterday))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|percent| percent.round_dp(1))
        .unwrap_or(Decimal::MAX)
}

/// Compute the headline counters.
pub fn compute_stats<Tz: TimeZone>(
    patients: &[Patient],
    orders: &[Order],
    now: &DateTime<Tz>,
) -> DashboardStats {
    let today = now.date_naive();
    let tz = now.timezone();

    DashboardStats {
        total_patients: patients.len(),
        total_orders: orders.len(),
        pending_orders: orders
            .iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .count(),
        total_revenue: revenue_of(orders.iter()),
        today_orders: orders_on(orders, today, &tz).count(),
    }
}

/// Compute the growth trend and the top referrer/test highlights.
pub fn compute_insights<Tz: TimeZone>(orders: &[Order], now: &DateTime<Tz>) -> Insights {
    let tz = now.timezone();
    let today = now.date_naive();
    let yesterday = today - Duration::days(1);

    let today_orders: Vec<&Order> = orders_on(orders, today, &tz).collect();
    let today_revenue = revenue_of(today_orders.iter().copied());
    let yesterday_revenue = revenue_of(orders_on(orders, yesterday, &tz));

    let growth = if today_revenue > yesterday_revenue {
        let percent = if yesterday_revenue.is_zero() {
            Decimal::ONE_HUNDRED
        } else {
            growth_percent(today_revenue, yesterday_revenue)
        };
        GrowthTrend::Up { percent }
    } else if !today_orders.is_empty() {
        GrowthTrend::Flat
    } else {
        GrowthTrend::NoData
    };

    let referrals: Tally = orders
        .iter()
        .filter(|o| {
            o.created_at
                .map(|t| {
                    let local = t.with_timezone(&tz);
                    local.year() == now.year() && local.month() == now.month()
                })
                .unwrap_or(false)
        })
        .filter_map(|o| o.referred_by.as_deref())
        .map(str::trim)
        .filter(|name| *name != SELF_REFERRAL)
        .collect();

    Insights {
        growth,
        today_revenue,
        yesterday_revenue,
        top_referrer: referrals.leader(),
        top_test: test_tally(orders).leader(),
    }
}

fn test_tally(orders: &[Order]) -> Tally {
    orders
        .iter()
        .flat_map(|o| o.tests.iter())
        .map(|t| t.name.as_str())
        .collect()
}

/// Build the daily revenue series for the trailing window, oldest first.
pub fn revenue_series<Tz: TimeZone>(
    orders: &[Order],
    range: TimeRange,
    now: &DateTime<Tz>,
) -> Vec<RevenuePoint> {
    let tz = now.timezone();
    let today = now.date_naive();

    (0..range.days())
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let (revenue, count) = orders_on(orders, date, &tz)
                .fold((Decimal::ZERO, 0usize), |(sum, n), o| {
                    (sum.saturating_add(o.total_amount), n + 1)
                });

            RevenuePoint {
                date,
                label: date.format(range.label_format()).to_string(),
                revenue,
                orders: count,
            }
        })
        .collect()
}

/// Bucket a stored gender value.
pub fn normalize_gender(gender: &str) -> &'static str {
    match gender.trim().to_lowercase().as_str() {
        "male" | "m" => "Male",
        "female" | "f" => "Female",
        _ => "Other",
    }
}

/// Patient counts by gender, zero buckets omitted.
pub fn demographic_breakdown(patients: &[Patient]) -> Vec<BreakdownSlice> {
    let mut counts = [("Male", 0usize), ("Female", 0), ("Other", 0)];

    for patient in patients {
        let bucket = normalize_gender(&patient.gender);
        if let Some(slot) = counts.iter_mut().find(|(name, _)| *name == bucket) {
            slot.1 += 1;
        }
    }

    non_zero_slices(&counts)
}

/// Order counts by active status, zero buckets omitted.
///
/// Cancelled and unrecognized statuses are not charted.
pub fn status_breakdown(orders: &[Order]) -> Vec<BreakdownSlice> {
    let charted = [
        OrderStatus::Completed,
        OrderStatus::Pending,
        OrderStatus::Processing,
    ];

    let counts: Vec<(&str, usize)> = charted
        .iter()
        .map(|status| {
            let count = orders.iter().filter(|o| o.status == *status).count();
            (status.as_str(), count)
        })
        .collect();

    non_zero_slices(&counts)
}

fn non_zero_slices(counts: &[(&str, usize)]) -> Vec<BreakdownSlice> {
    counts
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(name, count)| BreakdownSlice {
            name: name.to_string(),
            count: *count,
        })
        .collect()
}

/// The `n` most frequently ordered tests across all order lines.
pub fn top_tests(orders: &[Order], n: usize) -> Vec<RankedItem> {
    test_tally(orders).top(n)
}

/// Newest order and registration events, at most `limit` of them.
pub fn recent_activity(patients: &[Patient], orders: &[Order], limit: usize) -> Vec<ActivityItem> {
    let order_events = orders.iter().filter_map(|order| {
        let timestamp = order.created_at?;
        let who = order
            .patient_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&order.patient_id);

        Some(ActivityItem {
            kind: ActivityKind::Order,
            id: order.id.clone(),
            title: format!("Order {}", order.id),
            description: format!(
                "{} - {} - {}",
                who,
                pluralize(order.tests.len(), "test"),
                order.total_amount
            ),
            timestamp,
        })
    });

    let patient_events = patients.iter().filter_map(|patient| {
        let timestamp = patient.created_at?;
        let name = if patient.name.trim().is_empty() {
            patient.id.as_str()
        } else {
            patient.name.trim()
        };

        let mut details = Vec::new();
        if let Some(age) = patient.age {
            details.push(format!("{} yrs", age));
        }
        if !patient.gender.trim().is_empty() {
            details.push(patient.gender.trim().to_string());
        }

        Some(ActivityItem {
            kind: ActivityKind::Patient,
            id: patient.id.clone(),
            title: format!("{} registered", name),
            description: details.join(", "),
            timestamp,
        })
    });

    let mut events: Vec<ActivityItem> = order_events.chain(patient_events).collect();
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events.truncate(limit);
    events
}

fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
