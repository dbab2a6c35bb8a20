//! Data models for the LIS record snapshot.
//!
//! These mirror the documents stored in the hosted database: patients,
//! billing orders, lab reports, the test catalog and lab settings. Field
//! names follow the camelCase used by the stored documents.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "String")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
    /// Any status string the store holds that we do not recognize.
    Unknown,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pending" => OrderStatus::Pending,
            "processing" => OrderStatus::Processing,
            "completed" => OrderStatus::Completed,
            "cancelled" | "canceled" => OrderStatus::Cancelled,
            _ => OrderStatus::Unknown,
        }
    }
}

impl From<Value> for OrderStatus {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => OrderStatus::default(),
            Value::String(s) => OrderStatus::from(s),
            _ => OrderStatus::Unknown,
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A registered patient.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, alias = "fullName", deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, with = "lenient::age")]
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub gender: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub phone: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub address: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,
    #[serde(default, with = "lenient::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One test line on an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderedTest {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, with = "lenient::money")]
    pub price: Decimal,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub code: Option<String>,
}

/// A billing/sample order for one patient.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub patient_id: String,
    /// Patient name captured when the order was billed.
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub patient_name: Option<String>,
    /// Referring doctor or clinic.
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub referred_by: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub tests: Vec<OrderedTest>,
    #[serde(default, with = "lenient::money")]
    pub subtotal: Decimal,
    #[serde(default, with = "lenient::money")]
    pub discount: Decimal,
    #[serde(default, with = "lenient::money")]
    pub total_amount: Decimal,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, with = "lenient::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One measured result on a lab report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub result: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub unit: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub reference_range: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub method: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub code: Option<String>,
}

/// A lab report as printed for the patient.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabReport {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub patient_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub patient_id: String,
    #[serde(default, with = "lenient::age")]
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub gender: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub phone: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub referred_by: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub tests: Vec<TestResult>,
    #[serde(default, with = "lenient::timestamp")]
    pub sample_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient::timestamp")]
    pub billing_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient::timestamp")]
    pub report_date: Option<DateTime<Utc>>,
}

/// A known test definition from the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub category: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub code: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub unit: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub reference_range: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub method: Option<String>,
    #[serde(default, with = "lenient::money")]
    pub price: Decimal,
}

/// A signatory printed at the foot of reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub designation: String,
}

/// Lab display details used when printing reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabSettings {
    #[serde(default, deserialize_with = "lenient::string")]
    pub lab_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub phone: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub email: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub header_image: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub footer_image: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub signatures: Vec<Signature>,
}

/// Forgiving (de)serializers for fields the store does not keep in one shape.
///
/// None of these fail the enclosing record: an unreadable value becomes
/// `None` (or zero for money).
pub mod lenient {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::str::FromStr;

    /// Parse a stored timestamp value.
    pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => parse_timestamp_str(s.trim()),
            Value::Number(n) => {
                let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
                Utc.timestamp_millis_opt(millis).single()
            }
            Value::Object(map) => {
                let seconds = map
                    .get("seconds")
                    .or_else(|| map.get("_seconds"))
                    .and_then(Value::as_i64)?;
                let nanos = map
                    .get("nanoseconds")
                    .or_else(|| map.get("_nanoseconds"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                Utc.timestamp_opt(seconds, u32::try_from(nanos).ok()?).single()
            }
            _ => None,
        }
    }

    fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
        if s.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    /// Read a text field, treating `null` as empty.
    ///
    /// Numbers and booleans are kept as their JSON text, so a phone number
    /// stored as a number still reads.
    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(optional_string(deserializer)?.unwrap_or_default())
    }

    /// Read an optional text field. `null`, objects and arrays become `None`.
    pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Read a list field, treating `null` as empty.
    pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// Parse a stored currency value.
    pub fn parse_money(value: &Value) -> Option<Decimal> {
        let text = match value {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => return None,
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .ok()
    }

    pub mod timestamp {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use serde_json::Value;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = Option::<Value>::deserialize(deserializer)?;
            Ok(value.as_ref().and_then(super::parse_timestamp))
        }

        pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            value.serialize(serializer)
        }
    }

    pub mod money {
        use rust_decimal::Decimal;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use serde_json::Value;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = Option::<Value>::deserialize(deserializer)?;
            Ok(value
                .as_ref()
                .and_then(super::parse_money)
                .unwrap_or(Decimal::ZERO))
        }

        pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            Serialize::serialize(value, serializer)
        }
    }

    pub mod age {
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use serde_json::Value;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = Option::<Value>::deserialize(deserializer)?;
            Ok(match value {
                Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
                Some(Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            })
        }

        pub fn serialize<S>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            value.serialize(serializer)
        }
    }
}
