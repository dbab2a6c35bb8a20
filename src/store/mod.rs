//! Read-only access to an exported record snapshot.
//!
//! A snapshot is a directory holding one JSON file per collection, as
//! exported from the hosted database. Every load is one-shot; the
//! collections are read concurrently and then handed to the analysis code
//! as plain vectors.

use crate::models::{CatalogEntry, LabReport, LabSettings, Order, Patient};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const PATIENTS_FILE: &str = "patients.json";
pub const ORDERS_FILE: &str = "orders.json";
pub const SETTINGS_FILE: &str = "settings.json";
pub const CATALOG_FILE: &str = "catalog.json";
pub const REPORTS_FILE: &str = "reports.json";

/// Errors raised while reading a snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("report not found: {0}")]
    ReportNotFound(String),
}

/// Everything the dashboard needs, loaded together.
#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    pub patients: Vec<Patient>,
    pub orders: Vec<Order>,
}

/// Everything a printed report needs, loaded together.
#[derive(Debug, Clone)]
pub struct ReportData {
    pub report: LabReport,
    pub catalog: Vec<CatalogEntry>,
    pub settings: LabSettings,
}

/// Snapshot directory reader.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Create a store over `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read and parse one collection file. `Ok(None)` if the file is absent.
    async fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        let path = self.root.join(name);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not present in snapshot", path.display());
                return Ok(None);
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Parse { path, source })
    }

    /// Load a collection, falling back to empty when it cannot be read.
    async fn read_collection<T: DeserializeOwned>(&self, name: &str) -> Vec<T> {
        match self.read_json::<Vec<T>>(name).await {
            Ok(Some(items)) => {
                debug!("Loaded {} records from {}", items.len(), name);
                items
            }
            Ok(None) => {
                warn!("{} missing from snapshot, treating as empty", name);
                Vec::new()
            }
            Err(e) => {
                warn!("{}, treating as empty", e);
                Vec::new()
            }
        }
    }

    pub async fn patients(&self) -> Vec<Patient> {
        self.read_collection(PATIENTS_FILE).await
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.read_collection(ORDERS_FILE).await
    }

    /// Lab settings, or defaults when the snapshot has none.
    pub async fn settings(&self) -> Result<LabSettings, StoreError> {
        Ok(self.read_json(SETTINGS_FILE).await?.unwrap_or_default())
    }

    /// The test catalog, or an empty one when the snapshot has none.
    pub async fn catalog(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(self.read_json(CATALOG_FILE).await?.unwrap_or_default())
    }

    /// Find one report by id.
    pub async fn report(&self, id: &str) -> Result<LabReport, StoreError> {
        let reports: Vec<LabReport> = self.read_json(REPORTS_FILE).await?.unwrap_or_default();

        reports
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::ReportNotFound(id.to_string()))
    }

    /// Load patients and orders concurrently.
    pub async fn load_dashboard_data(&self) -> DashboardData {
        let (patients, orders) = futures::join!(self.patients(), self.orders());
        info!(
            "Loaded {} patients and {} orders from {}",
            patients.len(),
            orders.len(),
            self.root.display()
        );
        DashboardData { patients, orders }
    }

    /// Load a report with its catalog and lab settings concurrently.
    pub async fn load_report_data(&self, id: &str) -> Result<ReportData, StoreError> {
        let (report, catalog, settings) =
            futures::try_join!(self.report(id), self.catalog(), self.settings())?;
        info!(
            "Loaded report {} with {} results ({} catalog entries)",
            report.id,
            report.tests.len(),
            catalog.len()
        );
        Ok(ReportData {
            report,
            catalog,
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        std::fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_load_dashboard_data() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            PATIENTS_FILE,
            r#"[{"id": "P-1", "name": "Amina", "gender": "Female", "createdAt": "2024-03-15"}]"#,
        );
        write(
            &dir,
            ORDERS_FILE,
            r#"[{"id": "O-1", "patientId": "P-1", "totalAmount": 500, "status": "pending"}]"#,
        );

        let store = SnapshotStore::new(dir.path());
        let data = tokio_test::block_on(store.load_dashboard_data());

        assert_eq!(data.patients.len(), 1);
        assert_eq!(data.orders.len(), 1);
        assert_eq!(data.orders[0].patient_id, "P-1");
    }

    #[test]
    fn test_null_fields_keep_every_record() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            PATIENTS_FILE,
            r#"[
                {"id": "P-1", "name": "Amina", "gender": null},
                {"id": "P-2", "name": null, "gender": "Male", "phone": null}
            ]"#,
        );
        write(
            &dir,
            ORDERS_FILE,
            r#"[
                {"id": "O-1", "patientId": null, "totalAmount": 500, "status": 3},
                {"id": "O-2", "patientId": "P-2", "tests": null, "referredBy": null, "totalAmount": 250}
            ]"#,
        );

        let store = SnapshotStore::new(dir.path());
        let data = tokio_test::block_on(store.load_dashboard_data());

        assert_eq!(data.patients.len(), 2);
        assert_eq!(data.orders.len(), 2);
        assert_eq!(data.patients[0].gender, "");
        assert_eq!(data.orders[0].patient_id, "");
        assert!(data.orders[1].tests.is_empty());
    }

    #[test]
    fn test_missing_or_broken_collections_are_empty() {
        let dir = TempDir::new().unwrap();
        write(&dir, ORDERS_FILE, "{ not json");

        let store = SnapshotStore::new(dir.path());
        let data = tokio_test::block_on(store.load_dashboard_data());

        assert!(data.patients.is_empty());
        assert!(data.orders.is_empty());
    }

    #[test]
    fn test_load_report_data() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            REPORTS_FILE,
            r#"[
                {"id": "R-1", "patientName": "Amina", "tests": [{"name": "CBC", "result": "13"}]},
                {"id": "R-2", "patientName": "Omar", "tests": []}
            ]"#,
        );
        write(
            &dir,
            CATALOG_FILE,
            r#"[{"name": "CBC", "category": "Hematology"}]"#,
        );

        let store = SnapshotStore::new(dir.path());
        let data = tokio_test::block_on(store.load_report_data("R-1")).unwrap();

        assert_eq!(data.report.patient_name, "Amina");
        assert_eq!(data.catalog.len(), 1);
        assert!(data.settings.lab_name.is_empty());
    }

    #[test]
    fn test_unknown_report_id() {
        let dir = TempDir::new().unwrap();
        write(&dir, REPORTS_FILE, r#"[{"id": "R-1"}]"#);

        let store = SnapshotStore::new(dir.path());
        let err = tokio_test::block_on(store.report("R-9")).unwrap_err();

        assert!(matches!(err, StoreError::ReportNotFound(ref id) if id == "R-9"));
    }

    #[test]
    fn test_malformed_catalog_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, CATALOG_FILE, "[1, 2");

        let store = SnapshotStore::new(dir.path());
        let err = tokio_test::block_on(store.catalog()).unwrap_err();

        assert!(matches!(err, StoreError::Parse { .. }));
    }
}
