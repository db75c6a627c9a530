use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{LibError, Result};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct EmployeeId(pub i64);

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EmployeeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

impl From<i64> for EmployeeId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveId(pub Uuid);

impl MoveId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MoveId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MoveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_promoted: Option<NaiveDate>,
    pub manager_id: Option<EmployeeId>,
    /// Drawn on the chart. Anyone with a manager or a report is; a
    /// standalone root is only when it was placed there explicitly.
    #[serde(default)]
    pub on_chart: bool,
}

impl Employee {
    pub fn new(id: i64, first_name: &str, last_name: &str) -> Self {
        Self {
            id: EmployeeId(id),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            title: None,
            department_id: None,
            department_name: None,
            last_promoted: None,
            manager_id: None,
            on_chart: false,
        }
    }

    pub fn with_manager(mut self, manager_id: i64) -> Self {
        self.manager_id = Some(EmployeeId(manager_id));
        self
    }

    pub fn placed(mut self) -> Self {
        self.on_chart = true;
        self
    }
}

/// A "reports-to" relationship: `child_id` is managed by `parent_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportsToEdge {
    pub child_id: EmployeeId,
    pub parent_id: EmployeeId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadAnomaly {
    UnreadableRecord {
        index: usize,
        reason: String,
    },
    UnreadableManager {
        employee_id: EmployeeId,
        reason: String,
    },
    DuplicateEmployee {
        employee_id: EmployeeId,
    },
    SelfManaged {
        employee_id: EmployeeId,
    },
    DanglingManager {
        employee_id: EmployeeId,
        manager_id: EmployeeId,
    },
    CycleBroken {
        employee_id: EmployeeId,
        manager_id: EmployeeId,
    },
}

impl LoadAnomaly {
    pub const fn error_code(&self) -> &'static str {
        match self {
            LoadAnomaly::UnreadableRecord { .. } => "unreadable_employee",
            LoadAnomaly::UnreadableManager { .. } => "unreadable_manager",
            LoadAnomaly::DuplicateEmployee { .. } => "duplicate_employee",
            LoadAnomaly::SelfManaged { .. } => "self_managed",
            LoadAnomaly::DanglingManager { .. } => "dangling_manager",
            LoadAnomaly::CycleBroken { .. } => "manager_cycle",
        }
    }

    pub const fn public_message(&self) -> &'static str {
        match self {
            LoadAnomaly::UnreadableRecord { .. } => "An employee record could not be read",
            LoadAnomaly::UnreadableManager { .. } => {
                "An employee's manager could not be read and was ignored"
            }
            LoadAnomaly::DuplicateEmployee { .. } => {
                "An employee appeared more than once and was loaded once"
            }
            LoadAnomaly::SelfManaged { .. } => {
                "An employee was listed as their own manager and is shown as a root"
            }
            LoadAnomaly::DanglingManager { .. } => {
                "An employee's manager does not exist and the employee is shown as a root"
            }
            LoadAnomaly::CycleBroken { .. } => {
                "A circular reporting line was found and one link was dropped"
            }
        }
    }

    pub fn to_error(&self) -> LibError {
        LibError::malformed(
            self.error_code(),
            self.public_message(),
            anyhow!("employee list anomaly: {:?}", self),
        )
    }
}

/// Employee as the back end sends it. Fields are loosely typed until
/// [`normalize_records`] coerces them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub department_id: Value,
    #[serde(default)]
    pub department_name: Option<String>,
    #[serde(default)]
    pub last_promoted: Value,
    #[serde(default)]
    pub manager_id: Value,
    /// Set when the employee appears in a relationship row.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub on_chart: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipParty {
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub doctor: Option<RelationshipParty>,
    #[serde(default)]
    pub manager: Option<RelationshipParty>,
}

/// Payload of `GET /api/org-chart/data`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgChartData {
    #[serde(default)]
    pub employees: Vec<EmployeeRecord>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl OrgChartData {
    /// Folds relationship rows into each employee's `managerId`. A manager id
    /// already present on the employee record is kept. Everyone named in a
    /// row, on either side, is marked as on the chart; a row with a null
    /// manager is a standalone root.
    pub fn into_records(self) -> Vec<EmployeeRecord> {
        let mut managers: HashMap<i64, Value> = HashMap::new();
        let mut placed: HashSet<i64> = HashSet::new();
        for relationship in self.relationships {
            let Some(doctor) = relationship.doctor else {
                continue;
            };
            let Ok(Some(doctor_id)) = coerce_id(&doctor.id) else {
                continue;
            };
            let manager = relationship
                .manager
                .map(|party| party.id)
                .unwrap_or(Value::Null);
            if let Ok(Some(manager_id)) = coerce_id(&manager) {
                placed.insert(manager_id);
            }
            placed.insert(doctor_id);
            managers.insert(doctor_id, manager);
        }

        self.employees
            .into_iter()
            .map(|mut record| {
                if let Ok(Some(id)) = coerce_id(&record.id) {
                    record.on_chart |= placed.contains(&id);
                    if record.manager_id.is_null()
                        && let Some(manager) = managers.remove(&id)
                    {
                        record.manager_id = manager;
                    }
                }
                record
            })
            .collect()
    }
}

/// Either shape the back end uses for the employee listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EmployeeListResponse {
    List(Vec<EmployeeRecord>),
    Chart(OrgChartData),
}

impl EmployeeListResponse {
    pub fn into_records(self) -> Vec<EmployeeRecord> {
        match self {
            EmployeeListResponse::List(records) => records,
            EmployeeListResponse::Chart(data) => data.into_records(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignManagerPayload {
    pub doctor_id: EmployeeId,
    pub manager_id: Option<EmployeeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveManagerPayload {
    pub doctor_id: EmployeeId,
}

/// How a move changes the chart. `MakeRoot` and `RemoveEdge` both clear the
/// manager; a new root stays on the chart, a removed one goes back to the
/// sidebar unless it still has reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    Assign,
    MakeRoot,
    RemoveEdge,
}

/// A requested change of manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub child: EmployeeId,
    pub parent: Option<EmployeeId>,
    pub kind: MoveKind,
}

impl Move {
    pub const fn assign(child: EmployeeId, parent: EmployeeId) -> Self {
        Self {
            child,
            parent: Some(parent),
            kind: MoveKind::Assign,
        }
    }

    pub const fn make_root(child: EmployeeId) -> Self {
        Self {
            child,
            parent: None,
            kind: MoveKind::MakeRoot,
        }
    }

    pub const fn detach(child: EmployeeId) -> Self {
        Self {
            child,
            parent: None,
            kind: MoveKind::RemoveEdge,
        }
    }

    /// `None` is a standalone root.
    pub const fn set_parent(child: EmployeeId, parent: Option<EmployeeId>) -> Self {
        match parent {
            Some(parent) => Self::assign(child, parent),
            None => Self::make_root(child),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MoveState {
    #[default]
    Idle,
    Pending,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveEvent {
    pub move_id: MoveId,
    pub child: EmployeeId,
    pub parent: Option<EmployeeId>,
    pub state: MoveState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub move_id: MoveId,
    #[serde(rename = "move")]
    pub mv: Move,
    pub state: MoveState,
}

/// Coerces the loosely typed records into [`Employee`]s. Records without a
/// usable id are skipped; unusable manager ids are cleared. Relationship-level
/// checks (dangling or cyclic managers) happen when the hierarchy loads.
pub fn normalize_records(records: Vec<EmployeeRecord>) -> (Vec<Employee>, Vec<LoadAnomaly>) {
    let mut employees = Vec::with_capacity(records.len());
    let mut anomalies = Vec::new();

    for (index, record) in records.into_iter().enumerate() {
        let id = match coerce_id(&record.id) {
            Ok(Some(id)) => EmployeeId(id),
            Ok(None) => {
                anomalies.push(LoadAnomaly::UnreadableRecord {
                    index,
                    reason: "missing id".to_string(),
                });
                continue;
            }
            Err(err) => {
                anomalies.push(LoadAnomaly::UnreadableRecord {
                    index,
                    reason: format!("{:#}", err.source),
                });
                continue;
            }
        };

        let manager_id = match coerce_id(&record.manager_id) {
            Ok(value) => value.map(EmployeeId),
            Err(err) => {
                anomalies.push(LoadAnomaly::UnreadableManager {
                    employee_id: id,
                    reason: format!("{:#}", err.source),
                });
                None
            }
        };

        employees.push(Employee {
            id,
            first_name: trimmed(record.first_name),
            last_name: trimmed(record.last_name),
            title: record.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            department_id: coerce_id(&record.department_id).ok().flatten(),
            department_name: record
                .department_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            last_promoted: coerce_date(&record.last_promoted),
            manager_id,
            on_chart: record.on_chart,
        });
    }

    (employees, anomalies)
}

/// Accepts JSON integers and integer strings. `null`, a missing field and an
/// empty string all mean "no id".
pub fn coerce_id(value: &Value) -> Result<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => number.as_i64().map(Some).ok_or_else(|| {
            LibError::malformed(
                "invalid_id",
                "Employee ids must be whole numbers",
                anyhow!("non-integer id {}", number),
            )
        }),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => text.trim().parse::<i64>().map(Some).map_err(|err| {
            LibError::malformed(
                "invalid_id",
                "Employee ids must be whole numbers",
                anyhow!("unparseable id {:?}: {}", text, err),
            )
        }),
        other => Err(LibError::malformed(
            "invalid_id",
            "Employee ids must be whole numbers",
            anyhow!("unexpected id value {}", other),
        )),
    }
}

fn coerce_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(text) => {
            let date = text.get(..10).unwrap_or(text);
            NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
        }
        // Jackson's default LocalDate shape: [year, month, day]
        Value::Array(parts) if parts.len() == 3 => {
            let year = parts[0].as_i64()?;
            let month = parts[1].as_u64()?;
            let day = parts[2].as_u64()?;
            NaiveDate::from_ymd_opt(
                i32::try_from(year).ok()?,
                u32::try_from(month).ok()?,
                u32::try_from(day).ok()?,
            )
        }
        _ => None,
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> EmployeeRecord {
        serde_json::from_value(value).expect("record should deserialize")
    }

    #[test]
    fn normalize_coerces_numeric_strings() {
        let (employees, anomalies) = normalize_records(vec![record(json!({
            "id": "12",
            "firstName": " Ada ",
            "lastName": "Lovelace",
            "managerId": 3,
            "departmentName": "Cardiology",
            "lastPromoted": "2024-03-01"
        }))]);

        assert!(anomalies.is_empty());
        assert_eq!(employees.len(), 1);
        let employee = &employees[0];
        assert_eq!(employee.id, EmployeeId(12));
        assert_eq!(employee.first_name, "Ada");
        assert_eq!(employee.manager_id, Some(EmployeeId(3)));
        assert_eq!(
            employee.last_promoted,
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn normalize_skips_records_without_id() {
        let (employees, anomalies) = normalize_records(vec![
            record(json!({"firstName": "Nobody"})),
            record(json!({"id": {"nested": true}})),
            record(json!({"id": 1})),
        ]);

        assert_eq!(employees.len(), 1);
        assert_eq!(anomalies.len(), 2);
        assert!(matches!(
            &anomalies[0],
            LoadAnomaly::UnreadableRecord { index: 0, .. }
        ));
        assert!(matches!(
            &anomalies[1],
            LoadAnomaly::UnreadableRecord { index: 1, .. }
        ));
    }

    #[test]
    fn normalize_clears_unreadable_manager() {
        let (employees, anomalies) =
            normalize_records(vec![record(json!({"id": 4, "managerId": "boss"}))]);

        assert_eq!(employees[0].manager_id, None);
        assert!(matches!(
            &anomalies[0],
            LoadAnomaly::UnreadableManager { employee_id, .. } if *employee_id == EmployeeId(4)
        ));
    }

    #[test]
    fn org_chart_data_folds_relationships_into_records() {
        let data: OrgChartData = serde_json::from_value(json!({
            "employees": [
                {"id": 1, "firstName": "A"},
                {"id": 2, "firstName": "B"},
                {"id": 3, "firstName": "C", "managerId": 2}
            ],
            "relationships": [
                {"doctor": {"id": 2}, "manager": {"id": 1}},
                {"doctor": {"id": 1}, "manager": null},
                {"doctor": {"id": 3}, "manager": {"id": 1}}
            ]
        }))
        .expect("chart data should deserialize");

        let (employees, _) = normalize_records(data.into_records());
        let managers: Vec<Option<EmployeeId>> = employees.iter().map(|e| e.manager_id).collect();
        assert_eq!(
            managers,
            vec![None, Some(EmployeeId(1)), Some(EmployeeId(2))]
        );
    }

    #[test]
    fn standalone_root_rows_mark_employees_as_placed() {
        let data: OrgChartData = serde_json::from_value(json!({
            "employees": [
                {"id": 1, "firstName": "Root"},
                {"id": 2, "firstName": "Sidebar"},
                {"id": 3, "firstName": "Report"},
                {"id": 4, "firstName": "Boss"}
            ],
            "relationships": [
                {"doctor": {"id": 1}, "manager": null},
                {"doctor": {"id": 3}, "manager": {"id": 4}}
            ]
        }))
        .expect("chart data should deserialize");

        let (employees, _) = normalize_records(data.into_records());
        let placed: Vec<bool> = employees.iter().map(|e| e.on_chart).collect();
        assert_eq!(placed, vec![true, false, true, true]);
    }

    #[test]
    fn list_response_accepts_plain_arrays() {
        let response: EmployeeListResponse =
            serde_json::from_value(json!([{"id": 5, "managerId": null}]))
                .expect("array should deserialize");
        assert_eq!(response.into_records().len(), 1);
    }

    #[test]
    fn assign_payload_serializes_null_manager() {
        let payload = AssignManagerPayload {
            doctor_id: EmployeeId(7),
            manager_id: None,
        };
        assert_eq!(
            serde_json::to_value(payload).expect("payload should serialize"),
            json!({"doctorId": 7, "managerId": null})
        );
    }
}
