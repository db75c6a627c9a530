//! The reporting-hierarchy forest.
//!
//! Every employee carries at most one manager link, so the "one outgoing edge"
//! rule holds by construction. [`OrgHierarchy::set_parent`] is the only way a
//! link changes after loading, and it refuses self-links and cycles before
//! touching anything.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::algorithms;
use crate::error::Result;
use crate::invariants::{self, ForestViolation, ManagerLookup};
use crate::models::{
    Employee, EmployeeId, EmployeeRecord, LoadAnomaly, Move, MoveKind, ReportsToEdge,
    normalize_records,
};
use crate::pool::UnassignedPool;

/// Full copy of employees and manager links, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchySnapshot {
    employees: Vec<Employee>,
}

impl HierarchySnapshot {
    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn edges(&self) -> Vec<ReportsToEdge> {
        edges_of(&self.employees)
    }

    pub fn manager_of(&self, employee_id: EmployeeId) -> Option<EmployeeId> {
        self.employees
            .iter()
            .find(|employee| employee.id == employee_id)
            .and_then(|employee| employee.manager_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub loaded: usize,
    pub edges: usize,
    pub anomalies: Vec<LoadAnomaly>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrgHierarchy {
    employees: Vec<Employee>,
    index: HashMap<EmployeeId, usize>,
    revision: u64,
}

impl OrgHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_employees(employees: Vec<Employee>) -> (Self, LoadReport) {
        let mut hierarchy = Self::new();
        let report = hierarchy.load_employees(employees);
        (hierarchy, report)
    }

    /// Normalizes raw back end records, then loads them.
    pub fn load_records(&mut self, records: Vec<EmployeeRecord>) -> LoadReport {
        let (employees, mut anomalies) = normalize_records(records);
        for anomaly in &anomalies {
            tracing::warn!(
                code = anomaly.error_code(),
                ?anomaly,
                "skipping unreadable employee data"
            );
        }
        let mut report = self.load_employees(employees);
        anomalies.append(&mut report.anomalies);
        report.anomalies = anomalies;
        report
    }

    /// Replaces every employee. Bad manager links never fail the load: each
    /// one is dropped, the employee becomes a root, and the anomaly is logged
    /// and returned in the report.
    pub fn load_employees(&mut self, employees: Vec<Employee>) -> LoadReport {
        let mut anomalies = Vec::new();
        let mut seen = HashSet::with_capacity(employees.len());
        let mut accepted = Vec::with_capacity(employees.len());
        for employee in employees {
            if seen.insert(employee.id) {
                accepted.push(employee);
            } else {
                anomalies.push(LoadAnomaly::DuplicateEmployee {
                    employee_id: employee.id,
                });
            }
        }

        for employee in &mut accepted {
            let Some(manager_id) = employee.manager_id else {
                continue;
            };
            if manager_id == employee.id {
                anomalies.push(LoadAnomaly::SelfManaged {
                    employee_id: employee.id,
                });
                employee.manager_id = None;
            } else if !seen.contains(&manager_id) {
                anomalies.push(LoadAnomaly::DanglingManager {
                    employee_id: employee.id,
                    manager_id,
                });
                employee.manager_id = None;
            }
        }

        let mut managers: HashMap<EmployeeId, Option<EmployeeId>> = accepted
            .iter()
            .map(|employee| (employee.id, employee.manager_id))
            .collect();
        for employee in &mut accepted {
            let Some(manager_id) = employee.manager_id else {
                continue;
            };
            let closes_loop = algorithms::is_ancestor(employee.id, manager_id, |id| {
                managers.get(&id).copied().flatten()
            });
            if closes_loop {
                anomalies.push(LoadAnomaly::CycleBroken {
                    employee_id: employee.id,
                    manager_id,
                });
                employee.manager_id = None;
                managers.insert(employee.id, None);
            }
        }

        for anomaly in &anomalies {
            tracing::warn!(
                code = anomaly.error_code(),
                ?anomaly,
                "repaired employee data while loading"
            );
        }

        let managing: HashSet<EmployeeId> = accepted
            .iter()
            .filter_map(|employee| employee.manager_id)
            .collect();
        for employee in &mut accepted {
            if employee.manager_id.is_some() || managing.contains(&employee.id) {
                employee.on_chart = true;
            }
        }

        self.replace(accepted);
        let report = LoadReport {
            loaded: self.employees.len(),
            edges: self.edge_count(),
            anomalies,
        };
        tracing::debug!(
            loaded = report.loaded,
            edges = report.edges,
            anomalies = report.anomalies.len(),
            revision = self.revision,
            "loaded employee hierarchy"
        );
        report
    }

    /// Sets `child`'s manager; `None` makes it a standalone root that stays on
    /// the chart.
    pub fn set_parent(
        &mut self,
        child: EmployeeId,
        parent: Option<EmployeeId>,
    ) -> Result<HierarchySnapshot> {
        self.apply(Move::set_parent(child, parent))
    }

    /// Clears `child`'s manager and takes it off the chart unless it still
    /// manages someone.
    pub fn remove_edge(&mut self, child: EmployeeId) -> Result<HierarchySnapshot> {
        self.apply(Move::detach(child))
    }

    /// Rejected moves leave the hierarchy untouched.
    pub fn apply(&mut self, mv: Move) -> Result<HierarchySnapshot> {
        self.validate(mv)?;

        let still_manages = self
            .employees
            .iter()
            .any(|employee| employee.manager_id == Some(mv.child));
        if let Some(&position) = self.index.get(&mv.child) {
            let employee = &mut self.employees[position];
            employee.manager_id = mv.parent;
            employee.on_chart = match mv.kind {
                MoveKind::RemoveEdge => still_manages,
                MoveKind::Assign | MoveKind::MakeRoot => true,
            };
        }
        if let Some(parent) = mv.parent
            && let Some(&position) = self.index.get(&parent)
        {
            self.employees[position].on_chart = true;
        }

        self.revision += 1;
        tracing::debug!(
            employee_id = %mv.child,
            manager_id = ?mv.parent,
            kind = ?mv.kind,
            revision = self.revision,
            "updated reporting line"
        );
        Ok(self.snapshot())
    }

    /// Checks a move without applying it.
    pub fn validate(&self, mv: Move) -> Result<()> {
        match invariants::move_violation(mv, self) {
            Some(violation) => Err(violation.into_error()),
            None => Ok(()),
        }
    }

    pub fn snapshot(&self) -> HierarchySnapshot {
        HierarchySnapshot {
            employees: self.employees.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: HierarchySnapshot) {
        self.replace(snapshot.employees);
        tracing::debug!(revision = self.revision, "restored hierarchy snapshot");
    }

    pub fn employee(&self, employee_id: EmployeeId) -> Option<&Employee> {
        self.index
            .get(&employee_id)
            .map(|&position| &self.employees[position])
    }

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn contains(&self, employee_id: EmployeeId) -> bool {
        self.index.contains_key(&employee_id)
    }

    pub fn manager_of(&self, employee_id: EmployeeId) -> Option<EmployeeId> {
        self.employee(employee_id)
            .and_then(|employee| employee.manager_id)
    }

    pub fn is_on_chart(&self, employee_id: EmployeeId) -> bool {
        self.employee(employee_id)
            .is_some_and(|employee| employee.on_chart)
    }

    pub fn len(&self) -> usize {
        self.employees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }

    pub fn edges(&self) -> Vec<ReportsToEdge> {
        edges_of(&self.employees)
    }

    pub fn edge_count(&self) -> usize {
        self.employees
            .iter()
            .filter(|employee| employee.manager_id.is_some())
            .count()
    }

    pub fn direct_reports(&self, manager_id: EmployeeId) -> Vec<&Employee> {
        self.employees
            .iter()
            .filter(|employee| employee.manager_id == Some(manager_id))
            .collect()
    }

    pub fn roots(&self) -> Vec<&Employee> {
        self.employees
            .iter()
            .filter(|employee| employee.manager_id.is_none())
            .collect()
    }

    /// Number of managers above the employee; roots are at depth 0.
    pub fn depth_of(&self, employee_id: EmployeeId) -> Option<usize> {
        self.employee(employee_id)?;
        Some(algorithms::ancestors(employee_id, |id| self.manager_of(id)).count())
    }

    pub fn unassigned(&self) -> UnassignedPool<'_> {
        UnassignedPool::new(self)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn check_invariants(&self) -> Vec<ForestViolation> {
        invariants::forest_violations(&self.employees)
    }

    fn replace(&mut self, employees: Vec<Employee>) {
        self.index = employees
            .iter()
            .enumerate()
            .map(|(position, employee)| (employee.id, position))
            .collect();
        self.employees = employees;
        self.revision += 1;
    }
}

impl ManagerLookup for OrgHierarchy {
    fn contains(&self, employee_id: EmployeeId) -> bool {
        OrgHierarchy::contains(self, employee_id)
    }

    fn manager_of(&self, employee_id: EmployeeId) -> Option<EmployeeId> {
        OrgHierarchy::manager_of(self, employee_id)
    }
}

fn edges_of(employees: &[Employee]) -> Vec<ReportsToEdge> {
    employees
        .iter()
        .filter_map(|employee| {
            employee.manager_id.map(|parent_id| ReportsToEdge {
                child_id: employee.id,
                parent_id,
            })
        })
        .collect()
}
