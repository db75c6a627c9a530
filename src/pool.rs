use crate::hierarchy::OrgHierarchy;
use crate::models::{Employee, EmployeeId};

/// Employees without a manager, derived on every query from the hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct UnassignedPool<'a> {
    hierarchy: &'a OrgHierarchy,
}

impl<'a> UnassignedPool<'a> {
    pub fn new(hierarchy: &'a OrgHierarchy) -> Self {
        Self { hierarchy }
    }

    /// In the order of the last load, so the sidebar does not reshuffle.
    pub fn list(&self) -> Vec<&'a Employee> {
        self.hierarchy
            .employees()
            .iter()
            .filter(|employee| employee.manager_id.is_none())
            .collect()
    }

    pub fn ids(&self) -> Vec<EmployeeId> {
        self.list().into_iter().map(|employee| employee.id).collect()
    }

    pub fn len(&self) -> usize {
        self.hierarchy
            .employees()
            .iter()
            .filter(|employee| employee.manager_id.is_none())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, employee_id: EmployeeId) -> bool {
        self.hierarchy
            .employee(employee_id)
            .is_some_and(|employee| employee.manager_id.is_none())
    }
}
