use std::collections::{HashMap, HashSet};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::algorithms;
use crate::error::{LibError, Result};
use crate::models::{Employee, EmployeeId, Move};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForestViolation {
    DuplicateEmployee {
        employee_id: EmployeeId,
    },
    UnknownManagerReference {
        employee_id: EmployeeId,
        manager_id: EmployeeId,
    },
    SelfLoop {
        employee_id: EmployeeId,
    },
    CycleDetected {
        employee_ids: Vec<EmployeeId>,
    },
}

impl ForestViolation {
    pub const fn error_code(&self) -> &'static str {
        match self {
            ForestViolation::DuplicateEmployee { .. } => "forest_duplicate_employee",
            ForestViolation::UnknownManagerReference { .. } => "forest_unknown_manager",
            ForestViolation::SelfLoop { .. } => "forest_self_loop",
            ForestViolation::CycleDetected { .. } => "forest_cycle",
        }
    }

    pub const fn public_message(&self) -> &'static str {
        match self {
            ForestViolation::DuplicateEmployee { .. } => "Employee ids must be unique",
            ForestViolation::UnknownManagerReference { .. } => {
                "Reporting line references an employee that does not exist"
            }
            ForestViolation::SelfLoop { .. } => "An employee cannot report to themselves",
            ForestViolation::CycleDetected { .. } => "Reporting lines must not form a loop",
        }
    }
}

/// Why a single move was refused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MoveViolation {
    UnknownEmployee { employee_id: EmployeeId },
    SelfParent { employee_id: EmployeeId },
    Cycle {
        child_id: EmployeeId,
        parent_id: EmployeeId,
    },
}

impl MoveViolation {
    pub const fn error_code(&self) -> &'static str {
        match self {
            MoveViolation::UnknownEmployee { .. } => "unknown_employee",
            MoveViolation::SelfParent { .. } => "self_parent",
            MoveViolation::Cycle { .. } => "cycle",
        }
    }

    pub const fn public_message(&self) -> &'static str {
        match self {
            MoveViolation::UnknownEmployee { .. } => "That employee is not on this chart",
            MoveViolation::SelfParent { .. } => "An employee cannot report to themselves",
            MoveViolation::Cycle { .. } => {
                "An employee cannot report to someone in their own reporting line"
            }
        }
    }

    pub fn into_error(self) -> LibError {
        LibError::invalid_move(
            self.error_code(),
            self.public_message(),
            anyhow!("move rejected: {:?}", self),
        )
    }
}

/// Full validation of a set of employees and their manager links.
pub fn forest_violations(employees: &[Employee]) -> Vec<ForestViolation> {
    let mut violations = Vec::new();
    let mut known: HashSet<EmployeeId> = HashSet::with_capacity(employees.len());
    for employee in employees {
        if !known.insert(employee.id) {
            violations.push(ForestViolation::DuplicateEmployee {
                employee_id: employee.id,
            });
        }
    }

    for employee in employees {
        let Some(manager_id) = employee.manager_id else {
            continue;
        };
        if manager_id == employee.id {
            violations.push(ForestViolation::SelfLoop {
                employee_id: employee.id,
            });
        } else if !known.contains(&manager_id) {
            violations.push(ForestViolation::UnknownManagerReference {
                employee_id: employee.id,
                manager_id,
            });
        }
    }

    let ordered: HashSet<EmployeeId> = algorithms::topological_order(employees)
        .into_iter()
        .collect();
    if ordered.len() != known.len() {
        let mut stuck = known
            .iter()
            .filter(|employee_id| !ordered.contains(employee_id))
            .copied()
            .collect::<Vec<_>>();
        stuck.sort();
        violations.push(ForestViolation::CycleDetected {
            employee_ids: stuck,
        });
    }

    violations
}

pub fn ensure_forest(employees: &[Employee]) -> Result<()> {
    let violations = forest_violations(employees);
    if let Some(first) = violations.first() {
        return Err(LibError::malformed(
            first.error_code(),
            first.public_message(),
            anyhow!("forest validation failed: {:?}", violations),
        ));
    }

    Ok(())
}

/// Read access to manager links, enough to validate a move.
pub trait ManagerLookup {
    fn contains(&self, employee_id: EmployeeId) -> bool;
    fn manager_of(&self, employee_id: EmployeeId) -> Option<EmployeeId>;
}

impl ManagerLookup for HashMap<EmployeeId, Option<EmployeeId>> {
    fn contains(&self, employee_id: EmployeeId) -> bool {
        self.contains_key(&employee_id)
    }

    fn manager_of(&self, employee_id: EmployeeId) -> Option<EmployeeId> {
        self.get(&employee_id).copied().flatten()
    }
}

/// Checks a move against the current manager links without applying it.
/// The cycle check walks up from the new parent; finding the child there
/// means the parent is one of the child's reports.
pub fn move_violation<L>(mv: Move, lookup: &L) -> Option<MoveViolation>
where
    L: ManagerLookup + ?Sized,
{
    if !lookup.contains(mv.child) {
        return Some(MoveViolation::UnknownEmployee {
            employee_id: mv.child,
        });
    }
    let parent_id = mv.parent?;
    if parent_id == mv.child {
        return Some(MoveViolation::SelfParent {
            employee_id: mv.child,
        });
    }
    if !lookup.contains(parent_id) {
        return Some(MoveViolation::UnknownEmployee {
            employee_id: parent_id,
        });
    }

    if algorithms::is_ancestor(mv.child, parent_id, |id| lookup.manager_of(id)) {
        return Some(MoveViolation::Cycle {
            child_id: mv.child,
            parent_id,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn managers(employees: &[Employee]) -> HashMap<EmployeeId, Option<EmployeeId>> {
        employees
            .iter()
            .map(|employee| (employee.id, employee.manager_id))
            .collect()
    }

    fn chain() -> Vec<Employee> {
        vec![
            Employee::new(1, "A", ""),
            Employee::new(2, "B", "").with_manager(1),
            Employee::new(3, "C", "").with_manager(2),
        ]
    }

    #[test]
    fn forest_with_many_roots_is_valid() {
        let mut employees = chain();
        employees.push(Employee::new(4, "D", ""));
        employees.push(Employee::new(5, "E", "").with_manager(4));
        assert!(forest_violations(&employees).is_empty());
        assert!(ensure_forest(&employees).is_ok());
    }

    #[test]
    fn forest_reports_self_loops_and_unknown_managers() {
        let employees = vec![
            Employee::new(1, "A", "").with_manager(1),
            Employee::new(2, "B", "").with_manager(42),
        ];
        let violations = forest_violations(&employees);
        assert!(
            violations
                .iter()
                .any(|v| matches!(v, ForestViolation::SelfLoop { employee_id } if *employee_id == EmployeeId(1)))
        );
        assert!(violations.iter().any(|v| matches!(
            v,
            ForestViolation::UnknownManagerReference { manager_id, .. } if *manager_id == EmployeeId(42)
        )));
    }

    #[test]
    fn forest_reports_cycle_members() {
        let mut employees = chain();
        employees[0].manager_id = Some(EmployeeId(3));
        let err = ensure_forest(&employees).expect_err("cycle should fail");
        assert_eq!(err.code, "forest_cycle");
        assert!(forest_violations(&employees).iter().any(|v| matches!(
            v,
            ForestViolation::CycleDetected { employee_ids }
                if employee_ids == &vec![EmployeeId(1), EmployeeId(2), EmployeeId(3)]
        )));
    }

    #[test]
    fn forest_reports_duplicates() {
        let employees = vec![Employee::new(1, "A", ""), Employee::new(1, "A", "")];
        assert!(matches!(
            forest_violations(&employees)[0],
            ForestViolation::DuplicateEmployee { .. }
        ));
    }

    #[test]
    fn move_onto_own_report_is_a_cycle() {
        let employees = chain();
        let violation = move_violation(Move::assign(EmployeeId(1), EmployeeId(3)), &managers(&employees));
        assert_eq!(
            violation,
            Some(MoveViolation::Cycle {
                child_id: EmployeeId(1),
                parent_id: EmployeeId(3)
            })
        );
    }

    #[test]
    fn move_onto_self_is_rejected() {
        let employees = chain();
        let violation = move_violation(Move::assign(EmployeeId(2), EmployeeId(2)), &managers(&employees));
        assert_eq!(violation.map(|v| v.error_code()), Some("self_parent"));
    }

    #[test]
    fn move_with_unknown_ids_is_rejected() {
        let employees = chain();
        let managers = managers(&employees);
        assert_eq!(
            move_violation(Move::detach(EmployeeId(9)), &managers),
            Some(MoveViolation::UnknownEmployee {
                employee_id: EmployeeId(9)
            })
        );
        assert_eq!(
            move_violation(Move::assign(EmployeeId(1), EmployeeId(9)), &managers),
            Some(MoveViolation::UnknownEmployee {
                employee_id: EmployeeId(9)
            })
        );
    }

    #[test]
    fn sideways_and_detach_moves_are_allowed() {
        let employees = chain();
        let managers = managers(&employees);
        assert_eq!(
            move_violation(Move::assign(EmployeeId(3), EmployeeId(1)), &managers),
            None
        );
        assert_eq!(move_violation(Move::detach(EmployeeId(2)), &managers), None);
    }
}
