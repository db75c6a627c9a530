use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::{Employee, EmployeeId};

/// Walks manager links upward from `start` (exclusive). Stops at a root, at an
/// unknown manager, or if a manager repeats.
pub struct Ancestors<F> {
    next: Option<EmployeeId>,
    seen: HashSet<EmployeeId>,
    manager_of: F,
}

impl<F> Iterator for Ancestors<F>
where
    F: Fn(EmployeeId) -> Option<EmployeeId>,
{
    type Item = EmployeeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        if !self.seen.insert(current) {
            return None;
        }
        self.next = (self.manager_of)(current);
        Some(current)
    }
}

pub fn ancestors<F>(start: EmployeeId, manager_of: F) -> Ancestors<F>
where
    F: Fn(EmployeeId) -> Option<EmployeeId>,
{
    let mut seen = HashSet::new();
    seen.insert(start);
    Ancestors {
        next: manager_of(start),
        seen,
        manager_of,
    }
}

/// True when `candidate` sits somewhere above `node` in the reporting chain.
pub fn is_ancestor<F>(candidate: EmployeeId, node: EmployeeId, manager_of: F) -> bool
where
    F: Fn(EmployeeId) -> Option<EmployeeId>,
{
    ancestors(node, manager_of).any(|ancestor| ancestor == candidate)
}

/// Direct reports per manager, in employee order. Links to unknown managers
/// are skipped.
pub fn reports_map(employees: &[Employee]) -> HashMap<EmployeeId, Vec<EmployeeId>> {
    let known: HashSet<EmployeeId> = employees.iter().map(|employee| employee.id).collect();
    let mut reports: HashMap<EmployeeId, Vec<EmployeeId>> = HashMap::with_capacity(employees.len());
    for employee in employees {
        reports.entry(employee.id).or_default();
    }
    for employee in employees {
        let Some(manager_id) = employee.manager_id else {
            continue;
        };
        if !known.contains(&manager_id) {
            continue;
        }
        reports.entry(manager_id).or_default().push(employee.id);
    }
    reports
}

/// Managers before their reports; roots keep employee order. Employees caught
/// in a cycle are left out, so a short result means the links are not a forest.
pub fn topological_order(employees: &[Employee]) -> Vec<EmployeeId> {
    let known: HashSet<EmployeeId> = employees.iter().map(|employee| employee.id).collect();
    let reports = reports_map(employees);

    let mut queue: VecDeque<EmployeeId> = employees
        .iter()
        .filter(|employee| {
            employee
                .manager_id
                .is_none_or(|manager_id| !known.contains(&manager_id))
        })
        .map(|employee| employee.id)
        .collect();

    let mut ordered = Vec::with_capacity(employees.len());
    let mut visited = HashSet::with_capacity(employees.len());
    while let Some(employee_id) = queue.pop_front() {
        if !visited.insert(employee_id) {
            continue;
        }
        ordered.push(employee_id);
        if let Some(children) = reports.get(&employee_id) {
            queue.extend(children.iter().copied());
        }
    }

    ordered
}
