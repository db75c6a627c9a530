//! Top-to-bottom tiered placement for chart nodes, plus the drop hit test.
//!
//! Only employees flagged `on_chart` are drawn: everyone in a reporting line
//! plus roots placed on their own. Each tree is laid out after
//! the previous one, leaves take consecutive slots, and a manager is centred
//! over its first and last report.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::algorithms;
use crate::hierarchy::OrgHierarchy;
use crate::models::EmployeeId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    /// Vertical gap between tiers.
    pub rank_separation: f32,
    /// Horizontal gap between neighbouring nodes.
    pub node_separation: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 280.0,
            node_height: 140.0,
            rank_separation: 100.0,
            node_separation: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A placed chart node; `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeBox {
    pub employee_id: EmployeeId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub depth: usize,
}

impl NodeBox {
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartLayout {
    nodes: Vec<NodeBox>,
    #[serde(skip)]
    index: HashMap<EmployeeId, usize>,
}

impl ChartLayout {
    pub fn compute(hierarchy: &OrgHierarchy, config: &LayoutConfig) -> Self {
        let employees = hierarchy.employees();
        let reports = algorithms::reports_map(employees);

        let mut placer = Placer {
            config,
            reports: &reports,
            cursor: 0.0,
            visited: HashSet::new(),
            nodes: Vec::new(),
        };
        for root in hierarchy.roots() {
            if root.on_chart {
                placer.place(root.id, 0);
            }
        }

        let order: HashMap<EmployeeId, usize> = employees
            .iter()
            .enumerate()
            .map(|(position, employee)| (employee.id, position))
            .collect();
        let mut nodes = placer.nodes;
        nodes.sort_by_key(|node| order.get(&node.employee_id).copied().unwrap_or(usize::MAX));

        let index = nodes
            .iter()
            .enumerate()
            .map(|(position, node)| (node.employee_id, position))
            .collect();
        Self { nodes, index }
    }

    pub fn nodes(&self) -> &[NodeBox] {
        &self.nodes
    }

    pub fn node(&self, employee_id: EmployeeId) -> Option<&NodeBox> {
        self.index
            .get(&employee_id)
            .map(|&position| &self.nodes[position])
    }

    pub fn is_on_chart(&self, employee_id: EmployeeId) -> bool {
        self.index.contains_key(&employee_id)
    }

    /// The node under a canvas point, if any. `None` means empty canvas.
    pub fn node_at(&self, point: Point) -> Option<EmployeeId> {
        self.nodes
            .iter()
            .find(|node| node.contains(point))
            .map(|node| node.employee_id)
    }
}

struct Placer<'a> {
    config: &'a LayoutConfig,
    reports: &'a HashMap<EmployeeId, Vec<EmployeeId>>,
    cursor: f32,
    visited: HashSet<EmployeeId>,
    nodes: Vec<NodeBox>,
}

impl Placer<'_> {
    /// Places `employee_id` and its subtree; returns the node's centre x.
    fn place(&mut self, employee_id: EmployeeId, depth: usize) -> f32 {
        self.visited.insert(employee_id);
        let width = self.config.node_width;

        let children = self
            .reports
            .get(&employee_id)
            .map(|children| {
                children
                    .iter()
                    .copied()
                    .filter(|child| !self.visited.contains(child))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let mut child_centers = Vec::with_capacity(children.len());
        for child in children {
            child_centers.push(self.place(child, depth + 1));
        }

        let center = match (child_centers.first(), child_centers.last()) {
            (Some(first), Some(last)) => (first + last) / 2.0,
            _ => {
                let center = self.cursor + width / 2.0;
                self.cursor += width + self.config.node_separation;
                center
            }
        };

        self.nodes.push(NodeBox {
            employee_id,
            x: center - width / 2.0,
            y: depth as f32 * (self.config.node_height + self.config.rank_separation),
            width,
            height: self.config.node_height,
            depth,
        });
        center
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Employee;

    fn id(value: i64) -> EmployeeId {
        EmployeeId(value)
    }

    fn sample() -> OrgHierarchy {
        let (hierarchy, _) = OrgHierarchy::from_employees(vec![
            Employee::new(1, "Head", ""),
            Employee::new(2, "Left", "").with_manager(1),
            Employee::new(3, "Right", "").with_manager(1),
            Employee::new(4, "Loner", ""),
            Employee::new(5, "Other", ""),
            Employee::new(6, "Report", "").with_manager(5),
        ]);
        hierarchy
    }

    #[test]
    fn only_employees_with_reporting_lines_are_placed() {
        let layout = ChartLayout::compute(&sample(), &LayoutConfig::default());
        let placed: Vec<EmployeeId> = layout.nodes().iter().map(|n| n.employee_id).collect();
        assert_eq!(placed, vec![id(1), id(2), id(3), id(5), id(6)]);
        assert!(!layout.is_on_chart(id(4)));
    }

    #[test]
    fn managers_are_centred_over_reports() {
        let config = LayoutConfig::default();
        let layout = ChartLayout::compute(&sample(), &config);

        let left = layout.node(id(2)).expect("left placed");
        let right = layout.node(id(3)).expect("right placed");
        let head = layout.node(id(1)).expect("head placed");

        assert_eq!(left.x, 0.0);
        assert_eq!(right.x, 340.0);
        assert_eq!(head.x, 170.0);
        assert_eq!(head.y, 0.0);
        assert_eq!(left.y, 240.0);
        assert_eq!(left.depth, 1);

        let other = layout.node(id(5)).expect("second tree placed");
        assert_eq!(other.x, 680.0);
    }

    #[test]
    fn node_at_hits_rectangles_and_misses_gaps() {
        let layout = ChartLayout::compute(&sample(), &LayoutConfig::default());
        let head = *layout.node(id(1)).expect("head placed");

        assert_eq!(layout.node_at(head.center()), Some(id(1)));
        assert_eq!(layout.node_at(Point::new(head.x, head.y)), Some(id(1)));
        assert_eq!(layout.node_at(Point::new(300.0, 200.0)), None);
        assert_eq!(layout.node_at(Point::new(-10.0, -10.0)), None);
    }

    #[test]
    fn placed_standalone_root_takes_a_slot() {
        let mut hierarchy = sample();
        hierarchy
            .set_parent(id(4), None)
            .expect("make root should succeed");

        let layout = ChartLayout::compute(&hierarchy, &LayoutConfig::default());
        let loner = layout.node(id(4)).expect("standalone root placed");
        assert_eq!(loner.x, 680.0);
        assert_eq!(loner.depth, 0);
        assert_eq!(layout.node(id(5)).expect("second tree placed").x, 1020.0);
    }

    #[test]
    fn empty_hierarchy_has_empty_layout() {
        let layout = ChartLayout::compute(&OrgHierarchy::new(), &LayoutConfig::default());
        assert!(layout.nodes().is_empty());
        assert_eq!(layout.node_at(Point::new(0.0, 0.0)), None);
    }
}
