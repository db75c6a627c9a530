use serde::{Deserialize, Serialize};

use crate::layout::{ChartLayout, Point};
use crate::models::{EmployeeId, Move};

/// Chart interactions as the rendering shell reports them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Gesture {
    /// A node or sidebar card dropped onto a chart node.
    #[serde(rename_all = "camelCase")]
    DropOnNode {
        employee_id: EmployeeId,
        target_id: EmployeeId,
    },
    /// A drop at a canvas point; hit-tested against the current layout.
    #[serde(rename_all = "camelCase")]
    DropOnCanvas { employee_id: EmployeeId, x: f32, y: f32 },
    /// A line drawn from a manager's handle to a report's handle.
    #[serde(rename_all = "camelCase")]
    Connect {
        source_id: EmployeeId,
        target_id: EmployeeId,
    },
    /// The remove control on a drawn reporting line.
    #[serde(rename_all = "camelCase")]
    DeleteEdge { employee_id: EmployeeId },
}

impl Gesture {
    pub const fn employee_id(&self) -> EmployeeId {
        match self {
            Gesture::DropOnNode { employee_id, .. }
            | Gesture::DropOnCanvas { employee_id, .. }
            | Gesture::DeleteEdge { employee_id } => *employee_id,
            Gesture::Connect { target_id, .. } => *target_id,
        }
    }

    /// Turns the gesture into a move. Drops on empty canvas place the
    /// employee as a standalone root; a drop landing on the dragged node
    /// itself is kept as a self-parent request so validation can reject it.
    pub fn resolve(&self, layout: &ChartLayout) -> Move {
        match *self {
            Gesture::DropOnNode {
                employee_id,
                target_id,
            } => Move::assign(employee_id, target_id),
            Gesture::DropOnCanvas { employee_id, x, y } => {
                match layout.node_at(Point::new(x, y)) {
                    Some(target_id) => Move::assign(employee_id, target_id),
                    None => Move::make_root(employee_id),
                }
            }
            Gesture::Connect {
                source_id,
                target_id,
            } => Move::assign(target_id, source_id),
            Gesture::DeleteEdge { employee_id } => Move::detach(employee_id),
        }
    }
}
