pub mod algorithms;
#[cfg(feature = "api")]
pub mod api;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod gestures;
pub mod hierarchy;
pub mod invariants;
pub mod layout;
pub mod models;
pub mod pool;
pub mod session;

pub mod prelude {
    pub use crate::algorithms::{ancestors, is_ancestor, reports_map, topological_order};
    #[cfg(feature = "api")]
    pub use crate::api::{AppError, HasEditor};
    pub use crate::client::{HierarchyBackend, RestBackend};
    pub use crate::config::EditorConfig;
    pub use crate::controller::{ChartView, InteractionController};
    pub use crate::error::{ErrorKind, LibError, Result};
    pub use crate::gestures::Gesture;
    pub use crate::hierarchy::{HierarchySnapshot, LoadReport, OrgHierarchy};
    pub use crate::invariants::{ForestViolation, MoveViolation};
    pub use crate::layout::{ChartLayout, LayoutConfig, NodeBox, Point};
    pub use crate::models::{
        Employee, EmployeeId, EmployeeRecord, LoadAnomaly, Move, MoveEvent, MoveId, MoveKind,
        MoveOutcome, MoveState, ReportsToEdge,
    };
    pub use crate::pool::UnassignedPool;
    pub use crate::session::{Role, SessionContext, SessionUser};
}
