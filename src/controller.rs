//! Gesture handling with optimistic updates.
//!
//! A move is applied to the hierarchy before the back end confirms it, so the
//! chart reacts immediately. Each move then runs
//! `Idle -> Pending -> {Committed, RolledBack} -> Idle`:
//!
//! * only one move per employee may be pending; a second one is refused;
//! * moves for different employees run side by side;
//! * a failed or timed-out move restores the snapshot taken just before it,
//!   then re-applies the moves that were made after it and are still live;
//! * a confirmed move that can no longer be represented locally marks the
//!   chart as out of sync, and it is reloaded once no move is pending.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};

use crate::client::HierarchyBackend;
use crate::config::EditorConfig;
use crate::error::{LibError, Result};
use crate::gestures::Gesture;
use crate::hierarchy::{HierarchySnapshot, LoadReport, OrgHierarchy};
use crate::invariants;
use crate::layout::{ChartLayout, LayoutConfig};
use crate::models::{
    Employee, EmployeeId, Move, MoveEvent, MoveId, MoveKind, MoveOutcome, MoveState,
    ReportsToEdge,
};
use crate::session::SessionContext;

const EVENT_CAPACITY: usize = 256;

/// Everything the rendering shell needs to draw the chart and the sidebar.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub revision: u64,
    pub employees: Vec<Employee>,
    pub edges: Vec<ReportsToEdge>,
    pub unassigned: Vec<Employee>,
    pub layout: ChartLayout,
    pub pending: Vec<EmployeeId>,
    pub resync_required: bool,
}

#[derive(Debug)]
struct JournalEntry {
    move_id: MoveId,
    mv: Move,
    /// Hierarchy as it was just before this move was applied.
    pre_move: HierarchySnapshot,
    state: MoveState,
}

#[derive(Debug, Default)]
struct EditorState {
    hierarchy: OrgHierarchy,
    in_flight: HashMap<EmployeeId, MoveId>,
    /// Moves applied since the oldest move still pending.
    journal: Vec<JournalEntry>,
    resolutions: HashMap<EmployeeId, MoveState>,
    /// The back end holds a confirmed change the local hierarchy lost.
    resync_required: bool,
}

impl EditorState {
    fn ensure_idle(&self) -> Result<()> {
        if self.in_flight.is_empty() {
            return Ok(());
        }
        Err(LibError::invalid_move(
            "moves_pending",
            "Wait for pending changes to finish",
            anyhow!("{} move(s) still pending", self.in_flight.len()),
        ))
    }

    fn trim_journal(&mut self) {
        if self.in_flight.is_empty() {
            self.journal.clear();
        }
    }

    fn commit(&mut self, move_id: MoveId, mv: Move) {
        if let Some(entry) = self
            .journal
            .iter_mut()
            .find(|entry| entry.move_id == move_id)
        {
            entry.state = MoveState::Committed;
            return;
        }

        // Dropped while replaying after another move's rollback. The back end
        // has it now, so it goes back in, journaled like any other move.
        let pre_move = self.hierarchy.snapshot();
        match self.hierarchy.apply(mv) {
            Ok(_) => self.journal.push(JournalEntry {
                move_id,
                mv,
                pre_move,
                state: MoveState::Committed,
            }),
            Err(err) => {
                tracing::warn!(
                    %move_id,
                    employee_id = %mv.child,
                    code = err.code,
                    "confirmed move no longer fits the local hierarchy"
                );
                self.resync_required = true;
            }
        }
    }

    fn roll_back(&mut self, move_id: MoveId) {
        let Some(position) = self
            .journal
            .iter()
            .position(|entry| entry.move_id == move_id)
        else {
            return;
        };

        let later = self.journal.split_off(position + 1);
        if let Some(failed) = self.journal.pop() {
            self.hierarchy.restore(failed.pre_move);
        }

        for mut entry in later {
            let before = self.hierarchy.snapshot();
            match self.hierarchy.apply(entry.mv) {
                Ok(_) => {
                    entry.pre_move = before;
                    self.journal.push(entry);
                }
                Err(err) => {
                    tracing::warn!(
                        move_id = %entry.move_id,
                        employee_id = %entry.mv.child,
                        state = ?entry.state,
                        code = err.code,
                        "dropped move that no longer applies after rollback"
                    );
                    if entry.state == MoveState::Committed {
                        self.resync_required = true;
                    }
                }
            }
        }
    }
}

pub struct InteractionController<B: ?Sized> {
    state: Arc<Mutex<EditorState>>,
    backend: Arc<B>,
    session: SessionContext,
    events: broadcast::Sender<MoveEvent>,
    move_timeout: Duration,
    layout: LayoutConfig,
}

impl<B: ?Sized> Clone for InteractionController<B> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            backend: Arc::clone(&self.backend),
            session: self.session.clone(),
            events: self.events.clone(),
            move_timeout: self.move_timeout,
            layout: self.layout,
        }
    }
}

impl<B> InteractionController<B>
where
    B: HierarchyBackend + ?Sized,
{
    pub fn new(backend: Arc<B>, session: SessionContext, config: &EditorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(EditorState::default())),
            backend,
            session,
            events,
            move_timeout: config.move_timeout,
            layout: config.layout,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MoveEvent> {
        self.events.subscribe()
    }

    /// Fetches employees from the back end and rebuilds the hierarchy.
    pub async fn reload(&self) -> Result<LoadReport> {
        let records = self.backend.fetch_employees().await?;
        let mut state = self.state.lock().await;
        state.ensure_idle()?;
        let report = state.hierarchy.load_records(records);
        state.resync_required = false;
        tracing::info!(
            loaded = report.loaded,
            edges = report.edges,
            anomalies = report.anomalies.len(),
            "org chart reloaded"
        );
        Ok(report)
    }

    pub async fn load_employees(&self, employees: Vec<Employee>) -> Result<LoadReport> {
        let mut state = self.state.lock().await;
        state.ensure_idle()?;
        Ok(state.hierarchy.load_employees(employees))
    }

    pub async fn snapshot(&self) -> HierarchySnapshot {
        self.state.lock().await.hierarchy.snapshot()
    }

    /// Restores a snapshot handed back by the shell. Snapshots that are not
    /// a forest are refused.
    pub async fn restore(&self, snapshot: HierarchySnapshot) -> Result<()> {
        invariants::ensure_forest(snapshot.employees())?;
        let mut state = self.state.lock().await;
        state.ensure_idle()?;
        state.hierarchy.restore(snapshot);
        Ok(())
    }

    pub async fn unassigned(&self) -> Vec<Employee> {
        let state = self.state.lock().await;
        state
            .hierarchy
            .unassigned()
            .list()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn layout(&self) -> ChartLayout {
        let state = self.state.lock().await;
        ChartLayout::compute(&state.hierarchy, &self.layout)
    }

    pub async fn chart_view(&self) -> ChartView {
        let state = self.state.lock().await;
        let hierarchy = &state.hierarchy;
        let mut pending: Vec<EmployeeId> = state.in_flight.keys().copied().collect();
        pending.sort();
        ChartView {
            revision: hierarchy.revision(),
            employees: hierarchy.employees().to_vec(),
            edges: hierarchy.edges(),
            unassigned: hierarchy
                .unassigned()
                .list()
                .into_iter()
                .cloned()
                .collect(),
            layout: ChartLayout::compute(hierarchy, &self.layout),
            pending,
            resync_required: state.resync_required,
        }
    }

    /// `Pending` while a move for the employee is in flight, `Idle` otherwise.
    pub async fn move_state(&self, employee_id: EmployeeId) -> MoveState {
        let state = self.state.lock().await;
        if state.in_flight.contains_key(&employee_id) {
            MoveState::Pending
        } else {
            MoveState::Idle
        }
    }

    /// How the employee's most recent move ended, if it has ended.
    pub async fn last_resolution(&self, employee_id: EmployeeId) -> Option<MoveState> {
        self.state
            .lock()
            .await
            .resolutions
            .get(&employee_id)
            .copied()
    }

    /// `None` places the employee on the chart as a standalone root.
    pub async fn set_parent(
        &self,
        child: EmployeeId,
        parent: Option<EmployeeId>,
    ) -> Result<MoveOutcome> {
        self.submit(Move::set_parent(child, parent)).await
    }

    pub async fn remove_edge(&self, child: EmployeeId) -> Result<MoveOutcome> {
        self.submit(Move::detach(child)).await
    }

    pub async fn handle_gesture(&self, gesture: Gesture) -> Result<MoveOutcome> {
        let mv = {
            let state = self.state.lock().await;
            let layout = ChartLayout::compute(&state.hierarchy, &self.layout);
            gesture.resolve(&layout)
        };
        tracing::debug!(?gesture, ?mv, "resolved gesture");
        self.submit(mv).await
    }

    async fn submit(&self, mv: Move) -> Result<MoveOutcome> {
        self.session.require_org_chart_editor()?;

        let move_id = MoveId::new();
        {
            let mut state = self.state.lock().await;
            if let Some(pending) = state.in_flight.get(&mv.child) {
                return Err(LibError::invalid_move(
                    "move_in_flight",
                    "This employee is still being moved",
                    anyhow!("move {} for employee {} is pending", pending, mv.child),
                ));
            }

            let pre_move = state.hierarchy.snapshot();
            state.hierarchy.apply(mv)?;
            state.in_flight.insert(mv.child, move_id);
            state.journal.push(JournalEntry {
                move_id,
                mv,
                pre_move,
                state: MoveState::Pending,
            });
        }
        self.emit(move_id, mv, MoveState::Pending);

        let result = match tokio::time::timeout(self.move_timeout, self.persist(mv)).await {
            Ok(result) => result,
            Err(_) => Err(LibError::timeout(
                "Saving the change took too long and it was undone",
                anyhow!(
                    "move {} for employee {} exceeded {:?}",
                    move_id,
                    mv.child,
                    self.move_timeout
                ),
            )),
        };

        let (resolved, resync) = {
            let mut state = self.state.lock().await;
            state.in_flight.remove(&mv.child);
            let resolved = match &result {
                Ok(()) => {
                    state.commit(move_id, mv);
                    MoveState::Committed
                }
                Err(_) => {
                    state.roll_back(move_id);
                    MoveState::RolledBack
                }
            };
            state.resolutions.insert(mv.child, resolved);
            state.trim_journal();
            (resolved, state.resync_required && state.in_flight.is_empty())
        };

        match &result {
            Ok(()) => tracing::info!(
                %move_id,
                employee_id = %mv.child,
                manager_id = ?mv.parent,
                "reporting change saved"
            ),
            Err(err) => tracing::warn!(
                %move_id,
                employee_id = %mv.child,
                kind = ?err.kind,
                error = %err.source,
                "reporting change rolled back"
            ),
        }
        self.emit(move_id, mv, resolved);

        if resync {
            self.resync().await;
        }

        result.map(|()| MoveOutcome {
            move_id,
            mv,
            state: resolved,
        })
    }

    async fn resync(&self) {
        match self.reload().await {
            Ok(report) => tracing::info!(
                loaded = report.loaded,
                "reloaded org chart after losing a confirmed change"
            ),
            Err(err) => tracing::warn!(
                error = %err,
                "org chart is out of sync; retrying after the next move"
            ),
        }
    }

    async fn persist(&self, mv: Move) -> Result<()> {
        match mv.kind {
            MoveKind::RemoveEdge => self.backend.remove_manager(mv.child).await,
            MoveKind::Assign | MoveKind::MakeRoot => {
                self.backend.assign_manager(mv.child, mv.parent).await
            }
        }
    }

    fn emit(&self, move_id: MoveId, mv: Move, state: MoveState) {
        // No subscribers is fine; nobody is watching the chart.
        let _ = self.events.send(MoveEvent {
            move_id,
            child: mv.child,
            parent: mv.parent,
            state,
            at: Utc::now(),
        });
    }
}
