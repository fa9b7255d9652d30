//! Propagation planner: scope and selection to one store request.
//!
//! # Responsibility
//! - Drive the request state machine
//!   `Idle -> ScopeChosen -> SelectionChosen -> ConfirmPending -> Applying`
//!   ending in `Applied`, or back in `ConfirmPending` on failure.
//! - Build the confirmation payload shown before a propagation runs.
//!
//! # Invariants
//! - Subtree selection under vessel scope is rejected before any store call.
//! - Prior in-memory state is kept until the store confirms a mutation.
//! - Store rejections are surfaced with their literal message and never
//!   retried.
//! - Once the store confirms a propagation the apply succeeds; a failed
//!   reload afterwards is reported through `reload_error`, not as a failure.

use crate::model::assignment::{AssignmentScope, ScopeKind, TaskAssignment};
use crate::model::blueprint::{CategoryId, TemplateId};
use crate::repo::assignment_repo::{AssignmentListQuery, AssignmentRepository, PropagationSummary};
use crate::repo::RepoError;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Planner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerPhase {
    Idle,
    ScopeChosen,
    SelectionChosen,
    ConfirmPending,
    Applying,
    Applied,
}

impl PlannerPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ScopeChosen => "scope_chosen",
            Self::SelectionChosen => "selection_chosen",
            Self::ConfirmPending => "confirm_pending",
            Self::Applying => "applying",
            Self::Applied => "applied",
        }
    }

    fn has_scope(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Concrete scope plus the label shown in the confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTarget {
    pub scope: AssignmentScope,
    pub label: String,
}

/// What to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationSelection {
    Template(TemplateId),
    /// Every active template under a category. Group scope only.
    Subtree(CategoryId),
}

/// Data presented before the user confirms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub scope_label: String,
    /// `Some(1)` for one template; `None` for a subtree (not counted here).
    pub template_count: Option<u32>,
    /// `Some(1)` for a vessel; `None` for a group (fan-out is the store's).
    pub affected_vessels: Option<u32>,
    /// Rows already attached to the scope for the selected template.
    /// `None` for a subtree.
    pub existing_matches: Option<u32>,
}

impl Confirmation {
    /// Whether `override_existing` would replace rows visible to this scope.
    pub fn has_override_conflict(&self) -> bool {
        self.existing_matches.is_some_and(|count| count > 0)
    }
}

/// One store request ready to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyRequest {
    pub scope: AssignmentScope,
    pub selection: PropagationSelection,
    pub override_existing: bool,
}

/// Planner failures.
#[derive(Debug)]
pub enum PlannerError {
    /// Scope/selection combination is invalid. Nothing was sent.
    Validation(String),
    /// Action not allowed in the current phase.
    InvalidTransition {
        phase: PlannerPhase,
        action: &'static str,
    },
    /// Store failure or refusal; displayed verbatim.
    Store(RepoError),
}

impl PlannerError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl Display for PlannerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => f.write_str(message),
            Self::InvalidTransition { phase, action } => {
                write!(f, "cannot {action} while {}", phase.as_str())
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PlannerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PlannerError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Propagation planner over one assignment store.
pub struct PropagationService<R: AssignmentRepository> {
    repo: R,
    phase: PlannerPhase,
    target: Option<ScopeTarget>,
    selection: Option<PropagationSelection>,
    assignments: Vec<TaskAssignment>,
    confirmation: Option<Confirmation>,
    pending: Option<ApplyRequest>,
    last_error: Option<String>,
    reload_error: Option<String>,
    last_summary: Option<PropagationSummary>,
}

impl<R: AssignmentRepository> PropagationService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            phase: PlannerPhase::Idle,
            target: None,
            selection: None,
            assignments: Vec::new(),
            confirmation: None,
            pending: None,
            last_error: None,
            reload_error: None,
            last_summary: None,
        }
    }

    pub fn phase(&self) -> PlannerPhase {
        self.phase
    }

    pub fn target(&self) -> Option<&ScopeTarget> {
        self.target.as_ref()
    }

    pub fn selection(&self) -> Option<PropagationSelection> {
        self.selection
    }

    /// Assignments attached to the chosen scope, as last loaded.
    pub fn assignments(&self) -> &[TaskAssignment] {
        &self.assignments
    }

    pub fn confirmation(&self) -> Option<&Confirmation> {
        self.confirmation.as_ref()
    }

    /// Message of the last failed apply, kept while `ConfirmPending`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Message of the last failed assignment reload. While set,
    /// [`Self::assignments`] may predate the last applied propagation.
    pub fn reload_error(&self) -> Option<&str> {
        self.reload_error.as_deref()
    }

    pub fn last_summary(&self) -> Option<PropagationSummary> {
        self.last_summary
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Picks the scope and loads its assignments.
    ///
    /// On load failure the previous state is kept.
    pub fn choose_scope(&mut self, target: ScopeTarget) -> Result<(), PlannerError> {
        self.ensure_not_applying("choose a scope")?;
        let assignments = self
            .repo
            .list_assignments(&AssignmentListQuery::for_scope(target.scope))?;

        self.target = Some(target);
        self.assignments = assignments;
        self.reload_error = None;
        self.clear_request();
        self.last_summary = None;
        self.phase = PlannerPhase::ScopeChosen;
        Ok(())
    }

    /// Picks what to propagate into the chosen scope.
    pub fn choose_selection(&mut self, selection: PropagationSelection) -> Result<(), PlannerError> {
        self.ensure_not_applying("choose a selection")?;
        let Some(target) = self.target.as_ref().filter(|_| self.phase.has_scope()) else {
            return Err(PlannerError::InvalidTransition {
                phase: self.phase,
                action: "choose a selection",
            });
        };
        if matches!(selection, PropagationSelection::Subtree(_))
            && target.scope.kind() == ScopeKind::Yacht
        {
            return Err(PlannerError::Validation(
                "category subtree assignment requires a group scope; pick a single template for a yacht"
                    .to_string(),
            ));
        }

        self.clear_request();
        self.selection = Some(selection);
        self.phase = PlannerPhase::SelectionChosen;
        Ok(())
    }

    /// Computes the confirmation payload.
    pub fn start(&mut self) -> Result<&Confirmation, PlannerError> {
        let (Some(target), Some(selection)) = (self.target.as_ref(), self.selection) else {
            return Err(PlannerError::InvalidTransition {
                phase: self.phase,
                action: "start",
            });
        };
        if !matches!(
            self.phase,
            PlannerPhase::SelectionChosen | PlannerPhase::ConfirmPending
        ) {
            return Err(PlannerError::InvalidTransition {
                phase: self.phase,
                action: "start",
            });
        }

        let (template_count, existing_matches) = match selection {
            PropagationSelection::Template(template_id) => {
                let matches = self
                    .assignments
                    .iter()
                    .filter(|row| row.template_id == Some(template_id))
                    .count();
                (Some(1), Some(u32::try_from(matches).unwrap_or(u32::MAX)))
            }
            PropagationSelection::Subtree(_) => (None, None),
        };
        let affected_vessels = match target.scope.kind() {
            ScopeKind::Yacht => Some(1),
            ScopeKind::Group => None,
        };

        self.last_error = None;
        self.phase = PlannerPhase::ConfirmPending;
        Ok(&*self.confirmation.insert(Confirmation {
            scope_label: target.label.clone(),
            template_count,
            affected_vessels,
            existing_matches,
        }))
    }

    /// Leaves the confirmation without applying.
    pub fn cancel_confirmation(&mut self) -> Result<(), PlannerError> {
        if self.phase != PlannerPhase::ConfirmPending {
            return Err(PlannerError::InvalidTransition {
                phase: self.phase,
                action: "cancel the confirmation",
            });
        }
        self.confirmation = None;
        self.last_error = None;
        self.phase = PlannerPhase::SelectionChosen;
        Ok(())
    }

    /// Moves to `Applying` and returns the request to send.
    pub fn begin_apply(&mut self, override_existing: bool) -> Result<ApplyRequest, PlannerError> {
        let (Some(target), Some(selection)) = (self.target.as_ref(), self.selection) else {
            return Err(PlannerError::InvalidTransition {
                phase: self.phase,
                action: "confirm",
            });
        };
        if self.phase != PlannerPhase::ConfirmPending {
            return Err(PlannerError::InvalidTransition {
                phase: self.phase,
                action: "confirm",
            });
        }

        let request = ApplyRequest {
            scope: target.scope,
            selection,
            override_existing,
        };
        self.pending = Some(request);
        self.phase = PlannerPhase::Applying;
        Ok(request)
    }

    /// Feeds the store's answer for the request from [`Self::begin_apply`].
    ///
    /// Success reloads the scope's assignments and clears the selection;
    /// failure returns to `ConfirmPending` with the message kept. A reload
    /// failure after a confirmed write still returns the summary.
    pub fn finish_apply(
        &mut self,
        outcome: Result<PropagationSummary, RepoError>,
    ) -> Result<PropagationSummary, PlannerError> {
        if self.phase != PlannerPhase::Applying {
            return Err(PlannerError::InvalidTransition {
                phase: self.phase,
                action: "finish applying",
            });
        }
        let request = self.pending.take();

        let summary = match outcome {
            Ok(summary) => summary,
            Err(err) => {
                warn!(
                    "event=propagation_apply module=service status=error rejected={}",
                    err.is_rejection()
                );
                self.last_error = Some(err.to_string());
                self.phase = PlannerPhase::ConfirmPending;
                return Err(PlannerError::Store(err));
            }
        };

        if let Some(request) = request {
            info!(
                "event=propagation_apply module=service status=ok scope_kind={} override_existing={} templates={} rows_written={}",
                request.scope.kind().as_str(),
                request.override_existing,
                summary.templates,
                summary.rows_written()
            );
        }
        self.selection = None;
        self.confirmation = None;
        self.last_error = None;
        self.last_summary = Some(summary);
        self.phase = PlannerPhase::Applied;
        if let Err(err) = self.reload_assignments() {
            warn!("event=propagation_reload module=service status=error phase=applied");
            self.reload_error = Some(err.to_string());
        }
        Ok(summary)
    }

    /// Confirms and runs the propagation against the store.
    pub fn confirm(&mut self, override_existing: bool) -> Result<PropagationSummary, PlannerError> {
        let request = self.begin_apply(override_existing)?;
        let outcome = self.execute(request);
        self.finish_apply(outcome)
    }

    /// Reloads the chosen scope's assignments.
    pub fn reload_assignments(&mut self) -> Result<(), PlannerError> {
        let Some(target) = self.target.as_ref() else {
            return Ok(());
        };
        self.assignments = self
            .repo
            .list_assignments(&AssignmentListQuery::for_scope(target.scope))?;
        self.reload_error = None;
        Ok(())
    }

    /// Drops scope, selection and loaded rows.
    pub fn reset(&mut self) {
        self.target = None;
        self.assignments.clear();
        self.reload_error = None;
        self.clear_request();
        self.last_summary = None;
        self.phase = PlannerPhase::Idle;
    }

    fn execute(&self, request: ApplyRequest) -> Result<PropagationSummary, RepoError> {
        match (request.scope, request.selection) {
            (AssignmentScope::Group(group_id), PropagationSelection::Template(template_id)) => self
                .repo
                .assign_template_to_group(template_id, group_id, request.override_existing),
            (AssignmentScope::Group(group_id), PropagationSelection::Subtree(category_id)) => self
                .repo
                .assign_category_subtree_to_group(
                    category_id,
                    group_id,
                    request.override_existing,
                ),
            (AssignmentScope::Yacht(yacht_id), PropagationSelection::Template(template_id)) => self
                .repo
                .assign_template_to_yacht(template_id, yacht_id, request.override_existing),
            (AssignmentScope::Yacht(_), PropagationSelection::Subtree(_)) => Err(
                RepoError::Rejected("category subtree assignment requires a group scope".to_string()),
            ),
        }
    }

    fn clear_request(&mut self) {
        self.selection = None;
        self.confirmation = None;
        self.pending = None;
        self.last_error = None;
    }

    fn ensure_not_applying(&self, action: &'static str) -> Result<(), PlannerError> {
        if self.phase == PlannerPhase::Applying {
            return Err(PlannerError::InvalidTransition {
                phase: self.phase,
                action,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{PlannerError, PlannerPhase, PropagationSelection, PropagationService, ScopeTarget};
    use crate::model::assignment::{AssignmentId, AssignmentScope, TaskAssignment};
    use crate::model::blueprint::{CategoryId, TemplateId};
    use crate::model::directory::{GroupId, YachtId};
    use crate::repo::assignment_repo::{
        AssignmentListQuery, AssignmentRepository, PropagationSummary,
    };
    use crate::repo::{RepoError, RepoResult};
    use std::cell::{Cell, RefCell};
    use uuid::Uuid;

    #[derive(Default)]
    struct ScriptedRepo {
        list_calls: Cell<u32>,
        mutation_calls: Cell<u32>,
        reject_with: RefCell<Option<String>>,
        list_failure: RefCell<Option<String>>,
    }

    impl ScriptedRepo {
        fn mutate(&self) -> RepoResult<PropagationSummary> {
            self.mutation_calls.set(self.mutation_calls.get() + 1);
            match self.reject_with.borrow().clone() {
                Some(message) => Err(RepoError::Rejected(message)),
                None => Ok(PropagationSummary {
                    templates: 1,
                    ..PropagationSummary::default()
                }),
            }
        }
    }

    impl AssignmentRepository for ScriptedRepo {
        fn list_assignments(&self, _: &AssignmentListQuery) -> RepoResult<Vec<TaskAssignment>> {
            self.list_calls.set(self.list_calls.get() + 1);
            match self.list_failure.borrow().clone() {
                Some(message) => Err(RepoError::InvalidData(message)),
                None => Ok(Vec::new()),
            }
        }

        fn get_assignment(&self, _: AssignmentId) -> RepoResult<Option<TaskAssignment>> {
            Ok(None)
        }

        fn assign_template_to_group(
            &self,
            _: TemplateId,
            _: GroupId,
            _: bool,
        ) -> RepoResult<PropagationSummary> {
            self.mutate()
        }

        fn assign_category_subtree_to_group(
            &self,
            _: CategoryId,
            _: GroupId,
            _: bool,
        ) -> RepoResult<PropagationSummary> {
            self.mutate()
        }

        fn assign_template_to_yacht(
            &self,
            _: TemplateId,
            _: YachtId,
            _: bool,
        ) -> RepoResult<PropagationSummary> {
            self.mutate()
        }

        fn create_override_fork(&self, _: AssignmentId, _: YachtId) -> RepoResult<AssignmentId> {
            self.mutation_calls.set(self.mutation_calls.get() + 1);
            Ok(Uuid::new_v4())
        }
    }

    fn group_target() -> ScopeTarget {
        ScopeTarget {
            scope: AssignmentScope::Group(Uuid::new_v4()),
            label: "Atlantic fleet".to_string(),
        }
    }

    #[test]
    fn selection_before_scope_is_an_invalid_transition() {
        let mut planner = PropagationService::new(ScriptedRepo::default());
        let err = planner
            .choose_selection(PropagationSelection::Template(Uuid::new_v4()))
            .expect_err("no scope yet");
        assert!(matches!(
            err,
            PlannerError::InvalidTransition {
                phase: PlannerPhase::Idle,
                ..
            }
        ));
    }

    #[test]
    fn failed_apply_returns_to_confirm_pending_with_message() {
        let repo = ScriptedRepo::default();
        *repo.reject_with.borrow_mut() = Some("new row violates row-level security".to_string());
        let mut planner = PropagationService::new(repo);
        planner.choose_scope(group_target()).expect("scope");
        planner
            .choose_selection(PropagationSelection::Template(Uuid::new_v4()))
            .expect("selection");
        planner.start().expect("start");

        let err = planner.confirm(false).expect_err("store refuses");
        assert_eq!(err.to_string(), "new row violates row-level security");
        assert_eq!(planner.phase(), PlannerPhase::ConfirmPending);
        assert_eq!(
            planner.last_error(),
            Some("new row violates row-level security")
        );
        assert!(planner.selection().is_some());
        assert_eq!(planner.repo().mutation_calls.get(), 1);
    }

    #[test]
    fn applying_blocks_scope_changes_until_finished() {
        let mut planner = PropagationService::new(ScriptedRepo::default());
        planner.choose_scope(group_target()).expect("scope");
        planner
            .choose_selection(PropagationSelection::Subtree(Uuid::new_v4()))
            .expect("selection");
        planner.start().expect("start");
        let request = planner.begin_apply(true).expect("begin");
        assert!(request.override_existing);
        assert_eq!(planner.phase(), PlannerPhase::Applying);

        assert!(planner.choose_scope(group_target()).is_err());

        planner
            .finish_apply(Ok(PropagationSummary::default()))
            .expect("finish");
        assert_eq!(planner.phase(), PlannerPhase::Applied);
        assert!(planner.selection().is_none());
        assert_eq!(planner.repo().list_calls.get(), 2);
    }

    #[test]
    fn reload_failure_after_confirmed_write_still_reports_success() {
        let mut planner = PropagationService::new(ScriptedRepo::default());
        planner.choose_scope(group_target()).expect("scope");
        planner
            .choose_selection(PropagationSelection::Template(Uuid::new_v4()))
            .expect("selection");
        planner.start().expect("start");
        *planner.repo().list_failure.borrow_mut() = Some("network timeout".to_string());

        let summary = planner.confirm(false).expect("write was confirmed");
        assert_eq!(summary.templates, 1);
        assert_eq!(planner.phase(), PlannerPhase::Applied);
        assert_eq!(planner.last_error(), None);
        assert!(planner
            .reload_error()
            .is_some_and(|message| message.contains("network timeout")));
        assert_eq!(planner.repo().mutation_calls.get(), 1);
        assert!(planner.begin_apply(false).is_err());

        *planner.repo().list_failure.borrow_mut() = None;
        planner.reload_assignments().expect("reload");
        assert_eq!(planner.reload_error(), None);
    }

    #[test]
    fn cancel_confirmation_keeps_selection() {
        let mut planner = PropagationService::new(ScriptedRepo::default());
        planner.choose_scope(group_target()).expect("scope");
        planner
            .choose_selection(PropagationSelection::Template(Uuid::new_v4()))
            .expect("selection");
        planner.start().expect("start");
        planner.cancel_confirmation().expect("cancel");
        assert_eq!(planner.phase(), PlannerPhase::SelectionChosen);
        assert!(planner.confirmation().is_none());
        assert!(planner.begin_apply(false).is_err());
    }
}
