use chrono::{NaiveDate, Utc};
use fleetdeck_core::db::open_db_in_memory;
use fleetdeck_core::model::directory::{UserRole, YachtId};
use fleetdeck_core::repo::blueprint_repo::{NewTemplate, SqliteBlueprintRepository};
use fleetdeck_core::repo::directory_repo::SqliteDirectoryRepository;
use fleetdeck_core::repo::incident_repo::{IncidentListQuery, SqliteIncidentRepository};
use fleetdeck_core::service::incident_service::{
    AdminIncidentEdit, IncidentService, IncidentServiceError,
};
use fleetdeck_core::{
    Actor, AssignmentId, AssignmentListQuery, AssignmentRepository, AssignmentScope,
    IncidentStatus, RepoError, SessionContext, SqliteAssignmentRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

struct Harbor {
    conn: Connection,
    yacht_id: YachtId,
    assignment_id: AssignmentId,
    skipper: Actor,
    admin: Actor,
}

fn harbor() -> Harbor {
    let conn = open_db_in_memory().unwrap();
    let (yacht_id, assignment_id, skipper, admin) = {
        let directory = SqliteDirectoryRepository::try_new(&conn).unwrap();
        let group = directory.insert_group(None, "Riviera").unwrap();
        let yacht = directory.insert_yacht(group.id, "Aurora").unwrap();
        let skipper = directory
            .insert_user("skipper@fleet.test", "Skipper", UserRole::Crew)
            .unwrap();
        let admin = directory
            .insert_user("admin@fleet.test", "Admin", UserRole::Admin)
            .unwrap();

        let blueprints = SqliteBlueprintRepository::try_new(&conn).unwrap();
        let category = blueprints.insert_category(None, "Engine").unwrap();
        let template = blueprints
            .insert_template(
                category.id,
                &NewTemplate {
                    name: "Impeller swap".to_string(),
                    ..NewTemplate::default()
                },
            )
            .unwrap();

        let assignments = SqliteAssignmentRepository::try_new(&conn).unwrap();
        assignments
            .assign_template_to_yacht(template.id, yacht.id, false)
            .unwrap();
        let assignment = assignments
            .list_assignments(&AssignmentListQuery::for_scope(AssignmentScope::Yacht(
                yacht.id,
            )))
            .unwrap()
            .remove(0);

        (
            yacht.id,
            assignment.id,
            Actor {
                user_id: skipper.id,
                role: skipper.role,
            },
            Actor {
                user_id: admin.id,
                role: admin.role,
            },
        )
    };
    Harbor {
        conn,
        yacht_id,
        assignment_id,
        skipper,
        admin,
    }
}

impl Harbor {
    fn service(&self) -> IncidentService<SqliteIncidentRepository<'_>> {
        IncidentService::new(SqliteIncidentRepository::try_new(&self.conn).unwrap())
    }
}

fn due(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, day).unwrap()
}

#[test]
fn complete_stamps_actor_and_request_time() {
    let harbor = harbor();
    let service = harbor.service();
    let incident = service
        .create_incident(harbor.assignment_id, harbor.yacht_id, due(1))
        .unwrap();
    assert_eq!(incident.status, IncidentStatus::Pending);
    assert_eq!(incident.completed_by, None);

    let session = SessionContext::with_actor(harbor.skipper);
    let before = Utc::now().timestamp_millis();
    let completed = service.complete(&session, incident.id).unwrap();
    let after = Utc::now().timestamp_millis();

    assert_eq!(completed.status, IncidentStatus::Completed);
    assert_eq!(completed.completed_by, Some(harbor.skipper.user_id));
    let stamp = completed.completed_at.unwrap();
    assert!(before <= stamp && stamp <= after);
    assert_eq!(service.get(incident.id).unwrap(), completed);
}

#[test]
fn complete_requires_signed_in_actor() {
    let harbor = harbor();
    let service = harbor.service();
    let incident = service
        .create_incident(harbor.assignment_id, harbor.yacht_id, due(1))
        .unwrap();

    let err = service
        .complete(&SessionContext::new(None), incident.id)
        .unwrap_err();
    assert!(matches!(err, IncidentServiceError::MissingActor));
    assert_eq!(
        service.get(incident.id).unwrap().status,
        IncidentStatus::Pending
    );
}

#[test]
fn terminal_incidents_cannot_be_completed_or_cancelled_again() {
    let harbor = harbor();
    let service = harbor.service();
    let session = SessionContext::with_actor(harbor.skipper);
    let cancelled = service
        .create_incident(harbor.assignment_id, harbor.yacht_id, due(2))
        .unwrap();
    service.cancel(cancelled.id).unwrap();

    let err = service.complete(&session, cancelled.id).unwrap_err();
    assert!(matches!(
        err,
        IncidentServiceError::AlreadyTerminal {
            status: IncidentStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        format!("incident {} is already cancelled", cancelled.id)
    );
    assert!(service.cancel(cancelled.id).is_err());
}

#[test]
fn cancel_leaves_no_completion_stamp() {
    let harbor = harbor();
    let service = harbor.service();
    let incident = service
        .create_incident(harbor.assignment_id, harbor.yacht_id, due(3))
        .unwrap();

    let cancelled = service.cancel(incident.id).unwrap();
    assert_eq!(cancelled.status, IncidentStatus::Cancelled);
    assert_eq!(cancelled.completed_by, None);
    assert_eq!(cancelled.completed_at, None);
}

#[test]
fn admin_edit_reopens_and_moves_due_date() {
    let harbor = harbor();
    let service = harbor.service();
    let admin_session = SessionContext::with_actor(harbor.admin);
    let incident = service
        .create_incident(harbor.assignment_id, harbor.yacht_id, due(4))
        .unwrap();
    service
        .complete(&SessionContext::with_actor(harbor.skipper), incident.id)
        .unwrap();

    let reopened = service
        .admin_edit(
            &admin_session,
            incident.id,
            &AdminIncidentEdit {
                status: Some(IncidentStatus::Pending),
                due_date: Some(due(20)),
                ..AdminIncidentEdit::default()
            },
        )
        .unwrap();
    assert_eq!(reopened.status, IncidentStatus::Pending);
    assert_eq!(reopened.due_date, due(20));
    assert_eq!(reopened.completed_by, None);
    assert_eq!(reopened.completed_at, None);

    let completed = service
        .admin_edit(
            &admin_session,
            incident.id,
            &AdminIncidentEdit {
                status: Some(IncidentStatus::Completed),
                ..AdminIncidentEdit::default()
            },
        )
        .unwrap();
    assert_eq!(completed.completed_by, Some(harbor.admin.user_id));
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.due_date, due(20));
}

#[test]
fn create_for_foreign_assignment_is_rejected_by_store() {
    let harbor = harbor();
    let service = harbor.service();
    let stranger = Uuid::new_v4();

    let err = service
        .create_incident(harbor.assignment_id, stranger, due(5))
        .unwrap_err();
    match err {
        IncidentServiceError::Repo(RepoError::Rejected(message)) => assert_eq!(
            message,
            format!(
                "assignment {} is not an active assignment of yacht {}",
                harbor.assignment_id, stranger
            )
        ),
        other => panic!("expected store rejection, got {other:?}"),
    }
}

#[test]
fn list_filters_by_status_and_orders_by_due_date() {
    let harbor = harbor();
    let service = harbor.service();
    let late = service
        .create_incident(harbor.assignment_id, harbor.yacht_id, due(28))
        .unwrap();
    let early = service
        .create_incident(harbor.assignment_id, harbor.yacht_id, due(7))
        .unwrap();
    let done = service
        .create_incident(harbor.assignment_id, harbor.yacht_id, due(1))
        .unwrap();
    service.cancel(done.id).unwrap();

    let pending = service
        .list(&IncidentListQuery {
            status: Some(IncidentStatus::Pending),
            ..IncidentListQuery::default()
        })
        .unwrap();
    let ids: Vec<Uuid> = pending.iter().map(|incident| incident.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);

    let everything = service.list(&IncidentListQuery::default()).unwrap();
    assert_eq!(everything.len(), 3);
    assert_eq!(everything[0].id, done.id);
}

#[test]
fn admin_edit_cannot_move_incident_to_another_yachts_assignment() {
    let harbor = harbor();
    let service = harbor.service();
    let incident = service
        .create_incident(harbor.assignment_id, harbor.yacht_id, due(6))
        .unwrap();

    let foreign_assignment = {
        let assignments = SqliteAssignmentRepository::try_new(&harbor.conn).unwrap();
        let template_id = assignments
            .get_assignment(harbor.assignment_id)
            .unwrap()
            .unwrap()
            .template_id
            .unwrap();
        let directory = SqliteDirectoryRepository::try_new(&harbor.conn).unwrap();
        let group = directory.insert_group(None, "Adriatic").unwrap();
        let borealis = directory.insert_yacht(group.id, "Borealis").unwrap();
        assignments
            .assign_template_to_yacht(template_id, borealis.id, false)
            .unwrap();
        assignments
            .list_assignments(&AssignmentListQuery::for_scope(AssignmentScope::Yacht(
                borealis.id,
            )))
            .unwrap()
            .remove(0)
            .id
    };

    let err = service
        .admin_edit(
            &SessionContext::with_actor(harbor.admin),
            incident.id,
            &AdminIncidentEdit {
                assignment_id: Some(foreign_assignment),
                due_date: Some(due(9)),
                ..AdminIncidentEdit::default()
            },
        )
        .unwrap_err();
    match err {
        IncidentServiceError::Repo(RepoError::Rejected(message)) => assert_eq!(
            message,
            format!(
                "assignment {} is not an active assignment of yacht {}",
                foreign_assignment, harbor.yacht_id
            )
        ),
        other => panic!("expected store rejection, got {other:?}"),
    }

    let stored = service.get(incident.id).unwrap();
    assert_eq!(stored.assignment_id, harbor.assignment_id);
    assert_eq!(stored.due_date, due(6));
}
