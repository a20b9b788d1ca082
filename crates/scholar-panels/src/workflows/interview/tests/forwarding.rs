use super::common::*;
use crate::workflows::interview::domain::{DestinationTag, PanelId};
use crate::workflows::interview::forwarding::{ForwardError, ForwardingGate};
use crate::workflows::interview::panels::PanelError;
use crate::workflows::interview::repository::NotificationLevel;
use crate::workflows::interview::service::ServiceError;
use crate::workflows::interview::session::{EditState, ScoringSession, SessionError};
use std::sync::Arc;

#[test]
fn forwarding_requires_consent() {
    let (service, repository, notifier) = build_service(registrations(4), 2);

    match service.forward_candidate(&id("c-01"), false) {
        Err(ServiceError::Forward(ForwardError::ConsentRequired(candidate))) => {
            assert_eq!(candidate, id("c-01"));
        }
        other => panic!("expected consent error, got {other:?}"),
    }
    assert!(!repository.get(&id("c-01")).forwarded);
    assert_eq!(notifier.count(NotificationLevel::Error), 1);
}

#[test]
fn forwarding_routes_by_department_and_freezes_the_record() {
    let mut candidates = registrations(2);
    candidates[1].department = "Philosophy".to_string();
    let (service, repository, _) = build_service(candidates, 1);

    let physics = service
        .forward_candidate(&id("c-01"), true)
        .expect("forward succeeds");
    assert!(physics.forwarded);
    assert!(physics.forwarded_at.is_some());
    assert_eq!(
        physics.destination,
        Some(DestinationTag("faculty-science".to_string()))
    );

    let other = service
        .forward_candidate(&id("c-02"), true)
        .expect("forward succeeds");
    assert_eq!(
        other.destination,
        Some(DestinationTag("faculty-office".to_string()))
    );

    assert_eq!(service.edit_state(&id("c-01")), EditState::Forwarded);
    assert!(matches!(
        service.begin_edit(&id("c-01")),
        Err(ServiceError::Session(SessionError::Forwarded(_)))
    ));
    assert!(matches!(
        service.forward_candidate(&id("c-01"), true),
        Err(ServiceError::Forward(ForwardError::AlreadyForwarded(_)))
    ));
    assert!(repository.get(&id("c-01")).marks.is_empty());
}

#[test]
fn forwarding_closes_an_open_edit_buffer() {
    let (service, repository, _) = build_service(registrations(2), 1);
    let candidate = id("c-02");
    service.begin_edit(&candidate).expect("edit opens");
    service.input_mark(&candidate, 0, "14").expect("input accepted");

    service
        .forward_candidate(&candidate, true)
        .expect("forward succeeds");

    assert!(!service.session().has_pending_autosave(&candidate));
    assert!(service.session().snapshot(&candidate).is_none());
    assert!(repository.get(&candidate).marks.is_empty());
}

#[test]
fn panel_forward_skips_members_already_forwarded() {
    let (service, repository, notifier) = build_service(registrations(10), 2);
    service
        .forward_candidate(&id("c-02"), true)
        .expect("forward succeeds");

    let report = service
        .forward_panel(PanelId(1), true)
        .expect("panel forward runs");

    assert_eq!(report.forwarded(), 4);
    assert_eq!(report.failed(), 0);
    for n in 1..=5 {
        assert!(repository.get(&id(&format!("c-{n:02}"))).forwarded);
    }
    assert!(!repository.get(&id("c-06")).forwarded);
    assert!(notifier.count(NotificationLevel::Success) >= 2);
}

#[test]
fn panel_forward_without_consent_forwards_nobody() {
    let (service, repository, _) = build_service(registrations(4), 2);

    let report = service
        .forward_panel(PanelId(2), false)
        .expect("panel forward runs");

    assert_eq!(report.forwarded(), 0);
    assert_eq!(report.failed(), 2);
    assert!(!repository.get(&id("c-03")).forwarded);
    let summary = report.summary();
    assert_eq!(summary.failures.len(), 2);
}

#[test]
fn panel_forward_rejects_unknown_panels() {
    let (service, _, _) = build_service(registrations(4), 2);
    assert!(matches!(
        service.forward_panel(PanelId(9), true),
        Err(ServiceError::Panel(PanelError::NotFound(PanelId(9))))
    ));
}

#[test]
fn bulk_forward_reports_store_failures_per_candidate() {
    let repository = Arc::new(UnavailableRepository);
    let notifier = Arc::new(MemoryNotifier::default());
    let session = Arc::new(ScoringSession::new(
        repository.clone(),
        notifier.clone(),
        DEBOUNCE,
    ));
    let gate = ForwardingGate::new(repository, notifier.clone(), settings().routing, session);

    let members: Vec<_> = registrations(3)
        .into_iter()
        .map(|mut candidate| {
            candidate.assigned_panel = Some(PanelId(1));
            candidate
        })
        .collect();
    let report = gate.forward_all(PanelId(1), &members, true);

    assert_eq!(report.failed(), 3);
    assert!(report
        .outcomes
        .iter()
        .all(|(_, result)| matches!(result, Err(ForwardError::Repository(_)))));
    assert_eq!(notifier.count(NotificationLevel::Warning), 1);
}

#[test]
fn unseated_candidates_cannot_be_forwarded() {
    let (service, repository, _) = build_service(registrations(3), 0);

    assert!(matches!(
        service.forward_candidate(&id("c-02"), true),
        Err(ServiceError::Forward(ForwardError::Unassigned(_)))
    ));
    assert!(!repository.get(&id("c-02")).forwarded);

    service.create_panel(roster(2)).expect("panel seats");
    assert_eq!(repository.panel_of(&id("c-02")), Some(PanelId(1)));
}

#[test]
fn allocation_leaves_forwarded_records_where_they_are() {
    let mut candidates = registrations(4);
    candidates[1].forwarded = true;
    let (service, repository, _) = build_service(candidates, 0);

    service.create_panel(roster(2)).expect("first panel seats");
    service.create_panel(roster(2)).expect("second panel seats");

    let frozen = repository.get(&id("c-02"));
    assert_eq!(frozen.assigned_panel, None);
    assert!(frozen.panel_evaluators.is_empty());
    assert_eq!(repository.sizes(), vec![2, 1]);
}
