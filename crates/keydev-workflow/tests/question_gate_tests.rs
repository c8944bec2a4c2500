use keydev_model::{KeyDevId, KeyDevStatus, LabelId, RecipientRole, Role, Weight};
use keydev_test_utils::{admin, caller, requester, tech_validator, Fixture, RecordingSink};
use keydev_workflow::{NotificationEvent, NotificationWorker, WorkflowError};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn in_progress(fx: &Fixture) -> KeyDevId {
    let kd = fx.create("CSV export");
    fx.drive_to(kd.id, KeyDevStatus::InProgress).unwrap();
    kd.id
}

fn status(fx: &Fixture, id: KeyDevId) -> KeyDevStatus {
    fx.service.get_key_dev(Some(&admin()), id).unwrap().status
}

#[test]
fn start_is_idempotent() {
    let fx = Fixture::seeded(2);
    let id = in_progress(&fx);
    let owner = tech_validator();

    let first = fx.service.start_question_phase(Some(&owner), id, None).unwrap();
    let second = fx.service.start_question_phase(Some(&owner), id, None).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(fx.service.questions(Some(&owner), id).unwrap(), first);
    assert!(first.windows(2).all(|w| w[0].order < w[1].order));
}

#[test]
fn start_requires_an_owner() {
    let fx = Fixture::seeded(2);
    let kd = fx.create("CSV export");
    fx.drive_to(kd.id, KeyDevStatus::FrontValidated).unwrap();
    let err = fx
        .service
        .start_question_phase(Some(&admin()), kd.id, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::MissingField("ownerId")));
}

#[test]
fn start_can_set_weight() {
    let fx = Fixture::seeded(2);
    let id = in_progress(&fx);
    fx.service
        .start_question_phase(Some(&tech_validator()), id, Some(Weight::ThreeQuarters))
        .unwrap();
    let kd = fx.service.get_key_dev(Some(&admin()), id).unwrap();
    assert_eq!(kd.weight, Some(Weight::ThreeQuarters));
}

#[test]
fn validating_the_last_answer_flips_to_approved() {
    let fx = Fixture::seeded(2);
    let id = in_progress(&fx);
    let owner = tech_validator();

    let questions = fx.service.start_question_phase(Some(&owner), id, None).unwrap();
    assert_eq!(status(&fx, id), KeyDevStatus::Rejected);

    let answers: Vec<_> = questions
        .iter()
        .map(|q| {
            fx.service
                .create_answer(Some(&requester()), q.id, "agreed", RecipientRole::Owner)
                .unwrap()
        })
        .collect();

    fx.service
        .validate_answer(Some(&owner), questions[0].id, answers[0].id)
        .unwrap();
    assert_eq!(status(&fx, id), KeyDevStatus::Rejected);

    fx.service
        .validate_answer(Some(&owner), questions[1].id, answers[1].id)
        .unwrap();
    assert_eq!(status(&fx, id), KeyDevStatus::Approved);
}

#[test]
fn new_question_reopens_rejection() {
    let fx = Fixture::seeded(2);
    let id = in_progress(&fx);
    let owner = tech_validator();
    for q in fx.service.start_question_phase(Some(&owner), id, None).unwrap() {
        let a = fx
            .service
            .create_answer(Some(&owner), q.id, "ok", RecipientRole::Requester)
            .unwrap();
        fx.service.validate_answer(Some(&owner), q.id, a.id).unwrap();
    }
    assert_eq!(status(&fx, id), KeyDevStatus::Approved);

    fx.service
        .create_question(Some(&requester()), id, "What about XLSX?")
        .unwrap();
    assert_eq!(status(&fx, id), KeyDevStatus::Rejected);
}

#[test]
fn deleting_the_open_question_approves() {
    let fx = Fixture::seeded(2);
    let id = in_progress(&fx);
    let owner = tech_validator();
    let questions = fx.service.start_question_phase(Some(&owner), id, None).unwrap();
    let answer = fx
        .service
        .create_answer(Some(&owner), questions[0].id, "ok", RecipientRole::Requester)
        .unwrap();
    fx.service
        .validate_answer(Some(&owner), questions[0].id, answer.id)
        .unwrap();
    fx.service
        .assign_label(Some(&owner), questions[1].id, LabelId::new())
        .unwrap();

    let outsider = caller("x", &[Role::TechValidator]);
    let err = fx
        .service
        .delete_question(Some(&outsider), questions[1].id)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthorized(_)));

    fx.service.delete_question(Some(&owner), questions[1].id).unwrap();
    assert_eq!(status(&fx, id), KeyDevStatus::Approved);
    assert_eq!(fx.service.questions(Some(&owner), id).unwrap().len(), 1);
    assert!(matches!(
        fx.service.answers(Some(&owner), questions[1].id),
        Err(WorkflowError::NotFound { .. })
    ));
}

#[test]
fn only_sender_or_admin_edits_answers() {
    let fx = Fixture::seeded(2);
    let id = in_progress(&fx);
    let questions = fx
        .service
        .start_question_phase(Some(&tech_validator()), id, None)
        .unwrap();
    let answer = fx
        .service
        .create_answer(Some(&requester()), questions[0].id, "draft", RecipientRole::Owner)
        .unwrap();

    let err = fx
        .service
        .update_answer(Some(&tech_validator()), answer.id, "hijack")
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthorized(_)));

    let edited = fx
        .service
        .update_answer(Some(&requester()), answer.id, "final")
        .unwrap();
    assert_eq!(edited.body, "final");
    assert!(edited.edited_at.is_some());

    let edited = fx.service.update_answer(Some(&admin()), answer.id, "fixed").unwrap();
    assert_eq!(edited.body, "fixed");
}

#[test]
fn questions_on_checked_key_dev_keep_it_checked() {
    let fx = Fixture::seeded(2);
    let kd = fx.create("CSV export");
    fx.drive_to(kd.id, KeyDevStatus::Checked).unwrap();

    let created = fx
        .service
        .create_question(Some(&requester()), kd.id, "Post-release follow-up?")
        .unwrap();
    assert_eq!(created.validated_answer_id, None);
    assert_eq!(status(&fx, kd.id), KeyDevStatus::Checked);
}

#[test]
fn gate_leaves_question_free_key_devs_alone() {
    let fx = Fixture::new();
    let kd = fx.create("CSV export");
    let err = fx
        .service
        .start_question_phase(Some(&admin()), kd.id, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::MissingField("ownerId")));
    assert_eq!(status(&fx, kd.id), KeyDevStatus::Draft);
}

#[tokio::test]
async fn notifications_reach_the_sink_after_commit() {
    let Fixture {
        service,
        notifications,
        clock: _,
    } = Fixture::seeded(2);
    let sink = Arc::new(RecordingSink::default());
    let worker = NotificationWorker::spawn(notifications, sink.clone());

    let kd = service
        .create_key_dev(
            Some(&requester()),
            keydev_model::NewKeyDev::new("CSV export", "D", "T"),
        )
        .unwrap();
    let tech = tech_validator();
    // Without an owner the question notification has no recipient.
    let orphan = service
        .create_question(Some(&requester()), kd.id, "Who owns this?")
        .unwrap();
    service
        .create_answer(Some(&requester()), orphan.id, "nobody yet", RecipientRole::Owner)
        .unwrap();

    let question = service
        .create_question(Some(&tech), kd.id, "Format?")
        .unwrap();
    let answer = service
        .create_answer(Some(&tech), question.id, "CSV", RecipientRole::Requester)
        .unwrap();
    service
        .update_answer(Some(&tech), answer.id, "CSV and XLSX")
        .unwrap();

    drop(service);
    assert_eq!(worker.await.unwrap(), 2);

    let tasks = sink.tasks();
    assert_eq!(tasks[0].event, NotificationEvent::AnswerCreated);
    assert_eq!(tasks[0].recipient.as_str(), "u1");
    assert_eq!(tasks[1].event, NotificationEvent::AnswerUpdated);
    assert_eq!(tasks[1].entity_id, answer.id.to_string());
}
