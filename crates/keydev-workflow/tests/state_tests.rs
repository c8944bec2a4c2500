use keydev_model::{Caller, KeyDevStatus, MonthRef, Role, Weight};
use keydev_test_utils::{
    admin, business_validator, month, requester, tech_validator, Fixture,
};
use keydev_workflow::{Edge, TransitionRequest, WorkflowError};
use proptest::prelude::*;

fn full_request(id: keydev_model::KeyDevId, target: KeyDevStatus) -> TransitionRequest {
    TransitionRequest::new(id, target)
        .with_rejection_reason("scope unclear")
        .with_month_ref(month())
        .with_validated_mockup_commit("4f2a9c1")
        .with_weight(Weight::Quarter)
        .with_repo_url("https://git.example/app")
        .with_release_commit("9e1d0b7")
}

#[test]
fn rewind_round_trip_preserves_fields() {
    let fx = Fixture::seeded(2);
    let kd = fx.create("CSV export");
    let front = fx.drive_to(kd.id, KeyDevStatus::FrontValidated).unwrap();

    let receipt = fx
        .service
        .transition(Some(&admin()), &TransitionRequest::new(kd.id, KeyDevStatus::Approved))
        .unwrap();
    assert_eq!(receipt.edge, Edge::Rewind);

    let back = fx.service.get_key_dev(Some(&admin()), kd.id).unwrap();
    assert_eq!(back.status, KeyDevStatus::Approved);
    assert_eq!(back.weight, front.weight);
    assert_eq!(back.validated_mockup_commit, front.validated_mockup_commit);
    assert_eq!(back.month_ref, front.month_ref);
    assert_eq!(back.front_validated_at, front.front_validated_at);
}

#[test]
fn rewind_overrides_apply() {
    let fx = Fixture::seeded(2);
    let kd = fx.create("CSV export");
    fx.drive_to(kd.id, KeyDevStatus::FrontValidated).unwrap();
    let later: MonthRef = "2026-04".parse().unwrap();

    fx.service
        .transition(
            Some(&admin()),
            &TransitionRequest::new(kd.id, KeyDevStatus::Approved)
                .with_weight(Weight::One)
                .with_month_ref(later.clone()),
        )
        .unwrap();
    let back = fx.service.get_key_dev(Some(&admin()), kd.id).unwrap();
    assert_eq!(back.weight, Some(Weight::One));
    assert_eq!(back.month_ref, Some(later));
    assert_eq!(back.validated_mockup_commit.as_deref(), Some("4f2a9c1"));
}

#[test]
fn readmission_after_rewind_checks_capacity_again() {
    let fx = Fixture::seeded(1);
    let kd = fx.create("CSV export");
    fx.drive_to(kd.id, KeyDevStatus::FrontValidated).unwrap();
    fx.service
        .transition(Some(&admin()), &TransitionRequest::new(kd.id, KeyDevStatus::Approved))
        .unwrap();

    // The slot it vacated is free again, so it readmits itself.
    fx.service
        .transition(
            Some(&business_validator()),
            &TransitionRequest::new(kd.id, KeyDevStatus::FrontValidated),
        )
        .unwrap();
}

#[test]
fn skipping_ahead_is_rejected_for_everyone() {
    let fx = Fixture::seeded(2);
    let kd = fx.create("CSV export");
    for who in [requester(), admin()] {
        let err = fx
            .service
            .transition(Some(&who), &full_request(kd.id, KeyDevStatus::InProgress))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    }
}

#[test]
fn checked_is_final() {
    let fx = Fixture::seeded(2);
    let kd = fx.create("CSV export");
    fx.drive_to(kd.id, KeyDevStatus::Checked).unwrap();
    for target in KeyDevStatus::ALL {
        let err = fx
            .service
            .transition(Some(&admin()), &full_request(kd.id, target))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    }
}

fn any_status() -> impl Strategy<Value = KeyDevStatus> {
    prop::sample::select(KeyDevStatus::ALL.to_vec())
}

fn any_caller() -> impl Strategy<Value = Caller> {
    prop_oneof![
        Just(requester()),
        Just(tech_validator()),
        Just(business_validator()),
        Just(admin()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_recorded_statuses_follow_the_edge_set(
        steps in prop::collection::vec((any_status(), any_caller()), 1..24)
    ) {
        let fx = Fixture::seeded(4);
        let kd = fx.create("generated");
        fx.service
            .update_draft(
                Some(&requester()),
                kd.id,
                keydev_workflow::DraftUpdate::default().with_mockup_repo_url("https://x"),
            )
            .unwrap();

        for (target, who) in steps {
            let before = fx.service.get_key_dev(Some(&admin()), kd.id).unwrap();
            match fx.service.transition(Some(&who), &full_request(kd.id, target)) {
                Ok(receipt) => {
                    prop_assert_eq!(receipt.from, before.status);
                    prop_assert_eq!(Edge::resolve(before.status, target), Some(receipt.edge));
                    if receipt.edge == Edge::Rewind || receipt.edge == Edge::Check {
                        prop_assert!(who.roles.has_role(Role::Admin));
                    }
                    let after = fx.service.get_key_dev(Some(&admin()), kd.id).unwrap();
                    prop_assert_eq!(after.status, target);
                }
                Err(_) => {
                    let after = fx.service.get_key_dev(Some(&admin()), kd.id).unwrap();
                    prop_assert_eq!(after, before);
                }
            }
        }
    }
}
