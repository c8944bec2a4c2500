use keydev_model::{AllocationKey, KeyDevStatus, Weight};
use keydev_test_utils::{admin, business_validator, month, requester, Fixture, DEPT, TEAM};
use keydev_workflow::{TransitionRequest, WorkflowError};

fn front_validate(fx: &Fixture, id: keydev_model::KeyDevId) -> Result<(), WorkflowError> {
    fx.service
        .transition(
            Some(&business_validator()),
            &TransitionRequest::new(id, KeyDevStatus::FrontValidated)
                .with_month_ref(month())
                .with_validated_mockup_commit("4f2a9c1"),
        )
        .map(|_| ())
}

#[test]
fn exactly_max_alloc_key_devs_are_admitted() {
    let fx = Fixture::seeded(2);
    let ids: Vec<_> = (0..3)
        .map(|n| {
            let kd = fx.create(&format!("KeyDev {n}"));
            fx.drive_to(kd.id, KeyDevStatus::Approved).unwrap();
            kd.id
        })
        .collect();

    front_validate(&fx, ids[0]).unwrap();
    front_validate(&fx, ids[1]).unwrap();
    let err = front_validate(&fx, ids[2]).unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::CapacityExhausted {
            max_alloc: 2,
            admitted: 2,
            ..
        }
    ));

    // Freeing a slot does not revisit the earlier refusal.
    fx.service.soft_delete(Some(&requester()), ids[0]).unwrap();
    let third = fx.service.get_key_dev(Some(&requester()), ids[2]).unwrap();
    assert_eq!(third.status, KeyDevStatus::Approved);

    // A fresh request is admitted into the freed slot.
    front_validate(&fx, ids[2]).unwrap();
}

#[test]
fn admitted_statuses_keep_their_slot() {
    let fx = Fixture::seeded(1);
    let first = fx.create("first");
    fx.drive_to(first.id, KeyDevStatus::Done).unwrap();

    let second = fx.create("second");
    fx.drive_to(second.id, KeyDevStatus::Approved).unwrap();
    assert!(matches!(
        front_validate(&fx, second.id),
        Err(WorkflowError::CapacityExhausted { .. })
    ));

    // Checked no longer counts against the month.
    fx.drive_to(first.id, KeyDevStatus::Checked).unwrap();
    front_validate(&fx, second.id).unwrap();
}

#[test]
fn concurrent_admissions_never_exceed_allocation() {
    let fx = Fixture::seeded(1);
    let ids: Vec<_> = (0..8)
        .map(|n| {
            let kd = fx.create(&format!("KeyDev {n}"));
            fx.drive_to(kd.id, KeyDevStatus::Approved).unwrap();
            kd.id
        })
        .collect();

    let service = &fx.service;
    let admitted = std::thread::scope(|scope| {
        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                scope.spawn(move || {
                    service
                        .transition(
                            Some(&business_validator()),
                            &TransitionRequest::new(id, KeyDevStatus::FrontValidated)
                                .with_month_ref(month())
                                .with_validated_mockup_commit("4f2a9c1"),
                        )
                        .is_ok()
                })
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .filter(|ok| *ok)
            .count()
    });
    assert_eq!(admitted, 1);
}

#[test]
fn slot_usage_reports_count_and_weight() {
    let fx = Fixture::seeded(3);
    for n in 0..2 {
        let kd = fx.create(&format!("KeyDev {n}"));
        fx.drive_to(kd.id, KeyDevStatus::FrontValidated).unwrap();
    }

    let usage = fx
        .service
        .slot_usage(
            Some(&admin()),
            &AllocationKey::new(month(), DEPT.into(), TEAM.into()),
        )
        .unwrap();
    assert_eq!(usage.max_alloc, Some(3));
    assert_eq!(usage.admissions, 2);
    assert!((usage.weighted - 2.0 * Weight::Half.value()).abs() < f64::EPSILON);
}

#[test]
fn failed_admission_writes_nothing() {
    let fx = Fixture::seeded(0);
    let kd = fx.create("CSV export");
    let before = fx.drive_to(kd.id, KeyDevStatus::Approved).unwrap();
    front_validate(&fx, kd.id).unwrap_err();
    let after = fx.service.get_key_dev(Some(&requester()), kd.id).unwrap();
    assert_eq!(before, after);
}
