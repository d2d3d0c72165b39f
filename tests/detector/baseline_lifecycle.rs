use chrono::{TimeZone, Utc};
use onboard_relay::detector::{ChangeSetDetector, Detection, Entity, PersistOrder};
use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;

fn snapshot(names: &[&str]) -> Vec<Entity> {
    names
        .iter()
        .map(|n| Entity::new(*n).with_description(format!("{n} service")))
        .collect()
}

fn persisted(path: &std::path::Path) -> BTreeSet<String> {
    let names: Vec<String> = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    names.into_iter().collect()
}

#[test]
fn three_runs_bootstrap_detect_and_settle() {
    let tmp = TempDir::new().unwrap();
    let baseline = tmp.path().join("state").join("repos-acme.json");
    let detector = ChangeSetDetector::new(&baseline);
    let run_time = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

    let first = detector.detect_at(&snapshot(&["alpha", "beta"]), run_time).unwrap();
    assert!(matches!(first, Detection::Bootstrap { seeded: 2 }));

    let Detection::Changes(second) = detector
        .detect_at(&snapshot(&["beta", "gamma"]), run_time)
        .unwrap()
    else {
        panic!("second run should compare against the baseline");
    };
    assert_eq!(second.added_names(), BTreeSet::from(["gamma".to_string()]));
    assert_eq!(
        persisted(&baseline),
        BTreeSet::from(["beta".to_string(), "gamma".to_string()])
    );

    let audit = second.audit_path.clone().unwrap();
    assert_eq!(
        audit.file_name().unwrap().to_str().unwrap(),
        "repos-acme-added-20240309-140507.json"
    );
    let records: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&audit).unwrap()).unwrap();
    assert_eq!(records[0]["name"], "gamma");
    assert_eq!(records[0]["description"], "gamma service");

    let Detection::Changes(third) = detector.detect(&snapshot(&["gamma", "beta"])).unwrap() else {
        panic!("baseline exists");
    };
    assert!(third.is_empty());
}

#[test]
fn after_notify_order_defers_the_write_until_commit() {
    let tmp = TempDir::new().unwrap();
    let baseline = tmp.path().join("repos.json");
    let detector = ChangeSetDetector::new(&baseline)
        .with_persist_order(PersistOrder::AfterNotify)
        .with_audit(false);

    detector.detect(&snapshot(&["alpha"])).unwrap();
    let Detection::Changes(mut change_set) = detector.detect(&snapshot(&["alpha", "beta"])).unwrap()
    else {
        panic!("baseline exists");
    };

    assert!(change_set.is_pending());
    assert_eq!(persisted(&baseline), BTreeSet::from(["alpha".to_string()]));

    detector.commit(&mut change_set).unwrap();
    assert_eq!(
        persisted(&baseline),
        BTreeSet::from(["alpha".to_string(), "beta".to_string()])
    );
}

#[test]
fn corrupt_baseline_over_reports_and_is_repaired() {
    let tmp = TempDir::new().unwrap();
    let baseline = tmp.path().join("repos.json");
    fs::write(&baseline, "{ not json").unwrap();
    let detector = ChangeSetDetector::new(&baseline).with_audit(false);

    let Detection::Changes(change_set) = detector.detect(&snapshot(&["alpha", "beta"])).unwrap()
    else {
        panic!("an unreadable baseline is not a missing one");
    };

    assert_eq!(change_set.added.len(), 2);
    assert_eq!(persisted(&baseline).len(), 2);
}
