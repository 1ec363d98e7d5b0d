//! Registry and options-table scenarios that cross module boundaries.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use courier_core::{AuthKey, AUTH_KEY_LEN, DEFAULT_MAIN_DC};
use courier_session::{DcOptionsTable, DcRegistry};

use crate::infra::{dc_option, Call, RecordingPersist, ScriptedDispatch};

fn key(fill: u8) -> Arc<AuthKey> {
    Arc::new(AuthKey::new([fill; AUTH_KEY_LEN]))
}

#[test]
fn test_key_changes_schedule_persistence_writes() {
    let persist = Arc::new(RecordingPersist::default());
    let registry = DcRegistry::with_persist(persist.clone());

    // Load-from-disk path: no write scheduled.
    registry.get_or_create_record(1, Some(key(1)));
    assert_eq!(persist.key_writes.load(Ordering::SeqCst), 0);

    // A fresh key negotiation schedules exactly one write.
    registry.set_key(2, Some(key(2)));
    assert_eq!(persist.key_writes.load(Ordering::SeqCst), 1);

    // Removal fires the hook but skips the write.
    registry.destroy_key(2);
    assert_eq!(persist.key_writes.load(Ordering::SeqCst), 1);

    let keyed: Vec<_> = registry.all_keys().iter().map(|(dc, _)| *dc).collect();
    assert_eq!(keyed, vec![1]);
}

#[test]
fn test_logout_other_dcs_spares_the_main_dc() {
    let dispatch = ScriptedDispatch::with_main(2);
    let registry = DcRegistry::with_persist(Arc::new(RecordingPersist::default()));

    registry.set_key(1, Some(key(1)));
    registry.set_key(2, Some(key(2)));
    registry.set_key(4, Some(key(4)));

    registry.logout_other_dcs(dispatch.as_ref());

    let calls = dispatch.take_calls();
    assert_eq!(calls, vec![Call::Logout(1), Call::Logout(4)]);
}

#[test]
fn test_logout_follows_the_transports_current_main() {
    let dispatch = ScriptedDispatch::with_main(1);
    let registry = DcRegistry::with_persist(Arc::new(RecordingPersist::default()));
    registry.set_key(1, Some(key(1)));
    registry.set_key(3, Some(key(3)));

    // The transport migrated to DC 3 after the registry default was set.
    dispatch.set_main(3);
    assert_eq!(registry.main_dc(), DEFAULT_MAIN_DC);
    registry.logout_other_dcs(dispatch.as_ref());

    assert_eq!(dispatch.take_calls(), vec![Call::Logout(1)]);
}

#[test]
fn test_concurrent_key_churn_keeps_index_consistent() {
    let registry = Arc::new(DcRegistry::with_persist(Arc::new(
        RecordingPersist::default(),
    )));

    let mut handles = Vec::new();
    for dc in 1..=4 {
        let registry = registry.clone();
        handles.push(std::thread::spawn(move || {
            for round in 0..100u8 {
                if round % 3 == 0 {
                    registry.destroy_key(dc);
                } else {
                    registry.set_key(dc, Some(key(round)));
                }
            }
            // Leave a known final key behind for the assertions below.
            registry.set_key(dc, Some(key(dc as u8)));
        }));
    }
    let snapshots = {
        let registry = registry.clone();
        std::thread::spawn(move || {
            for _ in 0..200 {
                // Snapshots must always be internally consistent; len is
                // bounded by the number of writer threads.
                assert!(registry.all_keys().len() <= 4);
            }
        })
    };
    for handle in handles {
        handle.join().unwrap();
    }
    snapshots.join().unwrap();

    // Every DC's last operation was a set, so all four must be present,
    // and the record table and the index must agree on the key.
    let keys = registry.all_keys();
    assert_eq!(keys.len(), 4);
    for (dc, indexed) in keys {
        assert_eq!(indexed.key_id(), key(dc as u8).key_id());
        let held = registry.key(dc).expect("record should hold a key");
        assert_eq!(held.key_id(), indexed.key_id());
    }
}

#[test]
fn test_options_apply_reports_restarts_across_reapplication() {
    let table = DcOptionsTable::new();

    let restart = table.apply(&[dc_option(1, 443), dc_option(2, 443)]);
    assert!(restart.is_empty());

    // Same list again: nothing changed.
    let restart = table.apply(&[dc_option(1, 443), dc_option(2, 443)]);
    assert!(restart.is_empty());

    // One port changes, plus an in-call duplicate that must be ignored.
    let restart = table.apply(&[dc_option(1, 8443), dc_option(1, 9999), dc_option(2, 443)]);
    assert_eq!(restart.into_iter().collect::<Vec<_>>(), vec![1]);
    assert_eq!(table.get(1).unwrap().port, 8443);
}
