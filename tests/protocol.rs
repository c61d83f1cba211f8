//! Read/upload protocol against real on-disk stores.

mod common;

use common::{Config, TestStore, codec, initial_config, playlist, wide_config};
use confvault::confvault_git::{GitOid, RefName};
use confvault::{
    BinaryCodec, ConflictReason, JsonCodec, Snapshot, StoreConfig, StoreError, TomlCodec,
    UploadOutcome, VersionToken,
};
use serde::{Deserialize, Serialize};

fn rename(snapshot: &Snapshot<Config>, id: &str) -> Snapshot<Config> {
    snapshot.clone().map(|mut c| {
        c.id = id.to_owned();
        c
    })
}

fn widen_second(snapshot: &Snapshot<Config>) -> Snapshot<Config> {
    snapshot.clone().map(|mut c| {
        c.playlists[1].min = 6;
        c.playlists[1].max = 10;
        c
    })
}

// ---------------------------------------------------------------------------
// First write and read-after-write
// ---------------------------------------------------------------------------

#[test]
fn first_write_on_empty_store_applies() {
    let mut ts = TestStore::new();
    assert_eq!(ts.tip(), None);

    let outcome = ts
        .store
        .upload_update(&Snapshot::new(initial_config()), &codec())
        .unwrap();
    let UploadOutcome::Applied { version } = outcome else {
        panic!("first write rejected: {outcome:?}");
    };

    let snapshot = ts.store.get_snapshot(&codec()).unwrap();
    assert_eq!(snapshot.data, initial_config());
    assert_eq!(snapshot.version, Some(version));
    assert_eq!(ts.tip(), Some(version));
}

#[test]
fn first_write_ignores_supplied_token() {
    let mut ts = TestStore::new();
    let bogus: VersionToken = "1111111111111111111111111111111111111111".parse().unwrap();

    let outcome = ts
        .store
        .upload_update(&Snapshot::with_version(initial_config(), bogus), &codec())
        .unwrap();
    assert!(outcome.is_applied());
}

#[test]
fn read_after_write_returns_new_document_and_new_token() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());

    let outcome = ts.store.upload_update(&rename(&t1, "2"), &codec()).unwrap();
    assert!(outcome.is_applied(), "{outcome:?}");

    let snapshot = ts.store.get_snapshot(&codec()).unwrap();
    assert_eq!(snapshot.data.id, "2");
    assert_eq!(snapshot.data.playlists, initial_config().playlists);
    assert_ne!(snapshot.version, t1.version);
    assert_eq!(snapshot.version, outcome.version());
}

#[test]
fn repeated_reads_are_stable() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());
    let again = ts.store.get_snapshot(&codec()).unwrap();
    assert_eq!(again, t1);
}

#[test]
fn json_helpers_match_explicit_codec() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());
    let snapshot = ts.store.get_json_snapshot::<Config>().unwrap();
    assert_eq!(snapshot, t1);

    let outcome = ts.store.upload_json_update(&rename(&snapshot, "json")).unwrap();
    assert!(outcome.is_applied());
    assert_eq!(ts.store.get_json_snapshot::<Config>().unwrap().data.id, "json");
}

// ---------------------------------------------------------------------------
// Concurrent edits from the same base
// ---------------------------------------------------------------------------

#[test]
fn disjoint_edits_from_same_base_both_apply() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());

    let first = ts.store.upload_update(&rename(&t1, "2"), &codec()).unwrap();
    assert!(first.is_applied(), "{first:?}");
    assert_eq!(ts.store.get_snapshot(&codec()).unwrap().data.id, "2");

    let second = ts.store.upload_update(&widen_second(&t1), &codec()).unwrap();
    assert!(second.is_applied(), "{second:?}");

    let result = ts.store.get_snapshot(&codec()).unwrap();
    assert_eq!(
        result.data,
        Config {
            id: "2".to_owned(),
            playlists: vec![playlist("1-1", 1, 1), playlist("1-2", 6, 10)],
        }
    );
    assert_eq!(result.version, second.version());

    let history = ts.store.history(10).unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[0].is_merge);
    assert!(!history[1].is_merge);
    assert_eq!(history[1].version, first.version().unwrap());
    assert_eq!(Some(history[2].version), t1.version);
}

#[test]
fn overlapping_edits_from_same_base_conflict() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());

    let first = ts.store.upload_update(&rename(&t1, "A"), &codec()).unwrap();
    assert!(first.is_applied());
    let tip_before = ts.tip();

    let second = ts.store.upload_update(&rename(&t1, "B"), &codec()).unwrap();
    match second {
        UploadOutcome::Conflict {
            base,
            reason: ConflictReason::Content { conflicts },
        } => {
            assert_eq!(base, t1.version);
            assert!(conflicts >= 1);
        }
        other => panic!("expected content conflict, got {other:?}"),
    }

    assert_eq!(ts.tip(), tip_before);
    assert_eq!(ts.store.get_snapshot(&codec()).unwrap().data.id, "A");
}

#[test]
fn rejected_upload_leaves_document_bytes_identical() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());
    ts.store
        .upload_update(&widen_second(&t1), &codec())
        .unwrap();
    let before = ts.main_bytes();

    let clashing = t1.clone().map(|mut c| {
        c.playlists[1].min = 0;
        c.playlists[1].max = 100;
        c
    });
    let outcome = ts.store.upload_update(&clashing, &codec()).unwrap();
    assert!(!outcome.is_applied());

    assert_eq!(ts.main_bytes(), before);
    assert_eq!(ts.store.read_working_file().unwrap(), Some(before));
}

#[test]
fn stale_base_with_unrelated_history_still_merges() {
    let (mut ts, t1) = TestStore::seeded(&wide_config(8));

    // Three independent writers, all from t1, touching far-apart playlists.
    for index in [0_usize, 3, 6] {
        let candidate = t1.clone().map(|mut c| {
            c.playlists[index].max = 99;
            c
        });
        let outcome = ts.store.upload_update(&candidate, &codec()).unwrap();
        assert!(outcome.is_applied(), "playlist {index}: {outcome:?}");
    }

    let result = ts.store.get_snapshot(&codec()).unwrap().data;
    for (i, p) in result.playlists.iter().enumerate() {
        let expected = if [0, 3, 6].contains(&i) { 99 } else { 10 };
        assert_eq!(p.max, expected, "playlist {i}");
    }
}

// ---------------------------------------------------------------------------
// Version token validation
// ---------------------------------------------------------------------------

#[test]
fn unknown_token_is_rejected_without_mutation() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());
    let before = ts.main_bytes();

    let ghost: VersionToken = "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef".parse().unwrap();
    let candidate = Snapshot::with_version(initial_config(), ghost).map(|mut c| {
        c.id = "ghost".to_owned();
        c
    });
    let err = ts.store.upload_update(&candidate, &codec()).unwrap_err();
    assert!(
        matches!(err, StoreError::InvalidVersionToken { .. }),
        "expected InvalidVersionToken, got {err:?}"
    );

    assert_eq!(ts.tip(), t1.version);
    assert_eq!(ts.main_bytes(), before);
    assert!(ts.store.ephemeral_branches().unwrap().is_empty());
}

#[test]
fn token_off_the_main_line_is_rejected() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());

    let side = RefName::new("refs/heads/side").unwrap();
    let from: GitOid = t1.version.unwrap().to_string().parse().unwrap();
    ts.store.create_branch(&side, from).unwrap();
    ts.store.checkout(&side).unwrap();
    ts.store.write_working_file(b"{}\n").unwrap();
    let side_commit = ts.store.commit().unwrap();
    let main = ts.store.main_ref().clone();
    ts.store.checkout(&main).unwrap();

    let token: VersionToken = side_commit.to_string().parse().unwrap();
    let err = ts
        .store
        .upload_update(&Snapshot::with_version(initial_config(), token), &codec())
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidVersionToken { .. }), "{err:?}");
    assert_eq!(ts.tip(), t1.version);
}

#[test]
fn missing_token_with_history_is_rejected() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());
    let err = ts
        .store
        .upload_update(&Snapshot::new(initial_config()), &codec())
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidVersionToken { .. }), "{err:?}");
    assert_eq!(ts.tip(), t1.version);
}

#[test]
fn malformed_token_fails_to_parse() {
    let err = "not a token".parse::<VersionToken>().unwrap_err();
    assert!(matches!(err, StoreError::InvalidVersionToken { .. }));
    assert!(!err.is_fault());
}

// ---------------------------------------------------------------------------
// Ephemeral branches
// ---------------------------------------------------------------------------

#[test]
fn ephemeral_branches_removed_after_success_and_conflict() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());

    assert!(ts.store.upload_update(&rename(&t1, "A"), &codec()).unwrap().is_applied());
    assert!(ts.store.ephemeral_branches().unwrap().is_empty());

    assert!(!ts.store.upload_update(&rename(&t1, "B"), &codec()).unwrap().is_applied());
    assert!(ts.store.ephemeral_branches().unwrap().is_empty());

    assert_eq!(ts.store.checked_out(), ts.store.main_ref());
}

#[test]
fn custom_branch_prefix_is_used_and_cleaned() {
    let config = StoreConfig {
        branch_prefix: "refs/heads/pending/".to_owned(),
        ..StoreConfig::default()
    };
    let mut ts = TestStore::with_config(config);
    let seeded = ts
        .store
        .upload_update(&Snapshot::new(initial_config()), &codec())
        .unwrap();
    let t1 = Snapshot::with_version(initial_config(), seeded.version().unwrap());

    assert!(ts.store.upload_update(&rename(&t1, "2"), &codec()).unwrap().is_applied());
    assert!(ts.store.ephemeral_branches().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Read failures
// ---------------------------------------------------------------------------

#[test]
fn read_before_first_upload_is_not_found() {
    let mut ts = TestStore::new();
    let err = ts.store.get_snapshot(&codec()).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "{err:?}");
    assert!(!err.is_fault());
}

#[test]
fn read_with_wrong_shape_is_decode_error() {
    let (mut ts, _) = TestStore::seeded(&initial_config());
    let err = ts
        .store
        .get_snapshot(&JsonCodec::<Vec<u32>>::new())
        .unwrap_err();
    assert!(matches!(err, StoreError::Decode(_)), "{err:?}");
}

// ---------------------------------------------------------------------------
// History and historical reads
// ---------------------------------------------------------------------------

#[test]
fn snapshot_at_earlier_version() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());
    ts.store.upload_update(&rename(&t1, "2"), &codec()).unwrap();

    let old = ts
        .store
        .get_snapshot_at(&codec(), t1.version.unwrap())
        .unwrap();
    assert_eq!(old, t1);
    assert_eq!(ts.store.get_snapshot(&codec()).unwrap().data.id, "2");
}

#[test]
fn history_is_newest_first_and_limited() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());
    let t2 = ts.store.upload_update(&rename(&t1, "2"), &codec()).unwrap();
    let snap2 = ts.store.get_snapshot(&codec()).unwrap();
    let t3 = ts.store.upload_update(&rename(&snap2, "3"), &codec()).unwrap();

    let all = ts.store.history(10).unwrap();
    let versions: Vec<_> = all.iter().map(|e| Some(e.version)).collect();
    assert_eq!(versions, vec![t3.version(), t2.version(), t1.version]);
    assert!(all.iter().all(|e| e.message == "Upload new version"));

    assert_eq!(ts.store.history(1).unwrap().len(), 1);
}

#[test]
fn overwrite_applies_regardless_of_base() {
    let (mut ts, t1) = TestStore::seeded(&initial_config());
    ts.store.upload_update(&rename(&t1, "2"), &codec()).unwrap();

    let reset = initial_config();
    let outcome = ts.store.overwrite(&reset, &codec()).unwrap();
    assert!(outcome.is_applied());

    let snapshot = ts.store.get_snapshot(&codec()).unwrap();
    assert_eq!(snapshot.data, reset);
    assert_eq!(snapshot.version, outcome.version());
    assert_eq!(ts.store.history(10).unwrap().len(), 3);
}

// ---------------------------------------------------------------------------
// Other codecs
// ---------------------------------------------------------------------------

#[test]
fn binary_documents() {
    let config = StoreConfig {
        document: "payload.bin".to_owned(),
        ..StoreConfig::default()
    };
    let mut ts = TestStore::with_config(config);

    let bytes = vec![0_u8, 1, 2, 0xff, b'\n', 0];
    let first = ts.store.upload_binary_update(&Snapshot::new(bytes.clone())).unwrap();
    assert!(first.is_applied());
    let snapshot = ts.store.get_binary_snapshot().unwrap();
    assert_eq!(snapshot.data, bytes);

    let next = snapshot.map(|mut b| {
        b.push(7);
        b
    });
    assert!(ts.store.upload_binary_update(&next).unwrap().is_applied());
    assert_eq!(
        ts.store.get_snapshot(&BinaryCodec).unwrap().data,
        vec![0_u8, 1, 2, 0xff, b'\n', 0, 7]
    );
    assert!(ts.temp_path().join("store").join("payload.bin").exists());
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Limits {
    name: String,
    low: u32,
    spacer_a: String,
    spacer_b: String,
    spacer_c: String,
    high: u32,
}

#[test]
fn toml_documents_merge_disjoint_edits() {
    let config = StoreConfig {
        document: "limits.toml".to_owned(),
        ..StoreConfig::default()
    };
    let mut ts = TestStore::with_config(config);
    let toml = TomlCodec::<Limits>::new();

    let seed = Limits {
        name: "edge".to_owned(),
        low: 1,
        spacer_a: "a".to_owned(),
        spacer_b: "b".to_owned(),
        spacer_c: "c".to_owned(),
        high: 9,
    };
    ts.store.upload_update(&Snapshot::new(seed), &toml).unwrap();
    let base = ts.store.get_snapshot(&toml).unwrap();

    let lower = base.clone().map(|mut l| {
        l.low = 0;
        l
    });
    let higher = base.map(|mut l| {
        l.high = 20;
        l
    });
    assert!(ts.store.upload_update(&lower, &toml).unwrap().is_applied());
    assert!(ts.store.upload_update(&higher, &toml).unwrap().is_applied());

    let result = ts.store.get_snapshot(&toml).unwrap().data;
    assert_eq!((result.low, result.high), (0, 20));
}

// ---------------------------------------------------------------------------
// Reopening
// ---------------------------------------------------------------------------

#[test]
fn reopened_store_sees_history() {
    let (ts, t1) = TestStore::seeded(&initial_config());
    let mut reopened =
        confvault::ConfigStore::open(&ts.repo_path(), StoreConfig::default()).unwrap();
    assert_eq!(reopened.get_snapshot(&codec()).unwrap(), t1);
}
