use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gs_backup::cli::{
    describe_bucket, list_buckets, object_grant, read_object, restore_latest, run_daemon,
    write_once,
};
use gs_backup_core::config::{BackupConfig, StoreTarget};
use gs_backup_core::contract::{
    AccessControlEntry, BucketDescriptor, MockRemoteStore, ObjectDescriptor,
};
use gs_backup_core::error::StoreError;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn backup_config(dir: &TempDir) -> BackupConfig {
    let source = dir.path().join("dump.rdb");
    std::fs::write(&source, b"REDIS0009").unwrap();
    BackupConfig {
        target: StoreTarget::new("keen-project", "redis_master_bckp", "master-data"),
        source_path: source,
        interval: Duration::from_secs(5),
        restore_path: dir.path().join("text.read"),
    }
}

fn object(name: &str) -> ObjectDescriptor {
    ObjectDescriptor {
        bucket: "redis_master_bckp".to_string(),
        name: name.to_string(),
        self_link: None,
        media_link: None,
        size: Some(9),
        generation: None,
    }
}

fn acl_entry(entity: &str, role: &str) -> AccessControlEntry {
    AccessControlEntry {
        bucket: "redis_master_bckp".to_string(),
        object: "master-data".to_string(),
        entity: entity.to_string(),
        role: role.to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn daemon_provisions_once_then_runs_until_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let config = backup_config(&dir);
    let cancel = CancellationToken::new();

    let mut store = MockRemoteStore::new();
    store.expect_bucket_exists().times(1).returning(|_| Ok(true));
    store.expect_create_bucket().never();
    store.expect_get_object().times(1).returning(|_, name| {
        Err(StoreError::NotFound {
            resource: name.to_string(),
        })
    });
    store
        .expect_upload_object()
        .times(3)
        .returning(|_, name, content| {
            assert_eq!(content.len, 9);
            Ok(object(name))
        });
    let acl_calls = Arc::new(AtomicUsize::new(0));
    let counter = acl_calls.clone();
    let stop = cancel.clone();
    store
        .expect_upsert_object_acl()
        .times(3)
        .returning(move |_, _, entity, role| {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                stop.cancel();
            }
            Ok(acl_entry(entity, role))
        });

    let cycles = run_daemon(&config, &store, cancel).await.unwrap();
    assert_eq!(cycles, 3);
    assert_eq!(acl_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn daemon_stops_when_credential_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = backup_config(&dir);

    let mut store = MockRemoteStore::new();
    store
        .expect_bucket_exists()
        .returning(|_| Err(StoreError::Unauthorized { status: 401 }));
    store.expect_upload_object().never();

    let err = run_daemon(&config, &store, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("credential rejected"));
}

#[tokio::test]
async fn daemon_fails_fast_on_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = backup_config(&dir);
    config.source_path = dir.path().join("gone.rdb");

    let mut store = MockRemoteStore::new();
    store.expect_bucket_exists().returning(|_| Ok(true));
    store.expect_get_object().returning(|_, name| Ok(object(name)));
    store
        .expect_get_object_acl()
        .returning(|_, _, entity| Ok(acl_entry(entity, "READER")));
    store.expect_download_object().times(1).returning(|_, _| Ok(9));
    store.expect_upload_object().never();
    store.expect_upsert_object_acl().never();

    let err = run_daemon(&config, &store, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cannot open backup source"));
}

#[tokio::test]
async fn write_once_creates_missing_bucket_and_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let config = backup_config(&dir);

    let mut store = MockRemoteStore::new();
    store.expect_bucket_exists().returning(|_| Ok(false));
    store
        .expect_create_bucket()
        .withf(|bucket, project| bucket == "redis_master_bckp" && project == "keen-project")
        .times(1)
        .returning(|bucket, project| {
            Ok(BucketDescriptor {
                name: bucket.to_string(),
                project: Some(project.to_string()),
                location: Some("US".to_string()),
                self_link: None,
            })
        });
    store
        .expect_upload_object()
        .times(1)
        .returning(|_, name, _| Ok(object(name)));
    store
        .expect_upsert_object_acl()
        .withf(|_, _, entity, role| entity == "allUsers" && role == "READER")
        .times(1)
        .returning(|_, _, entity, role| Ok(acl_entry(entity, role)));

    write_once(&config, &store).await.unwrap();
}

#[tokio::test]
async fn write_once_reports_upload_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = backup_config(&dir);

    let mut store = MockRemoteStore::new();
    store.expect_bucket_exists().returning(|_| Ok(true));
    store.expect_upload_object().returning(|_, _, _| {
        Err(StoreError::Service {
            status: 503,
            message: "backend unavailable".to_string(),
        })
    });
    store
        .expect_upsert_object_acl()
        .returning(|_, object, _, _| {
            Err(StoreError::NotFound {
                resource: object.to_string(),
            })
        });

    let err = write_once(&config, &store).await.unwrap_err();
    assert!(err.to_string().contains("upload failed"));
}

#[tokio::test]
async fn write_once_tolerates_grant_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = backup_config(&dir);

    let mut store = MockRemoteStore::new();
    store.expect_bucket_exists().returning(|_| Ok(true));
    store
        .expect_upload_object()
        .returning(|_, name, _| Ok(object(name)));
    store.expect_upsert_object_acl().returning(|_, _, _, _| {
        Err(StoreError::Service {
            status: 403,
            message: "Forbidden".to_string(),
        })
    });

    write_once(&config, &store).await.unwrap();
}

#[tokio::test]
async fn list_buckets_returns_names() {
    let target = StoreTarget::new("keen-project", "redis_master_bckp", "master-data");
    let mut store = MockRemoteStore::new();
    store
        .expect_list_buckets()
        .withf(|project| project == "keen-project")
        .returning(|_| {
            Ok(["alpha", "redis_master_bckp"]
                .iter()
                .map(|name| BucketDescriptor {
                    name: name.to_string(),
                    project: None,
                    location: None,
                    self_link: None,
                })
                .collect())
        });

    let names = list_buckets(&target, &store).await.unwrap();
    assert_eq!(names, vec!["alpha", "redis_master_bckp"]);
}

#[tokio::test]
async fn describe_distinguishes_missing_bucket_from_empty_one() {
    let target = StoreTarget::new("keen-project", "redis_master_bckp", "master-data");

    let mut missing = MockRemoteStore::new();
    missing.expect_list_objects().returning(|bucket| {
        Err(StoreError::NotFound {
            resource: bucket.to_string(),
        })
    });
    assert_eq!(describe_bucket(&target, &missing).await.unwrap(), None);

    let mut empty = MockRemoteStore::new();
    empty.expect_list_objects().returning(|_| Ok(Vec::new()));
    assert_eq!(
        describe_bucket(&target, &empty).await.unwrap(),
        Some(Vec::new())
    );

    let mut forbidden = MockRemoteStore::new();
    forbidden.expect_list_objects().returning(|_| {
        Err(StoreError::Service {
            status: 403,
            message: "Forbidden".to_string(),
        })
    });
    assert!(describe_bucket(&target, &forbidden).await.is_err());
}

#[tokio::test]
async fn read_object_downloads_to_output() {
    let target = StoreTarget::new("keen-project", "redis_master_bckp", "master-data");
    let mut store = MockRemoteStore::new();
    store
        .expect_get_object()
        .withf(|bucket, object| bucket == "redis_master_bckp" && object == "master-data")
        .returning(|_, name| Ok(object(name)));
    store
        .expect_download_object()
        .withf(|object: &ObjectDescriptor, destination: &Path| {
            object.name == "master-data" && destination == Path::new("text.read")
        })
        .times(1)
        .returning(|_, _| Ok(9));

    let bytes = read_object(&target, &store, Path::new("text.read"))
        .await
        .unwrap();
    assert_eq!(bytes, 9);
}

#[tokio::test(start_paused = true)]
async fn daemon_restores_previous_backup_before_first_upload() {
    let dir = tempfile::tempdir().unwrap();
    let config = backup_config(&dir);
    let expected_destination = config.restore_path.clone();
    let cancel = CancellationToken::new();

    let mut store = MockRemoteStore::new();
    store.expect_bucket_exists().returning(|_| Ok(true));
    store
        .expect_get_object()
        .times(1)
        .returning(|_, name| Ok(object(name)));
    store
        .expect_get_object_acl()
        .withf(|_, _, entity| entity == "allUsers")
        .returning(|_, _, entity| Ok(acl_entry(entity, "READER")));

    let restored = Arc::new(AtomicBool::new(false));
    let restored_flag = restored.clone();
    store
        .expect_download_object()
        .withf(move |object: &ObjectDescriptor, destination: &Path| {
            object.name == "master-data" && destination == expected_destination.as_path()
        })
        .times(1)
        .returning(move |_, _| {
            restored_flag.store(true, Ordering::SeqCst);
            Ok(9)
        });

    let seen_restore = restored.clone();
    store
        .expect_upload_object()
        .times(1)
        .returning(move |_, name, _| {
            assert!(
                seen_restore.load(Ordering::SeqCst),
                "restore must finish before the first upload"
            );
            Ok(object(name))
        });
    let stop = cancel.clone();
    store
        .expect_upsert_object_acl()
        .times(1)
        .returning(move |_, _, entity, role| {
            stop.cancel();
            Ok(acl_entry(entity, role))
        });

    let cycles = run_daemon(&config, &store, cancel).await.unwrap();
    assert_eq!(cycles, 1);
    assert!(restored.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn failed_restore_does_not_stop_the_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let config = backup_config(&dir);
    let cancel = CancellationToken::new();

    let mut store = MockRemoteStore::new();
    store.expect_bucket_exists().returning(|_| Ok(true));
    store.expect_get_object().returning(|_, name| Ok(object(name)));
    store.expect_get_object_acl().returning(|_, object, entity| {
        Err(StoreError::NotFound {
            resource: format!("{object}/acl/{entity}"),
        })
    });
    store
        .expect_download_object()
        .times(1)
        .returning(|_, _| Err(StoreError::Transport("connection reset".to_string())));
    store
        .expect_upload_object()
        .times(1)
        .returning(|_, name, _| Ok(object(name)));
    let stop = cancel.clone();
    store
        .expect_upsert_object_acl()
        .returning(move |_, _, entity, role| {
            stop.cancel();
            Ok(acl_entry(entity, role))
        });

    assert_eq!(run_daemon(&config, &store, cancel).await.unwrap(), 1);
}

#[tokio::test]
async fn restore_skips_download_when_no_backup_exists() {
    let dir = tempfile::tempdir().unwrap();
    let config = backup_config(&dir);

    let mut store = MockRemoteStore::new();
    store.expect_get_object().returning(|_, name| {
        Err(StoreError::NotFound {
            resource: name.to_string(),
        })
    });
    store.expect_get_object_acl().never();
    store.expect_download_object().never();

    assert_eq!(restore_latest(&config, &store).await, None);
}

#[tokio::test]
async fn object_grant_reports_configured_entity() {
    let target = StoreTarget::new("keen-project", "redis_master_bckp", "master-data");

    let mut granted = MockRemoteStore::new();
    granted
        .expect_get_object_acl()
        .withf(|bucket, object, entity| {
            bucket == "redis_master_bckp" && object == "master-data" && entity == "allUsers"
        })
        .returning(|_, _, entity| Ok(acl_entry(entity, "READER")));
    let grant = object_grant(&target, &granted).await.expect("grant");
    assert_eq!(grant.entity, "allUsers");
    assert_eq!(grant.role, "READER");

    let mut forbidden = MockRemoteStore::new();
    forbidden.expect_get_object_acl().returning(|_, _, _| {
        Err(StoreError::Service {
            status: 403,
            message: "Forbidden".to_string(),
        })
    });
    assert_eq!(object_grant(&target, &forbidden).await, None);
}
