//! Integration tests for the document store, the typed repositories and
//! the task authorizer.

mod support;

use mirror_sync::db::{Database, collections};
use mirror_sync::logging::Logger;
use mirror_sync::sync::TaskAuthorizer;
use mirror_sync::types::{Folder, List, Member, MirrorTask, Task, TeamCursor};
use support::setup_db;

fn task(id: &str, updated_at: i64) -> Task {
    Task {
        id: id.to_string(),
        name: format!("Task {id}"),
        team_id: "1".to_string(),
        list_id: "10".to_string(),
        updated_at,
        ..Default::default()
    }
}

mod document_tests {
    use super::*;

    #[test]
    fn upsert_overwrites_and_bumps_revision() {
        let db = setup_db();
        db.upsert_task(&task("a", 1)).unwrap();
        assert_eq!(db.document_revision(collections::TASKS, "a").unwrap(), Some(1));

        let mut changed = task("a", 2);
        changed.name = "Renamed".to_string();
        db.upsert_task(&changed).unwrap();

        assert_eq!(db.document_revision(collections::TASKS, "a").unwrap(), Some(2));
        assert_eq!(db.get_task("a").unwrap(), Some(changed));
    }

    #[test]
    fn insert_if_not_exists_keeps_first_record() {
        let db = setup_db();
        let list = List {
            id: "10".to_string(),
            name: "Backlog".to_string(),
            archived: false,
            folder_id: Some("5".to_string()),
        };
        assert!(db.insert_list_if_not_exists(&list).unwrap());

        let renamed = List {
            name: "Other".to_string(),
            ..list.clone()
        };
        assert!(!db.insert_list_if_not_exists(&renamed).unwrap());
        assert_eq!(db.get_list("10").unwrap(), Some(list));
    }

    #[test]
    fn delete_reports_presence() {
        let db = setup_db();
        db.upsert_task(&task("a", 1)).unwrap();
        assert!(db.delete_task("a").unwrap());
        assert!(!db.delete_task("a").unwrap());
        assert_eq!(db.get_task("a").unwrap(), None);
    }

    #[test]
    fn collections_are_isolated() {
        let db = setup_db();
        db.upsert_task(&task("x", 1)).unwrap();
        db.upsert_folder(&Folder {
            id: "x".to_string(),
            name: "Folder".to_string(),
            archived: false,
        })
        .unwrap();

        assert_eq!(db.get_task("x").unwrap().unwrap().name, "Task x");
        assert_eq!(db.get_folder("x").unwrap().unwrap().name, "Folder");
        assert_eq!(db.get_list("x").unwrap(), None);
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mirror-sync.db");

        let db = Database::open(&path).unwrap();
        db.upsert_task(&task("a", 1)).unwrap();
        drop(db);

        let reopened = Database::open(&path).unwrap();
        assert!(reopened.get_task("a").unwrap().is_some());
    }
}

mod repository_tests {
    use super::*;

    #[test]
    fn subtasks_and_team_tasks() {
        let db = setup_db();
        db.upsert_task(&task("parent", 1)).unwrap();
        for id in ["c2", "c1"] {
            db.upsert_task(&Task {
                parent_task_id: Some("parent".to_string()),
                ..task(id, 1)
            })
            .unwrap();
        }
        db.upsert_task(&Task {
            team_id: "2".to_string(),
            ..task("elsewhere", 1)
        })
        .unwrap();

        let ids: Vec<String> = db
            .subtasks_of("parent")
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(db.all_team_tasks("1").unwrap().len(), 3);
        assert_eq!(db.all_team_tasks("2").unwrap().len(), 1);
    }

    #[test]
    fn members_are_found_by_email_ignoring_case() {
        let db = setup_db();
        db.upsert_member(&Member {
            id: "77".to_string(),
            username: "ann".to_string(),
            email: "Ann@Example.COM".to_string(),
            initials: "A".to_string(),
        })
        .unwrap();

        let found = db.members_by_email(" ann@example.com ").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "ann@example.com");
        assert!(db.members_by_email("bob@example.com").unwrap().is_empty());
    }

    #[test]
    fn relations_by_either_side() {
        let db = setup_db();
        db.upsert_mirror_task(&MirrorTask::new("s1", "m1")).unwrap();
        db.upsert_mirror_task(&MirrorTask::new("s1", "m2")).unwrap();
        db.upsert_mirror_task(&MirrorTask::new("s2", "m1")).unwrap();

        assert_eq!(db.mirror_tasks_by_source("s1").unwrap().len(), 2);
        assert_eq!(db.mirror_tasks_by_mirror("m1").unwrap().len(), 2);
        assert!(db.mirror_tasks_by_mirror("s1").unwrap().is_empty());
        assert!(db.get_mirror_task("src:s2:dst:m1").unwrap().is_some());
    }

    #[test]
    fn cursor_round_trip() {
        let db = setup_db();
        assert_eq!(db.get_team_cursor("1").unwrap(), None);
        let cursor = TeamCursor {
            team_id: "1".to_string(),
            last_task_updated_at: 1_700_000_000_000,
        };
        db.upsert_team_cursor(&cursor).unwrap();
        assert_eq!(db.get_team_cursor("1").unwrap(), Some(cursor));
        assert_eq!(db.get_team_cursor("2").unwrap(), None);
    }
}

mod authorizer_tests {
    use super::*;

    #[test]
    fn first_sighting_is_stored_as_changed() {
        let db = setup_db();
        let auth = TaskAuthorizer::new(db.clone(), &Logger::new());

        let result = auth.authorize(&task("a", 100)).unwrap();

        assert!(result.changed);
        assert!(result.baseline.is_none());
        assert_eq!(db.get_task("a").unwrap(), Some(task("a", 100)));
    }

    #[test]
    fn equal_update_time_is_not_written() {
        let db = setup_db();
        let auth = TaskAuthorizer::new(db.clone(), &Logger::new());
        auth.authorize(&task("a", 100)).unwrap();

        let mut same_time = task("a", 100);
        same_time.name = "Different but same time".to_string();
        let result = auth.authorize(&same_time).unwrap();

        assert!(!result.changed);
        assert_eq!(result.baseline, Some(task("a", 100)));
        assert_eq!(db.document_revision(collections::TASKS, "a").unwrap(), Some(1));
        assert_eq!(db.get_task("a").unwrap().unwrap().name, "Task a");
    }

    #[test]
    fn newer_snapshot_replaces_baseline() {
        let db = setup_db();
        let auth = TaskAuthorizer::new(db.clone(), &Logger::new());
        auth.authorize(&task("a", 100)).unwrap();

        let result = auth.authorize(&task("a", 101)).unwrap();

        assert!(result.changed);
        assert_eq!(result.baseline.unwrap().updated_at, 100);
        assert_eq!(db.get_task("a").unwrap().unwrap().updated_at, 101);
    }

    #[test]
    fn millisecond_difference_counts_as_change() {
        let db = setup_db();
        let auth = TaskAuthorizer::new(db, &Logger::new());
        auth.authorize(&task("a", 1_700_000_000_000)).unwrap();

        assert!(auth.authorize(&task("a", 1_700_000_000_001)).unwrap().changed);
    }

    #[test]
    fn uncommitted_change_restores_baseline() {
        let db = setup_db();
        let auth = TaskAuthorizer::new(db.clone(), &Logger::new());
        auth.authorize(&task("a", 100)).unwrap();

        let result = auth.authorize(&task("a", 101)).unwrap();
        drop(auth.pending("a", &result));

        assert_eq!(db.get_task("a").unwrap(), Some(task("a", 100)));
        assert!(auth.authorize(&task("a", 101)).unwrap().changed);
    }

    #[test]
    fn uncommitted_first_sighting_is_forgotten() {
        let db = setup_db();
        let auth = TaskAuthorizer::new(db.clone(), &Logger::new());

        let result = auth.authorize(&task("a", 100)).unwrap();
        drop(auth.pending("a", &result));

        assert_eq!(db.get_task("a").unwrap(), None);
    }

    #[test]
    fn committed_change_is_kept() {
        let db = setup_db();
        let auth = TaskAuthorizer::new(db.clone(), &Logger::new());
        auth.authorize(&task("a", 100)).unwrap();

        let result = auth.authorize(&task("a", 101)).unwrap();
        auth.pending("a", &result).commit();

        assert_eq!(db.get_task("a").unwrap().unwrap().updated_at, 101);
    }
}
