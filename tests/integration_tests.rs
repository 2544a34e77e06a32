//! Integration tests for the newsboard CLI.
//!
//! Every board test runs against an in-memory seed file so no backend is
//! needed.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const SEED: &str = r#"{
  "candidates": [
    { "id": "c1", "title": "Storm hits coast", "position": 1 },
    { "id": "c2", "title": "Markets rally", "position": 2 },
    { "id": "c9", "title": "Old story", "position": 3 }
  ],
  "production": [
    {
      "id": "p1",
      "title": "Storm follow-up",
      "column": "review",
      "origin_id": "c9",
      "user_id": "u1",
      "email": "u1@example.com",
      "keywords": []
    },
    {
      "id": "p2",
      "title": "Someone else's draft",
      "column": "rewrite",
      "user_id": "u2",
      "keywords": []
    }
  ]
}"#;

/// A newsboard command isolated from the caller's environment.
fn newsboard(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("newsboard");
    cmd.current_dir(dir.path())
        .env_remove("NEWSBOARD_USER_ID")
        .env_remove("NEWSBOARD_USER_EMAIL")
        .env_remove("NEWSBOARD_BACKEND_URL")
        .env_remove("NEWSBOARD_API_KEY")
        .env_remove("NEWSBOARD_ACCESS_TOKEN")
        .env_remove("NEWSBOARD_PROMOTION_WEBHOOK")
        .env_remove("NEWSBOARD_REVIEW_WEBHOOK")
        .env_remove("RUST_LOG");
    cmd
}

fn project_with_seed() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("seed.json"), SEED).unwrap();
    dir
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        let dir = TempDir::new().unwrap();
        newsboard(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("move"));
    }

    #[test]
    fn test_version() {
        let dir = TempDir::new().unwrap();
        newsboard(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        let dir = TempDir::new().unwrap();
        newsboard(&dir).arg("frobnicate").assert().failure();
    }
}

// =============================================================================
// Config Tests
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();

        newsboard(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created newsboard.toml"));

        let path = dir.path().join(".newsboard/newsboard.toml");
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("[server]"));
        assert!(content.contains("port = 3180"));
    }

    #[test]
    fn test_config_init_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".newsboard/newsboard.toml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[server]\nport = 9000\n").unwrap();

        newsboard(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
        assert!(fs::read_to_string(&path).unwrap().contains("9000"));

        newsboard(&dir)
            .args(["config", "init", "--force"])
            .assert()
            .success();
        assert!(fs::read_to_string(&path).unwrap().contains("3180"));
    }

    #[test]
    fn test_config_show_masks_secrets_and_applies_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".newsboard/newsboard.toml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "[backend]\nurl = \"https://db.example.com\"\napi_key = \"supersecretkey\"\n",
        )
        .unwrap();

        newsboard(&dir)
            .args(["config", "show"])
            .env("NEWSBOARD_USER_ID", "editor-7")
            .assert()
            .success()
            .stdout(predicate::str::contains("https://db.example.com"))
            .stdout(predicate::str::contains("supe…"))
            .stdout(predicate::str::contains("supersecretkey").not())
            .stdout(predicate::str::contains("\"editor-7\""));
    }

    #[test]
    fn test_config_show_without_file_reports_warnings() {
        let dir = TempDir::new().unwrap();

        newsboard(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No newsboard.toml found"))
            .stdout(predicate::str::contains("backend.url is not set"));
    }

    #[test]
    fn test_custom_config_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("elsewhere.toml");
        fs::write(&path, "[server]\nport = 4242\n").unwrap();

        newsboard(&dir)
            .args(["--config", "elsewhere.toml", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 4242"));
    }

    #[test]
    fn test_malformed_config_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".newsboard/newsboard.toml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[server\nport = ").unwrap();

        newsboard(&dir)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse newsboard.toml"));
    }
}

// =============================================================================
// Board Tests
// =============================================================================

mod board {
    use super::*;

    #[test]
    fn test_board_anonymous_shows_candidates_only() {
        let dir = project_with_seed();

        newsboard(&dir)
            .args(["board", "--seed", "seed.json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Not signed in"))
            .stdout(predicate::str::contains("Storm hits coast"))
            .stdout(predicate::str::contains("Storm follow-up").not());
    }

    #[test]
    fn test_board_signed_in_hides_promoted_candidates() {
        let dir = project_with_seed();

        newsboard(&dir)
            .args(["--user", "u1", "board", "--seed", "seed.json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Storm follow-up"))
            .stdout(predicate::str::contains("Old story").not())
            .stdout(predicate::str::contains("Someone else's draft").not());
    }

    #[test]
    fn test_board_single_column() {
        let dir = project_with_seed();

        newsboard(&dir)
            .args(["--user", "u1", "board", "--column", "review", "--seed", "seed.json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Review"))
            .stdout(predicate::str::contains("Storm follow-up"))
            .stdout(predicate::str::contains("Markets rally").not());
    }

    #[test]
    fn test_board_invalid_column_fails() {
        let dir = project_with_seed();

        newsboard(&dir)
            .args(["board", "--column", "archive", "--seed", "seed.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid column 'archive'"));
    }

    #[test]
    fn test_board_missing_seed_fails() {
        let dir = TempDir::new().unwrap();

        newsboard(&dir)
            .args(["board", "--seed", "nope.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read seed file"));
    }

    #[test]
    fn test_board_without_backend_fails() {
        let dir = TempDir::new().unwrap();

        newsboard(&dir).arg("board").assert().failure();
    }
}

// =============================================================================
// Move Tests
// =============================================================================

mod moves {
    use super::*;

    #[test]
    fn test_move_requires_user() {
        let dir = project_with_seed();

        newsboard(&dir)
            .args(["move", "c1", "review", "--seed", "seed.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not authenticated"));
    }

    #[test]
    fn test_move_candidate() {
        let dir = project_with_seed();

        newsboard(&dir)
            .env("NEWSBOARD_USER_ID", "u1")
            .args(["move", "c1", "review", "--seed", "seed.json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Moved c1: trend → review"));
    }

    #[test]
    fn test_move_to_same_column_is_noop() {
        let dir = project_with_seed();

        newsboard(&dir)
            .args(["--user", "u1", "move", "c1", "trend", "--seed", "seed.json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("nothing to do"));
    }

    #[test]
    fn test_promote_candidate_without_webhook_warns() {
        let dir = project_with_seed();

        newsboard(&dir)
            .args(["--user", "u1", "move", "c2", "rewrite", "--seed", "seed.json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Item added to your production queue"))
            .stdout(predicate::str::contains("Failed to send to rewrite service"))
            .stdout(predicate::str::contains("Promoted c2"));
    }

    #[test]
    fn test_promote_already_promoted_candidate_fails() {
        let dir = project_with_seed();

        // p1 was promoted from c9.
        newsboard(&dir)
            .args(["--user", "u1", "move", "c9", "rewrite", "--seed", "seed.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already in the production queue"));
    }

    #[test]
    fn test_reprove_with_yes_deletes() {
        let dir = project_with_seed();

        newsboard(&dir)
            .args(["--user", "u1", "move", "p1", "reprove", "--yes", "--seed", "seed.json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Card deleted successfully"))
            .stdout(predicate::str::contains("Reproved and deleted p1"));
    }

    #[test]
    fn test_move_unknown_card_fails() {
        let dir = project_with_seed();

        newsboard(&dir)
            .args(["--user", "u1", "move", "zzz", "review", "--seed", "seed.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No card with id zzz"));
    }

    #[test]
    fn test_move_invalid_column_fails() {
        let dir = project_with_seed();

        newsboard(&dir)
            .args(["--user", "u1", "move", "c1", "archive", "--seed", "seed.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid column 'archive'"));
    }
}
