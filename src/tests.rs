use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clap::Parser;
use serde_json::{Value, json};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use crate::cli::*;
use crate::config::*;
use crate::delegate::anthropic::{AnthropicConfig, AnthropicDelegate};
use crate::delegate::*;
use crate::error::*;
use crate::orchestrator::*;
use crate::task::*;
use crate::telemetry::*;
use crate::theme::*;
use crate::tools::find::bulk::{BulkListing, BulkOutcome};
use crate::tools::find::manual::{LevelEntry, ManualWalk, read_level};
use crate::tools::find::order::{compare_components, subtree_precedes};
use crate::tools::find::pattern::NamePattern;
use crate::tools::find::{
    EnumerationError, EnumerationRequest, EnumerationResult, Enumerator, EnumeratorConfig,
    ServedBy, decode_page_token, encode_page_token,
};
use crate::tools::*;

fn base_cfg() -> RuntimeConfig {
    RuntimeConfig {
        profile: "default".to_string(),
        config_path: ".fsagent/config.toml".to_string(),
        model: "claude-3-7-sonnet-20250219".to_string(),
        api_base_url: "https://api.anthropic.com".to_string(),
        max_tokens: 4096,
        request_timeout_secs: 120,
        max_steps: 15,
        page_size: 100,
        max_depth: None,
        enumeration_strategy: EnumerationStrategy::Auto,
        bulk_output_ceiling_bytes: 8 * 1024 * 1024,
        find_program: "find".to_string(),
        max_read_bytes: 1024 * 1024,
        summary_result_chars: 500,
        telemetry_enabled: false,
        telemetry_path: ".fsagent/test-telemetry.jsonl".to_string(),
    }
}

fn test_cli(config_path: &str, profile: &str) -> Cli {
    Cli::try_parse_from([
        "fsagent",
        "--config-path",
        config_path,
        "--profile",
        profile,
        "--log-filter",
        "warn",
        "doctor",
    ])
    .expect("test cli should parse")
}

/// root/
///   a.txt b.txt c.log
///   docs/ guide.txt notes.md deep/x.txt
///   src/ main.txt
fn enumeration_fixture() -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().expect("temp directory should create");
    let root = resolve_working_directory(dir.path()).expect("root should resolve");
    for file in ["a.txt", "b.txt", "c.log"] {
        std::fs::write(root.join(file), file).expect("file should write");
    }
    std::fs::create_dir_all(root.join("docs/deep")).expect("docs should create");
    std::fs::create_dir_all(root.join("src")).expect("src should create");
    std::fs::write(root.join("docs/guide.txt"), "guide").expect("file should write");
    std::fs::write(root.join("docs/notes.md"), "notes").expect("file should write");
    std::fs::write(root.join("docs/deep/x.txt"), "x").expect("file should write");
    std::fs::write(root.join("src/main.txt"), "main").expect("file should write");
    (dir, root)
}

fn expected_recursive_txt(root: &Path) -> Vec<PathBuf> {
    vec![
        root.join("a.txt"),
        root.join("b.txt"),
        root.join("docs/guide.txt"),
        root.join("docs/deep/x.txt"),
        root.join("src/main.txt"),
    ]
}

fn enumerator(strategy: EnumerationStrategy) -> Enumerator {
    Enumerator::new(EnumeratorConfig {
        strategy,
        ..EnumeratorConfig::default()
    })
}

fn txt_request(root: &Path, page_size: usize) -> EnumerationRequest {
    EnumerationRequest {
        recursive: true,
        page_size,
        ..EnumerationRequest::new("*.txt", root)
    }
}

async fn collect_pages(
    enumerator: &Enumerator,
    mut request: EnumerationRequest,
) -> (Vec<PathBuf>, Vec<EnumerationResult>) {
    let cancel = CancellationToken::new();
    let mut all = Vec::new();
    let mut pages = Vec::new();
    for _ in 0..50 {
        let page = enumerator
            .enumerate(&request, &cancel)
            .await
            .expect("enumeration should succeed");
        all.extend(page.paths.iter().cloned());
        let next = page.next_page_token.clone();
        pages.push(page);
        match next {
            Some(token) => request.page_token = Some(token),
            None => return (all, pages),
        }
    }
    panic!("pagination did not terminate");
}

// ---------------------------------------------------------------------------
// Name patterns, ordering and tokens
// ---------------------------------------------------------------------------

#[test]
fn name_pattern_treats_only_star_and_question_mark_as_wildcards() {
    let txt = NamePattern::new("*.txt").expect("pattern should compile");
    assert!(txt.matches("a.txt".as_ref()));
    assert!(txt.matches(".hidden.txt".as_ref()));
    assert!(!txt.matches("a.txt.bak".as_ref()));
    assert!(!txt.matches("atxt".as_ref()));

    let single = NamePattern::new("a?c").expect("pattern should compile");
    assert!(single.matches("abc".as_ref()));
    assert!(!single.matches("ac".as_ref()));
    assert!(!single.matches("abbc".as_ref()));

    let literal = NamePattern::new("[x](1).md").expect("pattern should compile");
    assert!(literal.matches("[x](1).md".as_ref()));
    assert!(!literal.matches("x1.md".as_ref()));
    assert_eq!(literal.find_name_filter(), None);
    assert_eq!(single.find_name_filter(), None);
    assert_eq!(txt.find_name_filter(), Some("*.txt"));
}

#[test]
fn canonical_order_puts_level_entries_before_subdirectory_contents() {
    assert!(compare_components(&["z.txt"], &["a", "b.txt"]).is_lt());
    assert!(compare_components(&["a", "b.txt"], &["a", "c", "d.txt"]).is_lt());
    assert!(compare_components(&["docs"], &["docs", "x.txt"]).is_lt());
    assert!(compare_components(&["a", "z"], &["b", "a"]).is_lt());
    assert!(compare_components(&["b.txt"], &["b.txt"]).is_eq());

    assert!(subtree_precedes(&["a"], &["b", "c.txt"]));
    assert!(!subtree_precedes(&["a"], &["b.txt"]));
    assert!(!subtree_precedes(&["docs"], &["docs", "x.txt"]));
    assert!(!subtree_precedes(&["src"], &["docs", "x.txt"]));
}

#[test]
fn page_tokens_round_trip_and_reject_garbage() {
    let path = PathBuf::from("/tmp/some dir/ü-notes.txt");
    let token = encode_page_token(&path);
    assert!(
        token
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
    );
    assert_eq!(decode_page_token(&token), Some(path));

    assert_eq!(decode_page_token(""), None);
    assert_eq!(decode_page_token("not-a-token"), None);
    assert_eq!(decode_page_token("p1.!!!"), None);
    assert_eq!(decode_page_token(&encode_page_token(Path::new("relative/x"))), None);
}

// ---------------------------------------------------------------------------
// Enumerator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_page_returns_one_match_with_token_and_second_page_finishes() {
    let dir = tempdir().expect("temp directory should create");
    let root = resolve_working_directory(dir.path()).expect("root should resolve");
    for file in ["a.txt", "b.txt", "c.log"] {
        std::fs::write(root.join(file), "x").expect("file should write");
    }

    for strategy in [EnumerationStrategy::Manual, EnumerationStrategy::Bulk] {
        let enumerator = enumerator(strategy);
        let cancel = CancellationToken::new();
        let mut request = EnumerationRequest {
            page_size: 1,
            ..EnumerationRequest::new("*.txt", &root)
        };

        let first = enumerator
            .enumerate(&request, &cancel)
            .await
            .expect("first page should succeed");
        assert_eq!(first.paths, vec![root.join("a.txt")]);
        assert_eq!(first.total_matched, 2);
        assert!(first.next_page_token.is_some());

        request.page_token = first.next_page_token;
        let second = enumerator
            .enumerate(&request, &cancel)
            .await
            .expect("second page should succeed");
        assert_eq!(second.paths, vec![root.join("b.txt")]);
        assert_eq!(second.next_page_token, None);
    }
}

#[tokio::test]
async fn pagination_covers_every_match_once_for_all_page_sizes() {
    let (_dir, root) = enumeration_fixture();
    let expected = expected_recursive_txt(&root);

    for strategy in [EnumerationStrategy::Manual, EnumerationStrategy::Bulk] {
        let enumerator = enumerator(strategy);
        for page_size in 1..=6 {
            let (all, pages) = collect_pages(&enumerator, txt_request(&root, page_size)).await;
            assert_eq!(all, expected, "strategy={strategy:?} page_size={page_size}");

            let unique = all.iter().collect::<HashSet<_>>();
            assert_eq!(unique.len(), all.len());

            for page in &pages {
                assert!(page.paths.len() <= page_size);
                assert!(page.total_matched >= page.paths.len());
                assert_eq!(
                    page.next_page_token.is_some(),
                    page.total_matched > page.paths.len()
                );
            }
            if page_size >= expected.len() {
                assert_eq!(pages.len(), 1);
                assert_eq!(pages[0].next_page_token, None);
            }
        }
    }
}

#[tokio::test]
async fn tokens_resume_across_strategies() {
    let (_dir, root) = enumeration_fixture();
    let cancel = CancellationToken::new();
    let bulk = enumerator(EnumerationStrategy::Bulk);
    let manual = enumerator(EnumerationStrategy::Manual);

    let mut request = txt_request(&root, 2);
    let first = bulk.enumerate(&request, &cancel).await.expect("bulk page");
    assert_eq!(first.strategy, ServedBy::Bulk);
    assert_eq!(first.paths, expected_recursive_txt(&root)[..2].to_vec());

    request.page_token = first.next_page_token;
    let second = manual.enumerate(&request, &cancel).await.expect("manual page");
    assert_eq!(second.strategy, ServedBy::Manual);
    assert_eq!(second.paths, expected_recursive_txt(&root)[2..4].to_vec());

    request.page_token = second.next_page_token;
    let third = bulk.enumerate(&request, &cancel).await.expect("bulk page");
    assert_eq!(third.paths, vec![root.join("src/main.txt")]);
    assert_eq!(third.next_page_token, None);
}

#[tokio::test]
async fn overflow_falls_back_to_manual_with_identical_pages() {
    let (_dir, root) = enumeration_fixture();
    let cancel = CancellationToken::new();
    let tiny = Enumerator::new(EnumeratorConfig {
        strategy: EnumerationStrategy::Auto,
        bulk_output_ceiling_bytes: 8,
        ..EnumeratorConfig::default()
    });
    let roomy = enumerator(EnumerationStrategy::Bulk);

    let request = txt_request(&root, 3);
    let fallback = tiny.enumerate(&request, &cancel).await.expect("fallback page");
    let direct = roomy.enumerate(&request, &cancel).await.expect("bulk page");

    assert_eq!(fallback.strategy, ServedBy::Manual);
    assert_eq!(fallback.paths, direct.paths);
    assert_eq!(fallback.next_page_token, direct.next_page_token);
}

#[tokio::test]
async fn forced_bulk_reports_typed_overflow() {
    let (_dir, root) = enumeration_fixture();
    let listing = BulkListing {
        program: "find",
        root: &root,
        max_depth: None,
        name_filter: None,
        ceiling_bytes: 4,
    };
    let outcome = listing
        .run(&CancellationToken::new())
        .await
        .expect("bulk listing should run");
    assert!(matches!(outcome, BulkOutcome::Overflow { ceiling: 4 }));

    let strict = Enumerator::new(EnumeratorConfig {
        strategy: EnumerationStrategy::Bulk,
        bulk_output_ceiling_bytes: 4,
        ..EnumeratorConfig::default()
    });
    let err = strict
        .enumerate(&txt_request(&root, 10), &CancellationToken::new())
        .await
        .expect_err("bulk-only enumeration should overflow");
    assert!(matches!(err, EnumerationError::Overflow { ceiling: 4 }));
}

#[tokio::test]
async fn missing_bulk_program_falls_back_to_manual() {
    let (_dir, root) = enumeration_fixture();
    let enumerator = Enumerator::new(EnumeratorConfig {
        strategy: EnumerationStrategy::Auto,
        find_program: "fsagent-no-such-find-binary".to_string(),
        ..EnumeratorConfig::default()
    });
    let page = enumerator
        .enumerate(&txt_request(&root, 100), &CancellationToken::new())
        .await
        .expect("manual fallback should succeed");
    assert_eq!(page.strategy, ServedBy::Manual);
    assert_eq!(page.paths, expected_recursive_txt(&root));
}

#[tokio::test]
async fn depth_limits_apply_to_both_strategies() {
    let (_dir, root) = enumeration_fixture();
    let cancel = CancellationToken::new();

    for strategy in [EnumerationStrategy::Manual, EnumerationStrategy::Bulk] {
        let enumerator = enumerator(strategy);
        let flat = enumerator
            .enumerate(&EnumerationRequest::new("*.txt", &root), &cancel)
            .await
            .expect("flat listing should succeed");
        assert_eq!(flat.paths, vec![root.join("a.txt"), root.join("b.txt")]);

        let two_levels = EnumerationRequest {
            max_depth: Some(2),
            ..txt_request(&root, 100)
        };
        let bounded = enumerator
            .enumerate(&two_levels, &cancel)
            .await
            .expect("bounded listing should succeed");
        assert_eq!(
            bounded.paths,
            vec![
                root.join("a.txt"),
                root.join("b.txt"),
                root.join("docs/guide.txt"),
                root.join("src/main.txt"),
            ]
        );
    }
}

#[tokio::test]
async fn corrupt_token_restarts_from_the_beginning() {
    let (_dir, root) = enumeration_fixture();
    let request = EnumerationRequest {
        page_token: Some("definitely-not-a-token".to_string()),
        ..txt_request(&root, 100)
    };
    let page = enumerator(EnumerationStrategy::Manual)
        .enumerate(&request, &CancellationToken::new())
        .await
        .expect("enumeration should succeed");
    assert_eq!(page.paths, expected_recursive_txt(&root));
    assert!(!page.warnings.is_empty());
}

#[tokio::test]
async fn missing_root_is_a_directory_access_error() {
    let dir = tempdir().expect("temp directory should create");
    let missing = dir.path().join("nope");
    for strategy in [EnumerationStrategy::Auto, EnumerationStrategy::Manual] {
        let err = enumerator(strategy)
            .enumerate(&EnumerationRequest::new("*", &missing), &CancellationToken::new())
            .await
            .expect_err("missing root should fail");
        assert!(matches!(err, EnumerationError::DirectoryAccess { .. }));
    }
}

#[tokio::test]
async fn symlinked_root_is_listed_by_every_strategy() {
    let (_dir, root) = enumeration_fixture();
    let links = tempdir().expect("temp directory should create");
    let link = resolve_working_directory(links.path())
        .expect("link parent should resolve")
        .join("link");
    std::os::unix::fs::symlink(&root, &link).expect("symlink should create");

    for strategy in [
        EnumerationStrategy::Auto,
        EnumerationStrategy::Bulk,
        EnumerationStrategy::Manual,
    ] {
        let page = enumerator(strategy)
            .enumerate(&txt_request(&link, 100), &CancellationToken::new())
            .await
            .expect("listing through a symlinked root should succeed");
        assert_eq!(
            page.paths,
            expected_recursive_txt(&link),
            "strategy={strategy:?}"
        );
        assert_eq!(page.total_matched, 5);
    }
}

#[tokio::test]
async fn single_character_wildcard_matches_multibyte_names_in_both_strategies() {
    let dir = tempdir().expect("temp directory should create");
    let root = resolve_working_directory(dir.path()).expect("root should resolve");
    for file in ["a.txt", "é.txt", "ab.txt"] {
        std::fs::write(root.join(file), "x").expect("file should write");
    }

    for strategy in [EnumerationStrategy::Manual, EnumerationStrategy::Bulk] {
        let page = enumerator(strategy)
            .enumerate(&EnumerationRequest::new("?.txt", &root), &CancellationToken::new())
            .await
            .expect("enumeration should succeed");
        assert_eq!(
            page.paths,
            vec![root.join("a.txt"), root.join("é.txt")],
            "strategy={strategy:?}"
        );
    }
}

fn read_level_denying_docs(directory: &Path) -> std::io::Result<Vec<LevelEntry>> {
    if directory.file_name().is_some_and(|name| name == "docs") {
        return Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "Permission denied",
        ));
    }
    read_level(directory)
}

#[test]
fn unreadable_subdirectory_is_skipped_with_a_warning() {
    let (_dir, root) = enumeration_fixture();
    let matcher = NamePattern::new("*.txt").expect("pattern should compile");
    let cancel = CancellationToken::new();

    let page = ManualWalk::new(&matcher, None, 100, &cancel)
        .with_level_reader(read_level_denying_docs)
        .run(&root, None)
        .expect("an unreadable subdirectory should not fail the walk");

    assert_eq!(
        page.paths,
        vec![root.join("a.txt"), root.join("b.txt"), root.join("src/main.txt")]
    );
    assert_eq!(page.total_matched, 3);
    assert_eq!(page.warnings.len(), 1);
    assert!(page.warnings[0].contains("docs"));
    assert!(page.warnings[0].contains("Permission denied"));
}

#[tokio::test]
async fn failing_bulk_program_falls_back_in_auto_and_errors_in_bulk() {
    let (_dir, root) = enumeration_fixture();
    let failing = |strategy| {
        Enumerator::new(EnumeratorConfig {
            strategy,
            find_program: "false".to_string(),
            ..EnumeratorConfig::default()
        })
    };

    let page = failing(EnumerationStrategy::Auto)
        .enumerate(&txt_request(&root, 100), &CancellationToken::new())
        .await
        .expect("auto should fall back to manual traversal");
    assert_eq!(page.strategy, ServedBy::Manual);
    assert_eq!(page.paths, expected_recursive_txt(&root));

    let err = failing(EnumerationStrategy::Bulk)
        .enumerate(&txt_request(&root, 100), &CancellationToken::new())
        .await
        .expect_err("bulk-only enumeration should surface the failure");
    assert!(matches!(err, EnumerationError::BulkUnavailable(_)));
}

#[tokio::test]
async fn cancelled_enumeration_returns_cancelled() {
    let (_dir, root) = enumeration_fixture();
    let cancel = CancellationToken::new();
    cancel.cancel();
    for strategy in [EnumerationStrategy::Manual, EnumerationStrategy::Bulk] {
        let err = enumerator(strategy)
            .enumerate(&txt_request(&root, 10), &cancel)
            .await
            .expect_err("cancelled enumeration should fail");
        assert!(matches!(err, EnumerationError::Cancelled));
    }
}

#[test]
fn enumeration_result_serializes_wire_fields() {
    let result = EnumerationResult {
        paths: vec![PathBuf::from("/data/a.txt")],
        next_page_token: Some(encode_page_token(Path::new("/data/a.txt"))),
        total_matched: 2,
        strategy: ServedBy::Manual,
        warnings: Vec::new(),
    };
    let value = serde_json::to_value(&result).expect("result should serialize");
    assert_eq!(value["paths"], json!(["/data/a.txt"]));
    assert_eq!(value["total_matched"], json!(2));
    assert_eq!(value["strategy"], json!("manual"));
    assert!(value["next_page_token"].is_string());
    assert!(value.get("warnings").is_none());
}

// ---------------------------------------------------------------------------
// Capability registry
// ---------------------------------------------------------------------------

#[test]
fn registry_describes_every_capability_with_a_schema() {
    let registry = CapabilityRegistry::default();
    let descriptors = registry.descriptors();
    let names = descriptors.iter().map(|d| d.name).collect::<Vec<&str>>();
    assert_eq!(names, vec!["find", "ls", "cat", "read", "grep", "cd"]);

    let find = &descriptors[0];
    assert_eq!(find.input_schema["type"], json!("object"));
    assert!(find.input_schema["properties"].get("pattern").is_some());
    assert!(find.input_schema["properties"].get("page_token").is_some());
    assert_eq!(find.input_schema["required"], json!(["pattern"]));
    assert!(find.input_schema.get("$schema").is_none());
}

#[test]
fn invocation_parse_rejects_unknown_names_and_missing_arguments() {
    let err = Invocation::parse("rm", &json!({})).expect_err("unknown capability should fail");
    assert_eq!(err.code(), "unknown_capability");

    let err = Invocation::parse("cat", &json!({})).expect_err("missing file should fail");
    assert_eq!(err.code(), "invalid_args");
    assert!(err.to_string().contains("file"));

    let parsed = Invocation::parse("ls", &Value::Null).expect("ls without args should parse");
    assert_eq!(parsed.capability(), Capability::Ls);
}

#[tokio::test]
async fn read_capability_applies_line_then_char_ranges() {
    let dir = tempdir().expect("temp directory should create");
    std::fs::write(dir.path().join("notes.txt"), "one\ntwo\nthree\nfour\n").expect("write");
    let registry = CapabilityRegistry::default();
    let cancel = CancellationToken::new();

    let lines = registry
        .invoke("read", &json!({"file": "notes.txt", "line_range": "2:3"}), dir.path(), &cancel)
        .await
        .expect("ranged read should succeed");
    assert_eq!(lines["content"], json!("two\nthree"));
    assert_eq!(lines["metadata"]["total_lines"], json!(4));

    let chars = registry
        .invoke(
            "read",
            &json!({"file": "notes.txt", "line_range": "2:3", "char_range": "0:3"}),
            dir.path(),
            &cancel,
        )
        .await
        .expect("char ranged read should succeed");
    assert_eq!(chars["content"], json!("two"));

    let single = registry
        .invoke(
            "read",
            &json!({"file": "notes.txt", "line_range": "2", "char_range": "1"}),
            dir.path(),
            &cancel,
        )
        .await
        .expect("single character read should succeed");
    assert_eq!(single["content"], json!("w"));

    let err = registry
        .invoke("read", &json!({"file": "notes.txt", "line_range": "x:y"}), dir.path(), &cancel)
        .await
        .expect_err("bad range should fail");
    assert_eq!(err.code(), "invalid_args");

    let err = registry
        .invoke("cat", &json!({"file": "absent.txt"}), dir.path(), &cancel)
        .await
        .expect_err("missing file should fail");
    assert_eq!(err.code(), "invalid_path");
}

#[tokio::test]
async fn grep_returns_matching_lines_or_an_empty_list() {
    let dir = tempdir().expect("temp directory should create");
    std::fs::write(
        dir.path().join("log.txt"),
        "Alpha start\nbeta\n  ALPHA end  \n",
    )
    .expect("write");
    let registry = CapabilityRegistry::default();
    let cancel = CancellationToken::new();

    let hits = registry
        .invoke(
            "grep",
            &json!({"pattern": "alpha", "file": "log.txt", "ignore_case": true}),
            dir.path(),
            &cancel,
        )
        .await
        .expect("grep should succeed");
    let hits = hits.as_array().expect("grep result should be a list");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["line_number"], json!(1));
    assert_eq!(hits[1]["line_number"], json!(3));
    assert_eq!(hits[1]["content"], json!("ALPHA end"));

    let none = registry
        .invoke("grep", &json!({"pattern": "gamma", "file": "log.txt"}), dir.path(), &cancel)
        .await
        .expect("grep without matches should succeed");
    assert_eq!(none, json!([]));
}

#[tokio::test]
async fn ls_hides_dotfiles_unless_requested_and_sorts_entries() {
    let dir = tempdir().expect("temp directory should create");
    std::fs::write(dir.path().join("b.txt"), "b").expect("write");
    std::fs::write(dir.path().join(".env"), "secret").expect("write");
    std::fs::create_dir(dir.path().join("a-dir")).expect("mkdir");
    let registry = CapabilityRegistry::default();
    let cancel = CancellationToken::new();

    let listing = registry
        .invoke("ls", &json!({}), dir.path(), &cancel)
        .await
        .expect("ls should succeed");
    let names = listing
        .as_array()
        .expect("ls result should be a list")
        .iter()
        .map(|entry| entry["name"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<String>>();
    assert_eq!(names, vec!["a-dir", "b.txt"]);
    assert_eq!(listing[0]["type"], json!("directory"));

    let long = registry
        .invoke("ls", &json!({"all": true, "long": true}), dir.path(), &cancel)
        .await
        .expect("ls -al should succeed");
    assert_eq!(long.as_array().map(Vec::len), Some(3));
    assert_eq!(long[2]["size"], json!(1));
    assert!(long[2]["modified"].is_string());
}

#[tokio::test]
async fn find_capability_uses_enumeration_defaults() {
    let (_dir, root) = enumeration_fixture();
    let registry = CapabilityRegistry::new(ToolSettings::default().with_enumeration(
        EnumerationTuning {
            page_size: 1,
            max_depth: None,
        },
    ));
    let page = registry
        .invoke("find", &json!({"pattern": "*.txt"}), &root, &CancellationToken::new())
        .await
        .expect("find should succeed");
    assert_eq!(page["paths"], json!([root.join("a.txt").to_string_lossy()]));
    assert!(page["next_page_token"].is_string());

    let err = registry
        .invoke(
            "find",
            &json!({"pattern": "*", "directory": "missing"}),
            &root,
            &CancellationToken::new(),
        )
        .await
        .expect_err("missing directory should fail");
    assert_eq!(err.code(), "directory_access");
}

// ---------------------------------------------------------------------------
// Task data model
// ---------------------------------------------------------------------------

#[test]
fn cursor_resolves_relative_and_absolute_targets() {
    assert_eq!(normalize_path(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    assert_eq!(normalize_path(Path::new("/..")), PathBuf::from("/"));

    let mut cursor = WorkingDirectoryCursor::new(PathBuf::from("/work/project"));
    assert_eq!(cursor.change_to("src"), Path::new("/work/project/src"));
    assert_eq!(cursor.change_to("../docs"), Path::new("/work/project/docs"));
    assert_eq!(cursor.change_to("/etc"), Path::new("/etc"));
}

#[test]
fn step_log_indices_are_contiguous_and_errors_are_counted() {
    let mut log = StepLog::default();
    log.record("ls", json!({}), StepOutcome::Success { result: json!([]) });
    log.record(
        "cat",
        json!({}),
        StepOutcome::Failure {
            code: "invalid_args".to_string(),
            error: "missing field `file`".to_string(),
        },
    );
    log.record("ls", json!({"path": "x"}), StepOutcome::Success { result: json!("y".repeat(50)) });

    let indices = log.steps().iter().map(|step| step.index).collect::<Vec<usize>>();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(log.error_count(), 1);

    let compact = log.render_compact(10);
    assert!(compact.contains("2. cat {} -> error [invalid_args]"));
    assert!(compact.contains("3. ls"));
    assert!(compact.contains("…"));
}

#[test]
fn task_result_omits_details_unless_present() {
    let result = TaskResult {
        success: true,
        working_directory: "/work".to_string(),
        steps: 0,
        errors: 0,
        summary: "Overview".to_string(),
        details: None,
    };
    let value = serde_json::to_value(&result).expect("result should serialize");
    assert!(value.get("details").is_none());
    assert_eq!(value["success"], json!(true));
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ScriptedTurn {
    text: String,
    calls: Vec<(String, Value)>,
    error: Option<DelegateError>,
    cancel_before_call: Option<usize>,
}

impl ScriptedTurn {
    fn reply(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    fn calling(text: &str, calls: Vec<(&str, Value)>) -> Self {
        Self {
            text: text.to_string(),
            calls: calls
                .into_iter()
                .map(|(name, args)| (name.to_string(), args))
                .collect(),
            ..Self::default()
        }
    }

    fn failing(error: DelegateError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
struct SeenRequest {
    prompt: String,
    had_host: bool,
    max_calls: usize,
}

#[derive(Default)]
struct ScriptedDelegate {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<SeenRequest>>,
    observed: Mutex<Vec<Result<Value, String>>>,
}

impl ScriptedDelegate {
    fn new(turns: Vec<ScriptedTurn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            ..Self::default()
        })
    }

    fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn observed(&self) -> Vec<Result<Value, String>> {
        self.observed.lock().expect("observed lock").clone()
    }

    fn observe(&self, outcome: Result<Value, String>) {
        self.observed.lock().expect("observed lock").push(outcome);
    }

    fn next_turn(&self, request: &DelegateRequest, had_host: bool) -> Option<ScriptedTurn> {
        self.requests.lock().expect("requests lock").push(SeenRequest {
            prompt: request
                .messages
                .last()
                .map(|message| message.content.clone())
                .unwrap_or_default(),
            had_host,
            max_calls: request.max_calls,
        });
        self.turns.lock().expect("turns lock").pop_front()
    }
}

#[async_trait]
impl ReasoningDelegate for ScriptedDelegate {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: DelegateRequest,
        mut host: Option<&mut dyn CapabilityHost>,
    ) -> Result<DelegateReply, DelegateError> {
        let turn = self
            .next_turn(&request, host.is_some())
            .ok_or_else(|| DelegateError::Protocol("script exhausted".to_string()))?;
        if let Some(error) = turn.error {
            return Err(error);
        }

        for (index, (name, arguments)) in turn.calls.into_iter().enumerate() {
            if turn.cancel_before_call == Some(index) {
                request.cancel.cancel();
            }
            let Some(host) = host.as_mut() else {
                break;
            };
            match host.invoke(&name, arguments).await {
                Ok(value) => self.observe(Ok(value)),
                Err(err) if err.is_cancellation() => return Err(DelegateError::Cancelled),
                Err(err) => self.observe(Err(err.code().to_string())),
            }
        }

        Ok(DelegateReply {
            transcript: format!("scripted: {}", turn.text),
            text: turn.text,
        })
    }
}

fn orchestrator(delegate: Arc<ScriptedDelegate>, max_steps: usize) -> Orchestrator {
    Orchestrator::new(
        delegate,
        OrchestratorConfig {
            max_steps,
            ..OrchestratorConfig::default()
        },
        TelemetrySink::disabled("test"),
    )
}

#[tokio::test]
async fn failing_step_is_recorded_and_the_run_continues() {
    let (_dir, root) = enumeration_fixture();
    let delegate = ScriptedDelegate::new(vec![
        ScriptedTurn::reply("1. list files\n2. read a.txt"),
        ScriptedTurn::calling(
            "done",
            vec![
                ("ls", json!({})),
                ("cat", json!({})),
                ("cat", json!({"file": "a.txt"})),
            ],
        ),
        ScriptedTurn::reply("Overview: one read failed."),
    ]);

    let result = orchestrator(delegate.clone(), 15)
        .run(Task::new("read the text files", &root))
        .await
        .expect("run should complete");

    assert_eq!(result.steps, 3);
    assert_eq!(result.errors, 1);
    assert!(!result.success);
    assert_eq!(result.summary, "Overview: one read failed.");
    assert_eq!(result.working_directory, root.to_string_lossy());
    assert!(result.details.is_none());

    let requests = delegate.requests();
    assert_eq!(requests.len(), 3);
    assert!(!requests[0].had_host);
    assert!(requests[1].had_host);
    assert_eq!(requests[1].max_calls, 15);
    assert!(requests[1].prompt.contains("1. list files"));
    assert!(!requests[2].had_host);
    assert!(requests[2].prompt.contains("error [invalid_args]"));
    assert!(requests[2].prompt.contains("Final Directory"));

    let observed = delegate.observed();
    assert_eq!(observed[1], Err("invalid_args".to_string()));
    assert_eq!(observed[2].as_ref().map(|value| value["content"].clone()), Ok(json!("a.txt")));
}

#[tokio::test]
async fn verbose_run_exposes_plan_and_contiguous_step_log() {
    let (_dir, root) = enumeration_fixture();
    let delegate = ScriptedDelegate::new(vec![
        ScriptedTurn::reply("1. look around"),
        ScriptedTurn::calling(
            "looked",
            vec![
                ("ls", json!({})),
                ("find", json!({"pattern": "*.md", "recursive": true})),
                ("grep", json!({"pattern": "guide", "file": "docs/guide.txt"})),
                ("read", json!({"file": "b.txt"})),
            ],
        ),
        ScriptedTurn::reply("Overview"),
    ]);

    let result = orchestrator(delegate, 15)
        .run(Task::new("look around", &root).with_verbose(true))
        .await
        .expect("run should complete");

    assert!(result.success);
    assert_eq!(result.errors, 0);
    let details = result.details.expect("verbose run should carry details");
    assert_eq!(details.plan, "1. look around");
    let indices = details.step_log.iter().map(|step| step.index).collect::<Vec<usize>>();
    assert_eq!(indices, vec![1, 2, 3, 4]);
    assert_eq!(details.step_log[1].capability, "find");
    assert!(details.transcript.contains("scripted: looked"));
}

#[tokio::test]
async fn successful_cd_moves_the_cursor_and_failed_cd_does_not() {
    let (_dir, root) = enumeration_fixture();
    let delegate = ScriptedDelegate::new(vec![
        ScriptedTurn::reply("plan"),
        ScriptedTurn::calling(
            "done",
            vec![
                ("cd", json!({"path": "docs"})),
                ("cat", json!({"file": "guide.txt"})),
                ("cd", json!({"path": "does-not-exist"})),
                ("cd", json!({"path": "deep"})),
            ],
        ),
        ScriptedTurn::reply("summary"),
    ]);

    let result = orchestrator(delegate.clone(), 15)
        .run(Task::new("walk", &root))
        .await
        .expect("run should complete");

    assert_eq!(result.steps, 4);
    assert_eq!(result.errors, 1);
    assert_eq!(
        result.working_directory,
        root.join("docs/deep").to_string_lossy()
    );

    let observed = delegate.observed();
    assert_eq!(observed[1].as_ref().map(|value| value["content"].clone()), Ok(json!("guide")));
    assert_eq!(observed[2], Err("invalid_path".to_string()));
}

#[tokio::test]
async fn calls_beyond_the_budget_are_refused_and_not_recorded() {
    let (_dir, root) = enumeration_fixture();
    let delegate = ScriptedDelegate::new(vec![
        ScriptedTurn::reply("plan"),
        ScriptedTurn::calling(
            "done",
            vec![("ls", json!({})), ("ls", json!({})), ("ls", json!({}))],
        ),
        ScriptedTurn::reply("summary"),
    ]);

    let result = orchestrator(delegate.clone(), 2)
        .run(Task::new("list", &root))
        .await
        .expect("run should complete");

    assert_eq!(result.steps, 2);
    assert!(result.success);
    assert_eq!(delegate.observed()[2], Err("budget_exhausted".to_string()));
}

#[tokio::test]
async fn cancellation_during_execute_skips_summary() {
    let (_dir, root) = enumeration_fixture();
    let delegate = ScriptedDelegate::new(vec![
        ScriptedTurn::reply("plan"),
        ScriptedTurn {
            cancel_before_call: Some(1),
            ..ScriptedTurn::calling("never", vec![("ls", json!({})), ("ls", json!({}))])
        },
        ScriptedTurn::reply("summary"),
    ]);

    let err = orchestrator(delegate.clone(), 15)
        .run(Task::new("list", &root))
        .await
        .expect_err("cancelled run should not produce a result");

    assert!(matches!(
        err,
        OrchestratorError::Cancelled {
            phase: RunPhase::Executing
        }
    ));
    assert_eq!(delegate.requests().len(), 2);
    assert_eq!(delegate.observed().len(), 1);
}

#[tokio::test]
async fn cancelled_token_stops_before_planning() {
    let (_dir, root) = enumeration_fixture();
    let delegate = ScriptedDelegate::new(vec![ScriptedTurn::reply("plan")]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator(delegate.clone(), 15)
        .run(Task::new("list", &root).with_cancellation(cancel))
        .await
        .expect_err("cancelled run should fail");
    assert!(matches!(
        err,
        OrchestratorError::Cancelled {
            phase: RunPhase::Planning
        }
    ));
    assert!(delegate.requests().is_empty());
}

#[tokio::test]
async fn unauthorized_delegate_during_plan_is_fatal() {
    let (_dir, root) = enumeration_fixture();
    let delegate = ScriptedDelegate::new(vec![ScriptedTurn::failing(DelegateError::Unauthorized(
        "HTTP 401".to_string(),
    ))]);

    let err = orchestrator(delegate.clone(), 15)
        .run(Task::new("list", &root))
        .await
        .expect_err("unauthorized delegate should fail the run");
    assert!(matches!(
        err,
        OrchestratorError::FatalDelegate {
            phase: RunPhase::Planning,
            source: DelegateError::Unauthorized(_)
        }
    ));
    assert_eq!(delegate.requests().len(), 1);
}

#[tokio::test]
async fn cancellation_during_summary_returns_cancelled() {
    let (_dir, root) = enumeration_fixture();
    let delegate = ScriptedDelegate::new(vec![
        ScriptedTurn::reply("plan"),
        ScriptedTurn::reply("nothing to do"),
        ScriptedTurn::failing(DelegateError::Cancelled),
    ]);

    let err = orchestrator(delegate, 15)
        .run(Task::new("list", &root))
        .await
        .expect_err("cancelled summary should fail");
    assert!(matches!(
        err,
        OrchestratorError::Cancelled {
            phase: RunPhase::Summarizing
        }
    ));
}

#[tokio::test]
async fn missing_working_directory_is_rejected() {
    let dir = tempdir().expect("temp directory should create");
    let delegate = ScriptedDelegate::new(vec![ScriptedTurn::reply("plan")]);
    let err = orchestrator(delegate.clone(), 15)
        .run(Task::new("list", dir.path().join("gone")))
        .await
        .expect_err("missing working directory should fail");
    assert!(matches!(err, OrchestratorError::WorkingDirectory { .. }));
    assert!(delegate.requests().is_empty());
}

#[tokio::test]
async fn orchestrator_emits_task_and_tool_telemetry() {
    let (_dir, root) = enumeration_fixture();
    let telemetry_dir = tempdir().expect("temp directory should create");
    let mut cfg = base_cfg();
    cfg.telemetry_enabled = true;
    cfg.telemetry_path = telemetry_dir
        .path()
        .join("events.jsonl")
        .to_string_lossy()
        .to_string();

    let delegate = ScriptedDelegate::new(vec![
        ScriptedTurn::reply("plan"),
        ScriptedTurn::calling("done", vec![("ls", json!({})), ("cat", json!({}))]),
        ScriptedTurn::reply("summary"),
    ]);
    let orchestrator = Orchestrator::new(
        delegate,
        cfg.orchestrator_config(),
        TelemetrySink::new(&cfg, "run".to_string()),
    );
    orchestrator
        .run(Task::new("list", &root))
        .await
        .expect("run should complete");

    let lines = std::fs::read_to_string(&cfg.telemetry_path)
        .expect("telemetry should be written")
        .lines()
        .map(str::to_string)
        .collect::<Vec<String>>();
    let summary = summarize_telemetry_lines(lines, 100);
    assert_eq!(summary.unique_runs.len(), 1);
    assert_eq!(summary.task_partial, 1);
    assert_eq!(summary.tool_requested, 2);
    assert_eq!(summary.tool_succeeded, 1);
    assert_eq!(summary.tool_failed, 1);
    assert_eq!(summary.capability_counts.get("cat"), Some(&1));
}

#[tokio::test]
async fn anthropic_delegate_reports_unreachable_service() {
    let mut config = AnthropicConfig::new("sk-ant-test", "claude-3-7-sonnet-20250219");
    config.base_url = "http://127.0.0.1:9/".to_string();
    config.request_timeout = std::time::Duration::from_secs(5);
    assert_eq!(config.messages_endpoint(), "http://127.0.0.1:9/v1/messages");

    let delegate = AnthropicDelegate::new(config).expect("client should build");
    let err = delegate
        .generate(
            DelegateRequest {
                system: "system".to_string(),
                messages: vec![Message::user("hello")],
                max_calls: 0,
                cancel: CancellationToken::new(),
            },
            None,
        )
        .await
        .expect_err("closed port should be unreachable");
    assert!(matches!(err, DelegateError::Unreachable(_)));
}

// ---------------------------------------------------------------------------
// Configuration, errors, telemetry, rendering
// ---------------------------------------------------------------------------

#[test]
fn runtime_config_uses_selected_profile_defaults() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[profiles.dev]
model = "claude-3-5-haiku-latest"
max_steps = 8
page_size = 25
max_depth = 3
enumeration_strategy = "manual"
bulk_output_ceiling_bytes = 65536
summary_result_chars = 200
telemetry_path = ".fsagent/telemetry/dev.jsonl"
"#,
    )
    .expect("config should write");

    let cli = test_cli(path.to_string_lossy().as_ref(), "dev");
    let profiles = load_profiles(&cli.config_path).expect("profiles should load");
    let cfg = resolve_runtime_config(&cli, &profiles).expect("runtime config should resolve");

    assert_eq!(cfg.profile, "dev");
    assert_eq!(cfg.model, "claude-3-5-haiku-latest");
    assert_eq!(cfg.max_steps, 8);
    assert_eq!(cfg.page_size, 25);
    assert_eq!(cfg.max_depth, Some(3));
    assert_eq!(cfg.enumeration_strategy, EnumerationStrategy::Manual);
    assert_eq!(cfg.bulk_output_ceiling_bytes, 65536);
    assert_eq!(cfg.summary_result_chars, 200);
    assert_eq!(cfg.telemetry_path, ".fsagent/telemetry/dev.jsonl");
    assert_eq!(cfg.tool_settings().enumeration.page_size, 25);
}

#[test]
fn runtime_config_cli_overrides_profile_values() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[profiles.dev]
model = "claude-3-5-haiku-latest"
enumeration_strategy = "manual"
telemetry_enabled = true
"#,
    )
    .expect("config should write");

    let mut cli = test_cli(path.to_string_lossy().as_ref(), "dev");
    cli.model = Some("claude-3-7-sonnet-20250219".to_string());
    cli.strategy = Some(EnumerationStrategy::Bulk);
    cli.telemetry_enabled = Some(false);

    let profiles = load_profiles(&cli.config_path).expect("profiles should load");
    let mut cfg = resolve_runtime_config(&cli, &profiles).expect("runtime config should resolve");
    assert_eq!(cfg.model, "claude-3-7-sonnet-20250219");
    assert_eq!(cfg.enumeration_strategy, EnumerationStrategy::Bulk);
    assert!(!cfg.telemetry_enabled);

    apply_run_overrides(&mut cfg, Some(500), Some(5000), Some(0));
    assert_eq!(cfg.max_steps, MAX_STEPS_LIMIT);
    assert_eq!(cfg.page_size, 1000);
    assert_eq!(cfg.max_depth, Some(1));
}

#[test]
fn default_profile_resolves_built_in_defaults() {
    let cli = test_cli(".fsagent/does-not-exist.toml", "default");
    let profiles = load_profiles(&cli.config_path).expect("missing config should default");
    let cfg = resolve_runtime_config(&cli, &profiles).expect("runtime config should resolve");
    assert_eq!(cfg.max_steps, DEFAULT_MAX_STEPS);
    assert_eq!(cfg.page_size, 100);
    assert_eq!(cfg.bulk_output_ceiling_bytes, 8 * 1024 * 1024);
    assert_eq!(cfg.summary_result_chars, DEFAULT_SUMMARY_RESULT_CHARS);
    assert_eq!(cfg.telemetry_path, ".fsagent/telemetry/events.jsonl");
}

#[test]
fn runtime_config_reports_missing_profile() {
    let cli = test_cli(".fsagent/does-not-exist.toml", "ops");
    let profiles = load_profiles(&cli.config_path).expect("missing config should default");
    let err = resolve_runtime_config(&cli, &profiles).expect_err("missing profile should fail");
    assert!(
        err.to_string().contains("profile 'ops' not found"),
        "expected actionable missing profile message"
    );
    assert_eq!(categorize_error(&err), ErrorCategory::Config);
}

#[test]
fn invalid_profile_config_is_actionable() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[profiles.default]
enumeration_strategy = "sideways"
"#,
    )
    .expect("config should write");

    let err = load_profiles(path.to_string_lossy().as_ref())
        .expect_err("invalid strategy should fail parsing");
    let msg = format!("{err:#}");
    assert!(msg.contains("invalid profile configuration"));
    assert_eq!(categorize_error(&err), ErrorCategory::Config);
}

#[test]
fn errors_map_to_categories_and_exit_codes() {
    let cancelled = anyhow::Error::from(OrchestratorError::Cancelled {
        phase: RunPhase::Executing,
    });
    assert_eq!(categorize_error(&cancelled), ErrorCategory::Cancelled);
    assert_eq!(categorize_error(&cancelled).exit_code(), EXIT_CANCELLED);

    let fatal = anyhow::Error::from(OrchestratorError::FatalDelegate {
        phase: RunPhase::Planning,
        source: DelegateError::Unreachable("connection refused".to_string()),
    });
    assert_eq!(categorize_error(&fatal), ErrorCategory::Delegate);
    assert_eq!(categorize_error(&fatal).exit_code(), EXIT_FAILURE);

    let enumeration = anyhow::Error::from(EnumerationError::DirectoryAccess {
        path: PathBuf::from("/missing"),
        message: "No such file or directory".to_string(),
    })
    .context("find failed");
    assert_eq!(categorize_error(&enumeration), ErrorCategory::Enumeration);

    let key = anyhow::anyhow!("ANTHROPIC_API_KEY is required to run tasks");
    let rendered = format_cli_error(&key);
    assert!(rendered.starts_with("[DELEGATE]"));
    assert!(rendered.contains("Hint:"));
}

#[test]
fn provider_builds_anthropic_config_from_runtime_settings() {
    let mut cfg = base_cfg();
    cfg.api_base_url = "http://localhost:8080/".to_string();
    cfg.request_timeout_secs = 30;

    let config = crate::provider::anthropic_config(&cfg, "sk-ant-test".to_string());
    assert_eq!(config.model, cfg.model);
    assert_eq!(config.request_timeout, std::time::Duration::from_secs(30));
    assert_eq!(config.messages_endpoint(), "http://localhost:8080/v1/messages");

    assert!(crate::provider::validate_model_name("claude-3-5-haiku-latest").is_ok());
    let err = crate::provider::validate_model_name("gpt-4o").expect_err("non-claude model");
    assert_eq!(categorize_error(&err), ErrorCategory::Delegate);
}

#[test]
fn api_keys_are_redacted_from_error_output() {
    let text = "request with key sk-ant-api03-abc_DEF-123 failed";
    assert_eq!(
        redact_api_keys(text),
        "request with key sk-ant-[REDACTED] failed"
    );
}

#[test]
fn telemetry_summary_counts_task_and_tool_events() {
    let lines = vec![
        json!({"ts_unix_ms": 1000, "event": "task.started", "run_id": "run-a", "command": "run"})
            .to_string(),
        json!({"ts_unix_ms": 1100, "event": "tool.requested", "run_id": "run-a", "command": "run", "capability": "find"})
            .to_string(),
        json!({"ts_unix_ms": 1200, "event": "tool.succeeded", "run_id": "run-a", "command": "run", "capability": "find"})
            .to_string(),
        json!({"ts_unix_ms": 1300, "event": "task.completed", "run_id": "run-a", "command": "run", "success": true})
            .to_string(),
        json!({"ts_unix_ms": 1400, "event": "task.cancelled", "run_id": "run-b", "command": "run"})
            .to_string(),
        "invalid-json-line".to_string(),
    ];

    let summary = summarize_telemetry_lines(lines, 100);
    assert_eq!(summary.total_lines, 6);
    assert_eq!(summary.parsed_events, 5);
    assert_eq!(summary.parse_errors, 1);
    assert_eq!(summary.unique_runs.len(), 2);
    assert_eq!(summary.task_completed, 1);
    assert_eq!(summary.task_cancelled, 1);
    assert_eq!(summary.tool_requested, 1);
    assert_eq!(summary.capability_counts.get("find"), Some(&1));
    assert_eq!(summary.last_event_ts_unix_ms, Some(1400));
}

#[test]
fn task_report_renders_plain_text_without_color() {
    let result = TaskResult {
        success: false,
        working_directory: "/work/docs".to_string(),
        steps: 3,
        errors: 1,
        summary: "Overview\nKey Findings".to_string(),
        details: None,
    };
    let rendered = render_task_result(&result, false);
    assert!(rendered.contains("completed with errors (steps=3, errors=1)"));
    assert!(rendered.contains("Working directory: /work/docs"));
    assert_eq!(strip_ansi(&render_task_result(&result, true)), rendered);
}

#[test]
fn enumeration_page_rendering_shows_next_token() {
    let page = EnumerationResult {
        paths: vec![PathBuf::from("/data/a.txt")],
        next_page_token: Some("p1.abc".to_string()),
        total_matched: 4,
        strategy: ServedBy::Bulk,
        warnings: vec!["skipped '/data/locked': permission denied".to_string()],
    };
    let rendered = render_enumeration_page(&page, false);
    assert!(rendered.starts_with("/data/a.txt\n"));
    assert!(rendered.contains("1 of 4 matches shown (strategy=bulk)"));
    assert!(rendered.contains("next page: p1.abc"));
    assert!(rendered.contains("warning: skipped"));
}

#[test]
fn command_labels_name_subcommands() {
    let cli = Cli::try_parse_from(["fsagent", "find", "*.rs", "--recursive", "--page-size", "5"])
        .expect("find command should parse");
    assert_eq!(command_label(&cli.command), "find");
    match cli.command {
        Commands::Find {
            pattern,
            recursive,
            page_size,
            ..
        } => {
            assert_eq!(pattern, "*.rs");
            assert!(recursive);
            assert_eq!(page_size, Some(5));
        }
        other => panic!("unexpected command: {other:?}"),
    }

    let cli = Cli::try_parse_from(["fsagent", "find", "*.log", "--strategy", "manual"])
        .expect("strategy should be accepted after the subcommand");
    assert_eq!(cli.strategy, Some(EnumerationStrategy::Manual));

    let cli = Cli::try_parse_from(["fsagent", "telemetry", "report", "--limit", "10"])
        .expect("telemetry command should parse");
    assert_eq!(command_label(&cli.command), "telemetry.report");
}
