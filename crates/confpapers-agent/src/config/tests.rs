use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_empty_file_uses_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.site.base_url, "https://sa2025.conference-schedule.org/");
    assert_eq!(config.http.timeout_secs, 10);
    assert_eq!(config.http.max_attempts, 4);
    assert_eq!(config.http.concurrency, 8);
    assert_eq!(config.output.path, "dist/papers.json");
    assert!(config.output.download_images);
    assert_eq!(config.policy.snippet_failure, SnippetFailurePolicy::Abort);
    assert_eq!(config.policy.detail_failure, FailurePolicy::Contain);
}

#[test]
fn test_default_retry_policy_matches_fetch_defaults() {
    let config = Config::default();
    assert_eq!(config.retry_policy(), RetryPolicy::default());
    assert_eq!(config.timeout(), Duration::from_secs(10));
}

#[test]
fn test_partial_sections_fill_remaining_defaults() {
    let config: Config = toml::from_str(
        r#"
        [http]
        concurrency = 2

        [filters]
        exclusion_match = "exact"
        misc_id_prefix = ""

        [policy]
        snippet_failure = "skip"
        image_failure = "abort"
        "#,
    )
    .unwrap();

    assert_eq!(config.http.concurrency, 2);
    assert_eq!(config.http.max_attempts, 4);

    let filters = config.schedule_filters();
    assert_eq!(filters.exclusion_match, ExclusionMatch::Exact);
    assert_eq!(filters.misc_id_prefix, None);
    assert_eq!(filters.excluded_session_titles.len(), 4);

    let job = config.to_job();
    assert_eq!(job.concurrency, 2);
    assert_eq!(job.snippet_failure, SnippetFailurePolicy::Skip);
    assert_eq!(job.image_failure, FailurePolicy::Abort);
    assert_eq!(job.images_dir, Some(PathBuf::from("dist/images")));
}

#[test]
fn test_disabled_images_clear_directory() {
    let config: Config = toml::from_str("[output]\ndownload_images = false\n").unwrap();
    assert_eq!(config.to_job().images_dir, None);
}

#[test]
fn test_corrections_replace_builtin_table() {
    let config: Config = toml::from_str(
        r#"
        [[corrections]]
        title = "A Paper"
        authors = ["Ada Lovelace"]
        affiliations = [["University of London"]]
        "#,
    )
    .unwrap();

    let table = config.correction_table();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get("A Paper").unwrap().authors, vec!["Ada Lovelace"]);
    assert_eq!(Config::default().correction_table().len(), 2);
}

#[test]
fn test_load_explicit_missing_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
}

#[test]
fn test_load_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("confpapers.toml");
    std::fs::write(&path, "[site]\nbase_url = \"https://example.org/\"\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.site.base_url, "https://example.org/");
    assert_eq!(config.to_job().base_url, "https://example.org/");
}

#[test]
fn test_load_rejects_misaligned_correction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("confpapers.toml");
    std::fs::write(
        &path,
        "[[corrections]]\ntitle = \"T\"\nauthors = [\"A\", \"B\"]\naffiliations = [[\"X\"]]\n",
    )
    .unwrap();
    assert!(Config::load(Some(&path)).is_err());
}

#[test]
fn test_load_rejects_inverted_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("confpapers.toml");
    std::fs::write(&path, "[http]\nbackoff_min_ms = 5000\nbackoff_max_ms = 10\n").unwrap();
    assert!(Config::load(Some(&path)).is_err());
}
