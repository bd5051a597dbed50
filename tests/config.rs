use std::path::PathBuf;
use std::time::Duration;

use reelshelf::cli::Args;
use reelshelf::config::{load_config, Config, FileConfig};

fn make_args() -> Args {
    Args {
        library: None,
        name: None,
        port: None,
        host: None,
        config: None,
        data_dir: None,
        in_memory: false,
        no_background: false,
    }
}

#[test]
fn test_defaults_when_nothing_set() {
    let config = Config::resolve(None, &make_args());
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 6540);
    assert_eq!(config.library_name, "Media Library");
    assert!(config.library_path.is_none());
    assert_eq!(config.database_path, Some(PathBuf::from("data/library.db")));
    assert_eq!(config.thumbnail_dir, PathBuf::from("data/thumbnails"));
    assert_eq!(config.cache_capacity, 1000);
    assert_eq!(config.cache_max_size, 512 * 1024 * 1024);
    assert!(config.background);
    assert_eq!(config.batch_size, 100);
    assert_eq!(config.delay, Duration::from_millis(500));
    assert_eq!(config.log_level, "info");
}

#[test]
fn test_cli_flag_overrides_default() {
    let mut args = make_args();
    args.port = Some(9000);
    args.library = Some(PathBuf::from("/srv/videos"));
    let config = Config::resolve(None, &args);
    assert_eq!(config.port, 9000);
    assert_eq!(config.library_path, Some(PathBuf::from("/srv/videos")));
}

#[test]
fn test_toml_overrides_default() {
    let file: FileConfig = toml::from_str(
        r#"
        [server]
        port = 7777

        [library]
        path = "/srv/videos"
        name = "Family Videos"

        [thumbnails]
        cache_capacity = 50
        cache_max_size = 1048576

        [processing]
        batch_size = 10
        delay_ms = 0

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();
    let config = Config::resolve(Some(file), &make_args());
    assert_eq!(config.port, 7777);
    assert_eq!(config.library_path, Some(PathBuf::from("/srv/videos")));
    assert_eq!(config.library_name, "Family Videos");
    assert_eq!(config.cache_capacity, 50);
    assert_eq!(config.cache_max_size, 1_048_576);
    assert_eq!(config.batch_size, 10);
    assert_eq!(config.delay, Duration::ZERO);
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_cli_overrides_toml() {
    let file: FileConfig = toml::from_str("[server]\nport = 7777\nhost = \"10.0.0.1\"\n").unwrap();
    let mut args = make_args();
    args.port = Some(9000);
    let config = Config::resolve(Some(file), &args);
    assert_eq!(config.port, 9000); // CLI wins
    assert_eq!(config.host, "10.0.0.1");
}

#[test]
fn test_data_dir_moves_database_and_thumbnails() {
    let mut args = make_args();
    args.data_dir = Some(PathBuf::from("/var/lib/reelshelf"));
    let config = Config::resolve(None, &args);
    assert_eq!(config.database_path, Some(PathBuf::from("/var/lib/reelshelf/library.db")));
    assert_eq!(config.thumbnail_dir, PathBuf::from("/var/lib/reelshelf/thumbnails"));
}

#[test]
fn test_explicit_paths_beat_data_dir() {
    let file: FileConfig = toml::from_str(
        "[database]\npath = \"/db/lib.db\"\n[thumbnails]\noutput_dir = \"/thumbs\"\n",
    )
    .unwrap();
    let mut args = make_args();
    args.data_dir = Some(PathBuf::from("/var/lib/reelshelf"));
    let config = Config::resolve(Some(file), &args);
    assert_eq!(config.database_path, Some(PathBuf::from("/db/lib.db")));
    assert_eq!(config.thumbnail_dir, PathBuf::from("/thumbs"));
}

#[test]
fn test_in_memory_has_no_database() {
    let mut args = make_args();
    args.in_memory = true;
    assert!(Config::resolve(None, &args).database_path.is_none());
}

#[test]
fn test_background_disabled_by_flag_or_file() {
    let mut args = make_args();
    args.no_background = true;
    assert!(!Config::resolve(None, &args).background);

    let file: FileConfig = toml::from_str("[processing]\nenabled = false\n").unwrap();
    assert!(!Config::resolve(Some(file), &make_args()).background);
}

#[test]
fn test_zero_batch_size_is_clamped() {
    let file: FileConfig = toml::from_str("[processing]\nbatch_size = 0\n").unwrap();
    assert_eq!(Config::resolve(Some(file), &make_args()).batch_size, 1);
}

#[test]
fn test_toml_unknown_fields_ignored() {
    // Future keys must not break parsing
    let toml_str = "unknown_future_key = true\n[server]\nport = 9000\nfancy = 1\n";
    let parsed: Result<FileConfig, _> = toml::from_str(toml_str);
    assert!(parsed.is_ok());
}

#[test]
fn test_load_config_reports_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.toml");
    let bad = dir.path().join("bad.toml");
    std::fs::write(&good, "[server]\nport = 1234\n").unwrap();
    std::fs::write(&bad, "[server\nport = ").unwrap();

    assert_eq!(load_config(&good).unwrap().server.port, Some(1234));
    assert!(load_config(&bad).is_err());
    assert!(load_config(&dir.path().join("missing.toml")).is_err());
}
