//! Configuration Tests
//!
//! Managers built from a `beanstore.toml` on disk.

use crate::common::*;
use beanstore::{AffinityPolicy, CONFIG_FILE_NAME};
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn config_file_drives_manager() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
cache_name = "carts"
idle_timeout = { value = 5, unit = "minutes" }

[affinity]
policy = "ranked"
max_members = 2
"#,
    );
    let config = BeanstoreConfig::from_file(&path).unwrap();
    assert_eq!(config.idle_timeout, Some(Time::seconds(300)));
    assert_eq!(config.affinity.policy, AffinityPolicy::Ranked);

    let grid = cluster(3, 2);
    let manager = manager_with(&grid, None, config);
    assert_eq!(manager.cache_name(), "carts");

    let bean = new_cart(&manager, "ann");
    assert_eq!(bean.idle_timeout(), Some(Time::minutes(5)));
    assert_eq!(grid.len("carts"), 1);
    assert_eq!(grid.len("beans"), 0);
    assert_eq!(manager.affinity(bean.id()).members().len(), 2);
}

#[test]
fn context_timeout_overrides_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "idle_timeout = { value = 5, unit = \"minutes\" }\n");
    let config = BeanstoreConfig::from_file(&path).unwrap();

    let grid = cluster(1, 1);
    let manager = manager_with(&grid, Some(Time::seconds(1)), config);
    let bean = new_cart(&manager, "ann");
    assert_eq!(bean.idle_timeout(), Some(Time::millis(1000)));
}

#[test]
fn default_file_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    BeanstoreConfig::write_default_if_missing(&path).unwrap();
    assert_eq!(BeanstoreConfig::from_file(&path).unwrap(), BeanstoreConfig::default());

    // Existing files are left alone.
    std::fs::write(&path, "cache_name = \"mine\"\n").unwrap();
    BeanstoreConfig::write_default_if_missing(&path).unwrap();
    assert_eq!(BeanstoreConfig::from_file(&path).unwrap().cache_name, "mine");
}

#[test]
fn invalid_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[affinity]\nmax_members = 0\n");
    assert!(BeanstoreConfig::from_file(&path).is_err());

    let path = write_config(&dir, "idle_timeout = \"soon\"\n");
    assert!(BeanstoreConfig::from_file(&path).is_err());
}
