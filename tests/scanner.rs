use depwatch::core::scanner::FileScanner;
use depwatch::error::Error;
use std::fs;
use std::path::Path;

fn touch<P: AsRef<Path>>(p: P) {
    let p = p.as_ref();
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, "# test").unwrap();
}

fn ids(scanner: &FileScanner, root: &Path) -> Vec<String> {
    scanner
        .scan_directory(root)
        .unwrap()
        .into_iter()
        .map(|f| f.module_id)
        .collect()
}

#[test]
fn scanner_keeps_sorted_python_sources() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();

    touch(root.join("b/app.py"));
    touch(root.join("a/main.py"));
    touch(root.join("a/lib.rs")); // ignored
    touch(root.join("readme.txt")); // ignored
    touch(root.join("setup.py"));

    let scanner = FileScanner::new(&["**/*.py"], &[], "py").unwrap();
    assert_eq!(ids(&scanner, root), vec!["a/main.py", "b/app.py", "setup.py"]);
}

#[test]
fn scanner_exclude_globs_win() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();

    touch(root.join("app/main.py"));
    touch(root.join("venv/lib/site.py"));
    touch(root.join("app/__pycache__/main.py"));
    touch(root.join("tests/test_main.py"));

    let scanner = FileScanner::new(
        &["**/*.py"],
        &["**/venv/**", "**/__pycache__/**", "tests/**"],
        "py",
    )
    .unwrap();
    assert_eq!(ids(&scanner, root), vec!["app/main.py"]);
}

#[test]
fn scanner_include_globs_restrict_the_tree() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();

    touch(root.join("src/core.py"));
    touch(root.join("scripts/tool.py"));

    let scanner = FileScanner::new(&["src/**"], &[], "py").unwrap();
    assert_eq!(ids(&scanner, root), vec!["src/core.py"]);
}

#[test]
fn scanner_select_files_drops_missing_and_filtered_paths() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();

    touch(root.join("pkg/a.py"));
    touch(root.join("pkg/b.py"));
    touch(root.join("notes.md"));

    let scanner = FileScanner::new(&["**/*.py"], &[], "py").unwrap();
    let selected = scanner.select_files(root, &["pkg/b.py", "./pkg/a.py", "gone.py", "notes.md", "pkg/b.py"]);

    let ids: Vec<&str> = selected.iter().map(|f| f.module_id.as_str()).collect();
    assert_eq!(ids, vec!["pkg/a.py", "pkg/b.py"]);
    assert_eq!(selected[0].path, root.join("pkg/a.py"));
}

#[test]
fn scanner_missing_root_is_reported() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("nope");

    let scanner = FileScanner::new(&["**/*.py"], &[], "py").unwrap();
    let err = scanner.scan_directory(&missing).unwrap_err();
    assert!(matches!(err, Error::RootNotFound(path) if path == missing));
}

#[cfg(unix)]
#[test]
fn scanner_skips_unreadable_directories() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    touch(root.join("app.py"));
    touch(root.join("locked/hidden.py"));
    let locked = root.join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    let listing_denied = fs::read_dir(&locked).is_err();

    let scanner = FileScanner::new(&[] as &[&str], &[], "py").unwrap();
    let found = scanner.scan_directory(root);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let found: Vec<String> = found.unwrap().into_iter().map(|f| f.module_id).collect();
    assert!(found.contains(&"app.py".to_string()));
    if listing_denied {
        assert_eq!(found, vec!["app.py"]);
    }
}
