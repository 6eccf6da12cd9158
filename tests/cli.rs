//! Binary-level tests for distmirror.
//!
//! Every test isolates config discovery by pointing HOME and
//! XDG_CONFIG_HOME at a TempDir.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

/// Get a command for running distmirror with an empty environment config.
fn distmirror(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("distmirror").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env_remove("DISTMIRROR_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

/// Commit `files` on branch `c8` of a new repository at `dir` and tag it.
fn upstream_repo(dir: &Path, files: &[(&str, &str)], tag: &str) {
    let repo = git2::Repository::init(dir).unwrap();
    repo.set_head("refs/heads/c8").unwrap();
    let mut index = repo.index().unwrap();
    for (path, contents) in files {
        let full = dir.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(&full, contents).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = git2::Signature::now("Upstream", "up@example.com").unwrap();
    let commit = repo
        .commit(Some("HEAD"), &sig, &sig, "import", &tree, &[])
        .unwrap();
    if !tag.is_empty() {
        let target = repo.find_object(commit, None).unwrap();
        repo.tag(tag, &target, &sig, "import", false).unwrap();
    }
}

/// Upstream `up/rpms/httpd`, bare downstream `down/rpms/httpd.git`.
fn forge() -> TempDir {
    let root = TempDir::new().unwrap();
    upstream_repo(
        &root.path().join("up/rpms/httpd"),
        &[("SPECS/httpd.spec", "Name: httpd\nVersion: 2.4.37\n")],
        "imports/c8/httpd-2.4.37-21.el8",
    );
    git2::Repository::init_bare(root.path().join("down/rpms/httpd.git")).unwrap();
    root
}

fn import_args(root: &Path) -> Vec<String> {
    vec![
        "import".into(),
        "--source-rpm".into(),
        "httpd".into(),
        "--rpm-prefix".into(),
        format!("file://{}/up/rpms", root.display()),
        "--upstream-prefix".into(),
        format!("file://{}/down", root.display()),
        "--storage-addr".into(),
        format!("file://{}/blobs", root.display()),
    ]
}

#[test]
fn help_lists_commands() {
    let home = TempDir::new().unwrap();
    distmirror(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("completion"));
}

#[test]
fn import_help_shows_examples() {
    let home = TempDir::new().unwrap();
    distmirror(home.path())
        .args(["import", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WORKFLOW EXAMPLES"))
        .stdout(predicate::str::contains("--taglessmode"));
}

#[test]
fn completion_generates_bash_script() {
    let home = TempDir::new().unwrap();
    distmirror(home.path())
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("distmirror"));
}

#[test]
fn import_without_storage_fails() {
    let home = TempDir::new().unwrap();
    distmirror(home.path())
        .args(["import", "--source-rpm", "httpd"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("storage-addr"));
}

#[test]
fn import_reports_published_branches() {
    let root = forge();
    let out = distmirror(root.path())
        .args(import_args(root.path()))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let downstream = git2::Repository::open_bare(root.path().join("down/rpms/httpd.git")).unwrap();
    let tip = downstream
        .find_reference("refs/heads/r8")
        .unwrap()
        .peel_to_commit()
        .unwrap();
    assert_eq!(report["branch_commits"]["r8"], tip.id().to_string());
    assert_eq!(report["branch_versions"]["r8"]["version"], "2.4.37");
    assert_eq!(report["branch_versions"]["r8"]["release"], "21.el8");
}

#[test]
fn directive_failures_print_json_array() {
    let root = forge();
    upstream_repo(
        &root.path().join("down/patch/httpd.git"),
        &[(
            "ROCKY/CFG/broken.cfg",
            "[[delete]]\nfile = \"SOURCES/gone.txt\"\n",
        )],
        "",
    );
    // the patch repository serves directives from `main`
    let patches = git2::Repository::open(root.path().join("down/patch/httpd.git")).unwrap();
    let head = patches.head().unwrap().peel_to_commit().unwrap();
    patches.branch("main", &head, true).unwrap();

    distmirror(root.path())
        .args(import_args(root.path()))
        .assert()
        .code(1)
        .stdout(predicate::str::diff(
            "[\"FILE_DOES_NOT_EXIST:SOURCES/gone.txt\"]\n",
        ));
}

#[test]
fn fetch_downloads_listed_sources() {
    let root = TempDir::new().unwrap();
    let tarball = b"bash source tarball";
    let digest = hex::encode(Sha256::digest(tarball));

    let origin = root.path().join("origin");
    fs::create_dir_all(&origin).unwrap();
    fs::write(origin.join(&digest), tarball).unwrap();

    let checkout = root.path().join("bash");
    fs::create_dir_all(&checkout).unwrap();
    fs::write(
        checkout.join(".bash.metadata"),
        format!("{digest} SOURCES/bash-5.1.tar.gz\n"),
    )
    .unwrap();

    distmirror(root.path())
        .args(["fetch", "--cdn-url"])
        .arg(format!("file://{}", origin.display()))
        .arg("--path")
        .arg(&checkout)
        .assert()
        .success();

    assert_eq!(
        fs::read(checkout.join("SOURCES/bash-5.1.tar.gz")).unwrap(),
        tarball
    );
}

#[test]
fn fetch_without_metadata_fails() {
    let root = TempDir::new().unwrap();
    distmirror(root.path())
        .args(["fetch", "--cdn-url", "https://cdn.example/sources", "--path"])
        .arg(root.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}
