//! Integration tests for the mdpub binary

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn mdpub(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mdpub"))
        .current_dir(cwd)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run mdpub")
}

/// A site with one guide page and its co-located photo
fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let guide = dir.path().join("src/content/guide");
    fs::create_dir_all(&guide).unwrap();
    fs::write(guide.join("photo.png"), b"png bytes").unwrap();
    fs::write(
        guide.join("index.md"),
        "# Guide\n\n[Next](./setup.md)\n\n![Photo](photo.png)\n\n![Logo](../../../public/brand/logo.png)\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_single_file_to_stdout() {
    let site = site();

    let output = mdpub(site.path(), &["src/content/guide/index.md", "-q"]);

    assert!(output.status.success(), "mdpub failed: {:?}", output);
    let stdout = String::from_utf8(output.stdout).unwrap();
    insta::assert_snapshot!(stdout, @r"
    # Guide

    [Next](../setup)

    ![Photo](/relocated-assets-from-content/guide/photo.png)

    ![Logo](/brand/logo.png)
    ");
    assert_eq!(
        fs::read(
            site.path()
                .join("public/relocated-assets-from-content/guide/photo.png")
        )
        .unwrap(),
        b"png bytes"
    );
}

#[test]
fn test_single_file_to_output() {
    let site = site();

    let output = mdpub(
        site.path(),
        &["src/content/guide/index.md", "-o", "build/index.md"],
    );

    assert!(output.status.success(), "mdpub failed: {:?}", output);
    let written = fs::read_to_string(site.path().join("build/index.md")).unwrap();
    assert!(written.contains("![Photo](/relocated-assets-from-content/guide/photo.png)"));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Rewrote 3 URLs, copied 1 assets (0 up to date, 0 failed)"));
}

#[test]
fn test_second_run_is_up_to_date() {
    let site = site();

    assert!(mdpub(site.path(), &["src/content/guide/index.md", "-o", "a.md"]).status.success());
    let output = mdpub(site.path(), &["src/content/guide/index.md", "-o", "b.md"]);

    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("copied 0 assets (1 up to date, 0 failed)"));
}

#[test]
fn test_directory_with_config() {
    let site = site();
    let content = site.path().join("src/content");
    fs::write(
        content.join("index.mdx"),
        "See [the guide](https://old.example.com/guide/index.md).\n\n```chartjs\ntype: bar\ndata: {}\n```\n",
    )
    .unwrap();
    fs::write(content.join("notes.txt"), "not markdown").unwrap();
    fs::write(
        content.join("_mdpub.toml"),
        "[charts]\nenabled = false\n\n[[links.replace]]\nprefix = \"https://old.example.com/\"\nwith = \"./\"\n",
    )
    .unwrap();

    let output = mdpub(site.path(), &["src/content", "-o", "build", "-r", "-q"]);

    assert!(output.status.success(), "mdpub failed: {:?}", output);
    let index = fs::read_to_string(site.path().join("build/index.mdx")).unwrap();
    assert!(index.contains("[the guide](../guide/index)"));
    // charts disabled by the config file
    assert!(index.contains("```chartjs"));
    assert!(site.path().join("build/guide/index.md").is_file());
    assert!(!site.path().join("build/notes.txt").exists());
}

#[test]
fn test_directory_requires_output() {
    let site = site();

    let output = mdpub(site.path(), &["src/content", "-r"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("requires --output"));
}

#[test]
fn test_missing_asset_fails_run() {
    let site = site();
    fs::remove_file(site.path().join("src/content/guide/photo.png")).unwrap();

    let output = mdpub(site.path(), &["src/content/guide/index.md", "-o", "out.md"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Failed to relocate"));
    // The document is still written with the published URL
    let written = fs::read_to_string(site.path().join("out.md")).unwrap();
    assert!(written.contains("/relocated-assets-from-content/guide/photo.png"));
}

#[test]
fn test_init_config() {
    let dir = tempfile::tempdir().unwrap();

    let output = mdpub(dir.path(), &["init"]);

    assert!(output.status.success(), "mdpub init failed: {:?}", output);
    let content = fs::read_to_string(dir.path().join("_mdpub.toml")).unwrap();
    assert!(content.starts_with("#:schema ./mdpub.schema.json"));
    assert!(content.contains("[relocation]"));

    // Refuses to overwrite without --force
    assert!(!mdpub(dir.path(), &["init"]).status.success());
    assert!(mdpub(dir.path(), &["init", "--force"]).status.success());
}

#[test]
fn test_init_schema() {
    let dir = tempfile::tempdir().unwrap();

    let output = mdpub(dir.path(), &["init", "--schema"]);

    assert!(output.status.success(), "mdpub init --schema failed");
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(schema["title"], "Config");
    assert!(schema["properties"]["relocation"].is_object());
}
