use assert_fs::TempDir;
use assert_fs::fixture::{FileWriteStr, PathChild, PathCreateDir};
use common::command::{init_repository_dir, run_bit_command, run_git_command, stdout_of};
use common::file::write_generated_files;
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

fn git_tree_oid(dir: &std::path::Path) -> Result<String, Box<dyn std::error::Error>> {
    run_git_command(dir, &["add", "."]).assert().success();
    stdout_of(run_git_command(dir, &["write-tree"]))
}

#[rstest]
fn write_tree_matches_git_for_nested_project(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    write_generated_files(&dir.join("a").join("generated"), 3);

    let bit_oid = stdout_of(run_bit_command(dir, &["write-tree"]))?;
    let git_oid = git_tree_oid(dir)?;

    assert_eq!(bit_oid, git_oid);

    Ok(())
}

#[rstest]
fn write_tree_orders_directories_like_git(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    // "a-b" and "a.txt" sort before the directory "a"
    init_repository_dir.child("a.txt").write_str("file")?;
    init_repository_dir.child("a-b").write_str("dash")?;
    let dir = init_repository_dir.path();

    let bit_oid = stdout_of(run_bit_command(dir, &["write-tree"]))?;
    let git_oid = git_tree_oid(dir)?;

    assert_eq!(bit_oid, git_oid);

    Ok(())
}

#[rstest]
fn write_tree_skips_empty_directories(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    init_repository_dir.child("empty").create_dir_all()?;
    init_repository_dir
        .child("nested")
        .child("also-empty")
        .create_dir_all()?;
    let dir = init_repository_dir.path();

    let bit_oid = stdout_of(run_bit_command(dir, &["write-tree"]))?;
    let git_oid = git_tree_oid(dir)?;

    assert_eq!(bit_oid, git_oid);

    Ok(())
}

#[rstest]
fn ls_tree_matches_git(init_repository_dir: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    let tree_oid = stdout_of(run_bit_command(dir, &["write-tree"]))?;

    let bit_listing = stdout_of(run_bit_command(dir, &["ls-tree", &tree_oid]))?;
    let git_listing = stdout_of(run_git_command(dir, &["ls-tree", &tree_oid]))?;

    assert_eq!(bit_listing, git_listing);
    assert!(bit_listing.contains("040000 tree "));
    assert!(bit_listing.contains("100644 blob "));

    Ok(())
}

#[rstest]
fn ls_tree_name_only(init_repository_dir: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    let tree_oid = stdout_of(run_bit_command(dir, &["write-tree"]))?;

    run_bit_command(dir, &["ls-tree", "--name-only", &tree_oid])
        .assert()
        .success()
        .stdout(predicate::eq("1.txt\na\n"));

    Ok(())
}

#[rstest]
fn cat_file_prints_tree_like_git(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    let tree_oid = stdout_of(run_bit_command(dir, &["write-tree"]))?;

    let bit_output = stdout_of(run_bit_command(dir, &["cat-file", "-p", &tree_oid]))?;
    let git_output = stdout_of(run_git_command(dir, &["cat-file", "-p", &tree_oid]))?;

    assert_eq!(bit_output, git_output);

    Ok(())
}

#[rstest]
fn ls_tree_of_a_blob_fails(init_repository_dir: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    let blob_oid = stdout_of(run_bit_command(dir, &["hash-object", "-w", "1.txt"]))?;

    run_bit_command(dir, &["ls-tree", &blob_oid])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a tree"));

    Ok(())
}
