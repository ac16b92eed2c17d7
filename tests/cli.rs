use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_cli_backup_list_restore_cycle() -> Result<(), Box<dyn std::error::Error>> {
    let source_dir = tempdir()?;
    fs::write(source_dir.path().join("a.txt"), "alpha")?;
    fs::create_dir(source_dir.path().join("nested"))?;
    fs::write(source_dir.path().join("nested/b.log"), "beta")?;

    let work_dir = tempdir()?;
    let archive_path = work_dir.path().join("snapshot.tar");

    let mut cmd = Command::cargo_bin("backupfiles")?;
    cmd.arg("-f").arg(&archive_path).arg(source_dir.path());
    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("Searching for files in:")
                .and(predicate::str::contains("Modified after:"))
                .and(predicate::str::contains("1970-01-01 00:00:00"))
                .and(predicate::str::contains("nested/b.log")),
        );
    assert!(archive_path.exists());

    let mut cmd = Command::cargo_bin("backupfiles")?;
    cmd.arg("-f").arg(&archive_path).arg("-l");
    cmd.assert().success().stdout(
        predicate::str::contains(" a.txt")
            .and(predicate::str::contains("drwx"))
            .and(predicate::str::contains("Total: 3 entries")),
    );

    let extract_dir = work_dir.path().join("out");
    let mut cmd = Command::cargo_bin("backupfiles")?;
    cmd.arg("-f").arg(&archive_path).arg("-C").arg(&extract_dir);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("2 files and 1 directories restored"));

    assert_eq!(fs::read_to_string(extract_dir.join("a.txt"))?, "alpha");
    assert_eq!(fs::read_to_string(extract_dir.join("nested/b.log"))?, "beta");
    Ok(())
}

#[test]
fn test_cli_restore_default_destination() -> Result<(), Box<dyn std::error::Error>> {
    let source_dir = tempdir()?;
    fs::write(source_dir.path().join("only.txt"), "1")?;
    let work_dir = tempdir()?;
    let archive_path = work_dir.path().join("home.tar");

    Command::cargo_bin("backupfiles")?
        .arg("-f")
        .arg(&archive_path)
        .arg(source_dir.path())
        .assert()
        .success();

    Command::cargo_bin("backupfiles")?
        .arg("-f")
        .arg(&archive_path)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(work_dir.path().join("home/only.txt"))?, "1");
    Ok(())
}

#[test]
fn test_cli_future_time_archives_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let source_dir = tempdir()?;
    fs::write(source_dir.path().join("a.txt"), "alpha")?;
    let work_dir = tempdir()?;
    let archive_path = work_dir.path().join("empty.tar");

    Command::cargo_bin("backupfiles")?
        .arg("-f")
        .arg(&archive_path)
        .arg("-t")
        .arg("2999-01-01 00:00:00")
        .arg(source_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No files were modified"));

    assert_eq!(fs::metadata(&archive_path)?.len(), 1024);
    Ok(())
}

#[test]
fn test_cli_invalid_time() -> Result<(), Box<dyn std::error::Error>> {
    let source_dir = tempdir()?;
    let work_dir = tempdir()?;

    Command::cargo_bin("backupfiles")?
        .arg("-f")
        .arg(work_dir.path().join("x.tar"))
        .arg("-t")
        .arg("yesterday-ish")
        .arg(source_dir.path())
        .assert()
        .failure()
        .code(255)
        .stderr(predicate::str::contains("invalid selection threshold"));
    Ok(())
}

#[test]
fn test_cli_missing_archive() -> Result<(), Box<dyn std::error::Error>> {
    let work_dir = tempdir()?;

    Command::cargo_bin("backupfiles")?
        .arg("-f")
        .arg(work_dir.path().join("nope.tar"))
        .arg("-l")
        .assert()
        .failure()
        .code(5)
        .stderr(predicate::str::contains("nope.tar"));
    Ok(())
}

#[test]
fn test_cli_corrupt_archive() -> Result<(), Box<dyn std::error::Error>> {
    let work_dir = tempdir()?;
    let archive_path = work_dir.path().join("junk.tar");
    fs::write(&archive_path, vec![1u8; 700])?;

    Command::cargo_bin("backupfiles")?
        .arg("-f")
        .arg(&archive_path)
        .arg("-C")
        .arg(work_dir.path().join("out"))
        .assert()
        .failure()
        .code(3);
    assert!(!work_dir.path().join("out").exists());
    Ok(())
}
