use std::error::Error;
use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn pack_creates_a_project_that_reopens() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let notes = dir.path().join("notes.md");
    let tool = dir.path().join("tool.py");
    let project = dir.path().join("site.kmol");
    fs::write(&notes, "# Intro\nbody\n")?;
    fs::write(&tool, "print('hi')\n")?;

    Command::cargo_bin("kmol")?
        .args([
            "pack",
            project.to_str().unwrap(),
            notes.to_str().unwrap(),
            tool.to_str().unwrap(),
            "--note",
            "site notes",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(format!("Wrote {}", project.display()))
                .and(predicate::str::contains("Packed 2 files into")),
        );
    assert!(project.exists());
    assert_eq!(fs::read_to_string(&notes)?, "# Intro\nbody\n");

    Command::cargo_bin("kmol")?
        .args(["tree", project.to_str().unwrap()])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\n  notes [notes.md]\n    Intro\n")
                .and(predicate::str::contains("\n  tool [tool.py]\n")),
        );

    Ok(())
}

#[test]
fn pack_refuses_to_overwrite_without_force() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let notes = dir.path().join("notes.md");
    let project = dir.path().join("site.kmol");
    fs::write(&notes, "# Intro\n")?;
    fs::write(&project, "{}")?;

    Command::cargo_bin("kmol")?
        .args(["pack", project.to_str().unwrap(), notes.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    Command::cargo_bin("kmol")?
        .args([
            "pack",
            project.to_str().unwrap(),
            notes.to_str().unwrap(),
            "--force",
        ])
        .assert()
        .success();

    Ok(())
}

#[test]
fn pack_requires_the_project_suffix() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let notes = dir.path().join("notes.md");
    fs::write(&notes, "# Intro\n")?;

    Command::cargo_bin("kmol")?
        .args([
            "pack",
            dir.path().join("site.json").to_str().unwrap(),
            notes.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must use the .kmol suffix"));

    Ok(())
}

#[test]
fn unpack_rewrites_every_file_from_the_project() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let notes = dir.path().join("notes.md");
    let project = dir.path().join("site.kmol");
    fs::write(&notes, "# Intro\nbody\n")?;

    Command::cargo_bin("kmol")?
        .args(["pack", project.to_str().unwrap(), notes.to_str().unwrap()])
        .assert()
        .success();

    fs::write(&notes, "# Intro\nedited\n")?;
    Command::cargo_bin("kmol")?
        .args(["unpack", project.to_str().unwrap()])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(format!("Wrote {}", notes.display()))
                .and(predicate::str::contains(format!("Wrote {}", project.display()))),
        );
    assert_eq!(fs::read_to_string(&notes)?, "# Intro\nedited\n");

    Command::cargo_bin("kmol")?
        .args(["unpack", notes.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a .kmol project"));

    Ok(())
}

#[test]
fn broken_container_is_an_error() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let project = dir.path().join("broken.kmol");
    fs::write(&project, "[]")?;

    Command::cargo_bin("kmol")?
        .args(["tree", project.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open"));

    Ok(())
}

#[test]
fn macros_lists_bound_headings() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let doc = dir.path().join("doc.md");
    fs::write(&doc, "# Notes\ntext\n# @build\necho build\n")?;

    Command::cargo_bin("kmol")?
        .args(["macros", doc.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("@build\tdoc->@build"));

    let plain = dir.path().join("plain.md");
    fs::write(&plain, "# Notes\n")?;
    Command::cargo_bin("kmol")?
        .args(["macros", plain.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("No macros defined in plain."));

    Ok(())
}

#[test]
fn recent_projects_are_recorded_in_the_config() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let config = dir.path().join("kmol.json");
    let doc = dir.path().join("doc.md");
    fs::write(&doc, "# A\n")?;

    Command::cargo_bin("kmol")?
        .args(["recent", "--config", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("No recent projects."));

    Command::cargo_bin("kmol")?
        .args(["tree", doc.to_str().unwrap(), "--config", config.to_str().unwrap()])
        .assert()
        .success();
    assert!(config.exists());

    Command::cargo_bin("kmol")?
        .args(["recent", "--config", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains(doc.display().to_string()));

    fs::remove_file(&doc)?;
    Command::cargo_bin("kmol")?
        .args(["recent", "--prune", "--config", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Removed 1 missing projects")
                .and(predicate::str::contains("No recent projects.")),
        );

    Ok(())
}
