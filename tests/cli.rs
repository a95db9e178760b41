use std::path::Path;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use opencv::core::{CV_8UC3, Mat, Scalar, Vector};
use opencv::imgcodecs;
use predicates::prelude::*;
use rstest::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

/// 生成一张纯色图片，颜色为 BGR
fn write_image(path: &Path, bgr: (f64, f64, f64)) -> Result<()> {
    let img = Mat::new_rows_cols_with_default(48, 64, CV_8UC3, Scalar::new(bgr.0, bgr.1, bgr.2, 0.))?;
    imgcodecs::imwrite(&path.to_string_lossy(), &img, &Vector::new())?;
    Ok(())
}

/// 三个物品：red、green、blue，每个物品两张颜色相近的图片
#[fixture]
fn dataset() -> assert_fs::TempDir {
    let dir = assert_fs::TempDir::new().unwrap();
    let items = [("red", (0., 0., 250.)), ("green", (0., 250., 0.)), ("blue", (250., 0., 0.))];
    for (name, (b, g, r)) in items {
        let item = dir.child(name);
        item.create_dir_all().unwrap();
        write_image(item.child("1.png").path(), (b, g, r)).unwrap();
        write_image(item.child("2.jpg").path(), (b + 5., g + 5., r + 5.)).unwrap();
    }
    dir.child("red/readme.txt").write_str("skip me").unwrap();
    dir
}

#[rstest]
fn add_and_search(dataset: assert_fs::TempDir) -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;
    let query = conf_dir.child("query.png");
    write_image(query.path(), (10., 245., 10.))?;

    cargo_run!("imgrec", "-c", conf_dir.path(), "add", dataset.path()).success();

    cargo_run!("imgrec", "-c", conf_dir.path(), "search", query.path(), "--count", "1")
        .success()
        .stdout(predicate::str::contains("green"))
        .stdout(predicate::str::contains("red").not());

    cargo_run!("imgrec", "-c", conf_dir.path(), "status")
        .success()
        .stdout(predicate::str::contains("\"ready\""))
        .stdout(predicate::str::contains("\"vector_count\": 6"));

    Ok(())
}

#[rstest]
fn search_json(dataset: assert_fs::TempDir) -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;
    cargo_run!("imgrec", "-c", conf_dir.path(), "add", dataset.path()).success();

    let red = dataset.child("red/1.png");
    cargo_run!("imgrec", "-c", conf_dir.path(), "search", red.path(), "--output-format", "json")
        .success()
        .stdout(predicate::str::contains("\"item_id\": \"red\""))
        .stdout(predicate::str::contains("\"distance\": 0.0"));

    Ok(())
}

#[rstest]
fn remove_item(dataset: assert_fs::TempDir) -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;
    cargo_run!("imgrec", "-c", conf_dir.path(), "add", dataset.path()).success();
    cargo_run!("imgrec", "-c", conf_dir.path(), "remove", "red").success();

    let red = dataset.child("red/1.png");
    cargo_run!("imgrec", "-c", conf_dir.path(), "search", red.path(), "--count", "10")
        .success()
        .stdout(predicate::str::contains("red").not());

    cargo_run!("imgrec", "-c", conf_dir.path(), "items")
        .success()
        .stdout(predicate::str::contains("blue"))
        .stdout(predicate::str::contains("red").not());

    cargo_run!("imgrec", "-c", conf_dir.path(), "remove", "red").failure();

    Ok(())
}

#[rstest]
fn remove_image(dataset: assert_fs::TempDir) -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;
    cargo_run!("imgrec", "-c", conf_dir.path(), "add", dataset.path()).success();
    cargo_run!("imgrec", "-c", conf_dir.path(), "remove", "blue", "--image", "1.png").success();

    cargo_run!("imgrec", "-c", conf_dir.path(), "status")
        .success()
        .stdout(predicate::str::contains("\"vector_count\": 5"))
        .stdout(predicate::str::contains("\"item_count\": 3"));

    Ok(())
}

#[rstest]
fn export(dataset: assert_fs::TempDir) -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;
    let output = conf_dir.child("out.npy");
    cargo_run!("imgrec", "-c", conf_dir.path(), "add", dataset.path(), "--thumb-size", "4").success();
    cargo_run!("imgrec", "-c", conf_dir.path(), "export", "-o", output.path()).success();

    output.assert(predicate::path::is_file());
    conf_dir.child("out.json").assert(predicate::str::contains("green"));

    Ok(())
}

#[test]
fn empty_index() -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;
    let query = conf_dir.child("query.png");
    write_image(query.path(), (1., 2., 3.))?;

    cargo_run!("imgrec", "-c", conf_dir.path(), "search", query.path())
        .success()
        .stdout(predicate::str::is_empty());
    cargo_run!("imgrec", "-c", conf_dir.path(), "status")
        .success()
        .stdout(predicate::str::contains("\"empty\""));

    Ok(())
}
