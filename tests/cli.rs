use std::path::Path;

use assert_cmd::Command;
use image::imageops::replace;
use image::{GrayImage, Luma};
use predicates::prelude::*;

use whiteboard_warp::DICT_4X4_50;

fn bin() -> Command {
    Command::cargo_bin("whiteboard-warp").unwrap()
}

fn write_sheet(path: &Path) {
    let mut canvas = GrayImage::from_pixel(480, 360, Luma([255]));
    for (id, x, y) in [(2, 40, 40), (0, 360, 40), (3, 40, 250), (1, 360, 250)] {
        let marker = DICT_4X4_50.render_marker(id, 12).unwrap();
        replace(&mut canvas, &marker, x, y);
    }
    canvas.save(path).unwrap();
}

#[test]
fn test_no_arguments_prints_usage() {
    bin()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_help_exits_cleanly() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--horizontal"));
}

#[test]
fn test_bad_arguments_exit_3() {
    bin().arg("--bogus").assert().code(3);
    bin().args(["-h", "0"]).assert().code(3);
    bin().args(["-h", "1"]).assert().code(3);
    bin().args(["-v", "1"]).assert().code(3);
    bin().args(["-v", "tall"]).assert().code(3);
}

#[test]
fn test_unreadable_input_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    bin()
        .args(["-i"])
        .arg(dir.path().join("nope.png"))
        .args(["-o"])
        .arg(dir.path().join("out.png"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_blank_image_exits_4_silently() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("blank.png");
    let output = dir.path().join("out.png");
    GrayImage::from_pixel(120, 90, Luma([255]))
        .save(&input)
        .unwrap();

    bin()
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .code(4)
        .stdout(predicate::str::contains("Input"))
        .stderr(predicate::str::contains("Error").not());
    assert!(!output.exists());
}

#[test]
fn test_rectifies_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sheet.png");
    let output = dir.path().join("flat.png");
    let view = dir.path().join("markers.png");
    write_sheet(&input);

    bin()
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-h", "200", "-v", "150", "--markers-out"])
        .arg(&view)
        .assert()
        .success()
        .stdout(predicate::str::contains("Horizontal resolution 200"))
        .stdout(predicate::str::contains("Vertical resolution 150"));

    let flat = image::open(&output).unwrap();
    assert_eq!((flat.width(), flat.height()), (200, 150));
    assert!(view.exists());
}

#[test]
fn test_malformed_params_file_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sheet.png");
    let params = dir.path().join("params.json");
    write_sheet(&input);
    std::fs::write(&params, "{ \"adaptive_thresh_win_size_min\": \"three\" }").unwrap();

    bin()
        .arg("-i")
        .arg(&input)
        .arg("-p")
        .arg(&params)
        .arg("-o")
        .arg(dir.path().join("out.png"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("parameters"));
}

#[test]
fn test_missing_corner_marker_exits_5() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("wrong.png");
    let mut canvas = GrayImage::from_pixel(480, 360, Luma([255]));
    for (id, x, y) in [(2, 40, 40), (0, 360, 40), (3, 40, 250), (9, 360, 250)] {
        let marker = DICT_4X4_50.render_marker(id, 12).unwrap();
        replace(&mut canvas, &marker, x, y);
    }
    canvas.save(&input).unwrap();

    bin()
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(dir.path().join("out.png"))
        .assert()
        .code(5)
        .stderr(predicate::str::contains("bottom-right"));
}
