use std::path::Path;

use assert_cmd::Command;
use image::{DynamicImage, ImageBuffer, Luma};
use serde_json::Value;

/// Binary run from an empty directory with no user config
fn selfheal(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("selfheal").expect("binary built");
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir)
        .env("HOME", dir)
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("command runs");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json output")
}

fn noise(x: u32, y: u32) -> u8 {
    let v = x.wrapping_mul(374_761_393) ^ y.wrapping_mul(668_265_263);
    (v.wrapping_mul(1_274_126_177) >> 24) as u8
}

fn write_fixtures(dir: &Path) {
    let patch = DynamicImage::ImageLuma8(ImageBuffer::from_fn(24, 16, |x, y| Luma([noise(x, y)])));
    patch.save(dir.join("ref.png")).expect("write reference");

    let page = DynamicImage::ImageLuma8(ImageBuffer::from_fn(120, 90, |x, y| {
        if (30..54).contains(&x) && (20..36).contains(&y) {
            Luma([noise(x - 30, y - 20)])
        } else {
            Luma([0])
        }
    }));
    page.save(dir.join("page.png")).expect("write page");
}

#[test]
fn config_show_prints_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let json = stdout_json(selfheal(dir.path()).args(["--output", "json", "config", "show"]));
    assert_eq!(json["max_attempts"], 10);
    assert_eq!(json["strategies"][0]["strategy"], "css");
    assert_eq!(json["strategies"].as_array().map(Vec::len), Some(5));
}

#[test]
fn config_check_uses_project_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("config")).expect("config dir");
    std::fs::write(
        dir.path().join("config/selfheal.yaml"),
        "strategies:\n  - strategy: text\n  - strategy: visual\n",
    )
    .expect("write config");

    let json = stdout_json(selfheal(dir.path()).args(["-o", "json", "config", "check"]));
    assert_eq!(json["valid"], true);
    assert_eq!(json["source"], "config/selfheal.yaml");
    assert_eq!(json["strategies"], serde_json::json!(["text", "visual"]));
}

#[test]
fn invalid_config_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.yaml");
    std::fs::write(&path, "max_attempts: 0\n").expect("write config");

    let output = selfheal(dir.path())
        .arg("--config")
        .arg(&path)
        .args(["config", "check"])
        .output()
        .expect("command runs");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_attempts"));
}

#[test]
fn text_sim_reports_each_measure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let json = stdout_json(selfheal(dir.path()).args([
        "-o",
        "json",
        "text-sim",
        "Submit Order",
        "submit  order",
    ]));
    assert_eq!(json["similarity"], 1.0);
    for key in ["levenshtein", "fuzzy", "jaccard", "lcs"] {
        assert!(json[key].is_number(), "missing {}", key);
    }
}

#[test]
fn locate_finds_reference_in_screenshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixtures(dir.path());

    let json = stdout_json(selfheal(dir.path()).args(["locate", "ref.png", "page.png"]));
    let regions = json.as_array().expect("region list");
    assert!(!regions.is_empty());
    assert_eq!(regions[0]["x"], 30);
    assert_eq!(regions[0]["y"], 20);
    assert!(regions[0]["score"].as_f64().expect("score") > 0.99);
}

#[test]
fn phash_and_compare() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixtures(dir.path());

    let output = selfheal(dir.path())
        .args(["phash", "ref.png"])
        .output()
        .expect("command runs");
    assert!(output.status.success());
    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert_eq!(hash.len(), 16);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));

    let json = stdout_json(selfheal(dir.path()).args(["compare", "ref.png", "ref.png"]));
    assert!((json["combined"].as_f64().expect("combined") - 1.0).abs() < 1e-9);
}
