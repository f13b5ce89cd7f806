//! CLI integration tests for all subcommands.
//!
//! Uses `assert_cmd` to spawn the `bookstall` binary and verify exit codes,
//! stdout content, and stderr content. Commands run from the crate root so
//! `tests/fixtures/...` paths resolve.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper: create a Command for the `bookstall` binary with a clean
/// environment for configuration.
fn bookstall() -> Command {
    let mut cmd = cargo_bin_cmd!("bookstall");
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"))
        .env_remove("BOOKSTALL_SERVICE_URL")
        .env_remove("BOOKSTALL_ANON_KEY")
        .env_remove("BOOKSTALL_ACCESS_TOKEN")
        .env_remove("BOOKSTALL_LOG");
    cmd
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).expect("stdout is JSON")
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    bookstall()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bookstall storefront client"));
}

#[test]
fn version_exits_0() {
    bookstall()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bookstall"));
}

// ──────────────────────────────────────────────
// 2. price
// ──────────────────────────────────────────────

#[test]
fn price_defaults_to_first_option_with_sale() {
    bookstall()
        .args(["price", "tests/fixtures/shirt.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Base: 80.00 USD (sale)"))
        .stdout(predicate::str::contains("Unit price: 80.00 USD"))
        .stdout(predicate::str::contains("Low stock: 3 left"));
}

#[test]
fn price_with_large_size_is_ninety() {
    bookstall()
        .args(["price", "tests/fixtures/shirt.json", "--select", "Size=L"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Size=L +10"))
        .stdout(predicate::str::contains("Unit price: 90.00 USD"));
}

#[test]
fn price_json_output() {
    let json = stdout_json(bookstall().args([
        "--output",
        "json",
        "price",
        "tests/fixtures/shirt.json",
        "--select",
        "Size=M",
    ]));
    assert_eq!(json["item_id"], "shirt");
    assert_eq!(json["sale_applied"], true);
    assert_eq!(json["unit_price"]["amount"], "85.00");
    assert_eq!(json["unit_price"]["currency"], "USD");
    assert_eq!(json["adjustments"][0]["option"], "M");
    assert_eq!(json["negative"], false);
    assert_eq!(json["low_stock"], true);
}

#[test]
fn price_unknown_option_exits_1() {
    bookstall()
        .args(["price", "tests/fixtures/shirt.json", "--select", "Size=XL"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'XL' is not an option of variation 'Size'"));
}

#[test]
fn sale_end_date_covers_the_whole_day() {
    bookstall()
        .args([
            "price",
            "tests/fixtures/summer_sale.json",
            "--as-of",
            "2025-06-30T23:30:00Z",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unit price: 15.00 EUR"));

    bookstall()
        .args([
            "price",
            "tests/fixtures/summer_sale.json",
            "--as-of",
            "2025-07-01T00:00:00Z",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unit price: 20.00 EUR"))
        .stdout(predicate::str::contains("(sale)").not());
}

#[test]
fn negative_price_is_reported_not_clamped() {
    bookstall()
        .args([
            "price",
            "tests/fixtures/negative_delta.json",
            "--select",
            "Discount=Big",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unit price: -15.00 USD"))
        .stdout(predicate::str::contains("warning: unit price is negative"));
}

#[test]
fn invalid_sale_date_exits_1() {
    bookstall()
        .args(["price", "tests/fixtures/bad_sale_date.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid sale_start_date 'June 1st'"));
}

#[test]
fn missing_item_file_exits_1() {
    bookstall()
        .args(["price", "tests/fixtures/nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error reading file"));
}

// ──────────────────────────────────────────────
// 3. total and quantity
// ──────────────────────────────────────────────

#[test]
fn total_multiplies_unit_price() {
    bookstall()
        .args([
            "total",
            "tests/fixtures/shirt.json",
            "--quantity",
            "3",
            "--select",
            "Size=L",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total: 270.00 USD"));
}

#[test]
fn total_beyond_stock_exits_1() {
    bookstall()
        .args(["total", "tests/fixtures/shirt.json", "--quantity", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "insufficient stock: requested 4, available 3",
        ));
}

#[test]
fn total_zero_quantity_exits_1() {
    bookstall()
        .args(["total", "tests/fixtures/shirt.json", "--quantity", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid quantity 0"));
}

#[test]
fn total_error_as_json() {
    let assert = bookstall()
        .args([
            "--output",
            "json",
            "total",
            "tests/fixtures/shirt.json",
            "--quantity",
            "-2",
        ])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    let line = stderr
        .lines()
        .find(|l| l.starts_with('{'))
        .expect("JSON error line");
    let json: serde_json::Value = serde_json::from_str(line).unwrap();
    assert!(json["error"].as_str().unwrap().contains("invalid quantity -2"));
}

#[test]
fn quantity_never_drops_below_one() {
    bookstall()
        .args([
            "quantity",
            "tests/fixtures/shirt.json",
            "--current",
            "1",
            "--delta",
            "-1",
        ])
        .assert()
        .success()
        .stdout("1\n");
}

#[test]
fn quantity_increment_past_stock_exits_1() {
    bookstall()
        .args([
            "quantity",
            "tests/fixtures/shirt.json",
            "--current",
            "3",
            "--delta",
            "1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("quantity stays 3"));
}

// ──────────────────────────────────────────────
// 4. location and filename
// ──────────────────────────────────────────────

#[test]
fn location_of_public_object_url() {
    let json = stdout_json(bookstall().args([
        "--output",
        "json",
        "location",
        "https://x.supabase.co/storage/v1/object/public/books/vol%202.pdf",
        "--platform",
        "https://x.supabase.co",
    ]));
    assert_eq!(json["kind"], "platform_url");
    assert_eq!(json["reference"]["bucket"], "books");
    assert_eq!(json["reference"]["path"], "vol 2.pdf");
}

#[test]
fn location_on_another_project_is_external() {
    let raw = "https://other.supabase.co/storage/v1/object/public/books/book1.pdf";
    bookstall()
        .args(["location", raw, "--platform", "https://x.supabase.co"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("external: {raw}")));
}

#[test]
fn location_platform_comes_from_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "https://x.supabase.co");
    bookstall()
        .arg("--config")
        .arg(&config)
        .args([
            "location",
            "https://x.supabase.co/storage/v1/object/public/books/book1.pdf",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("platform storage (url): books/book1.pdf"));
}

#[test]
fn location_of_external_url() {
    bookstall()
        .args(["location", "https://cdn.example.com/book1.pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("external: https://cdn.example.com/book1.pdf"));
}

#[test]
fn location_of_bare_reference() {
    bookstall()
        .args(["location", "books/shelf/a.pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("platform storage (reference): books/shelf/a.pdf"));
}

#[test]
fn filename_from_title_and_url() {
    bookstall()
        .args([
            "filename",
            "Bookkeeping 101: The Basics!",
            "--url",
            "https://cdn.example.com/a/guide.EPUB?dl=1",
        ])
        .assert()
        .success()
        .stdout("bookkeeping_101_the_basics.epub\n");
}

#[test]
fn filename_of_symbol_only_title() {
    bookstall()
        .args(["filename", "!!!"])
        .assert()
        .success()
        .stdout("document.pdf\n");
}

// ──────────────────────────────────────────────
// 5. Hosted-service commands: configuration
// ──────────────────────────────────────────────

#[test]
fn resolve_without_configuration_exits_1() {
    let dir = TempDir::new().unwrap();
    bookstall()
        .current_dir(dir.path())
        .args(["resolve", "--content", "b1", "--user", "u1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("service.url is not configured"));
}

#[test]
fn unreadable_config_path_exits_1() {
    bookstall()
        .args([
            "--config",
            "tests/fixtures/missing.toml",
            "purchase",
            "--item",
            "shirt",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read"));
}

fn write_config(dir: &Path, url: &str) -> std::path::PathBuf {
    let path = dir.join("bookstall.toml");
    fs::write(
        &path,
        format!("[service]\nurl = \"{url}\"\nanon_key = \"anon\"\ntimeout_secs = 2\n"),
    )
    .unwrap();
    path
}

#[test]
fn unreachable_service_is_reported_as_retryable() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "http://127.0.0.1:1");
    bookstall()
        .arg("--config")
        .arg(&config)
        .args(["resolve", "--content", "b1", "--user", "u1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not check your access"));
}

#[test]
fn environment_supplies_missing_settings() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bookstall.toml"), "[service]\nanon_key = \"anon\"\n").unwrap();
    bookstall()
        .current_dir(dir.path())
        .env("BOOKSTALL_SERVICE_URL", "http://127.0.0.1:1")
        .args(["download", "--content", "b1", "--user", "u1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("service.url").not());
}

#[test]
fn purchase_rejects_non_positive_quantity_before_any_request() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "http://127.0.0.1:1");
    bookstall()
        .arg("--config")
        .arg(&config)
        .args(["purchase", "--item", "shirt", "--quantity", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid quantity 0"));
}
