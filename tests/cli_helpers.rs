#![allow(dead_code)]

use anyhow::{bail, Result};
use assert_cmd::cargo;
use serde_json::Value;
use std::process::{Command, Output};
use tempfile::TempDir;

pub fn base_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("fundledger"));
    cmd.env("HOME", home.path());
    cmd.env_remove("FUNDLEDGER_DB");
    cmd.env("RUST_LOG", "fundledger=warn");
    cmd.arg("--no-color");
    cmd
}

pub fn run_cmd(home: &TempDir, args: &[&str]) -> Result<Output> {
    let mut cmd = base_cmd(home);
    cmd.args(args);
    let output = cmd.output()?;
    if !output.status.success() {
        bail!(
            "command failed: {:?}\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(output)
}

pub fn run_cmd_json(home: &TempDir, args: &[&str]) -> Result<Value> {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let output = run_cmd(home, &full)?;
    let stdout = String::from_utf8(output.stdout)?;
    Ok(serde_json::from_str(&stdout)?)
}

fn id_of(value: &Value, key: &str) -> Result<String> {
    match value[key].as_i64() {
        Some(id) => Ok(id.to_string()),
        None => bail!("missing {} in {}", key, value),
    }
}

pub fn create_portfolio(home: &TempDir, name: &str) -> Result<String> {
    let value = run_cmd_json(home, &["portfolio", "create", name])?;
    id_of(&value, "id")
}

pub fn create_fund(home: &TempDir, name: &str, isin: &str) -> Result<String> {
    let value = run_cmd_json(home, &["fund", "create", name, "--isin", isin])?;
    id_of(&value, "id")
}

pub fn link_fund(home: &TempDir, portfolio_id: &str, fund_id: &str) -> Result<String> {
    let value = run_cmd_json(home, &["fund", "link", portfolio_id, fund_id])?;
    id_of(&value, "portfolio_fund_id")
}

pub fn trade(
    home: &TempDir,
    kind: &str,
    portfolio_fund_id: &str,
    date: &str,
    shares: &str,
    price: &str,
) -> Result<Value> {
    run_cmd_json(
        home,
        &[
            "tx",
            kind,
            portfolio_fund_id,
            "--date",
            date,
            "--shares",
            shares,
            "--price",
            price,
        ],
    )
}

pub fn set_price(home: &TempDir, fund_id: &str, date: &str, price: &str) -> Result<()> {
    run_cmd(home, &["price", "set", fund_id, "--date", date, "--price", price])?;
    Ok(())
}

pub fn summary_json(home: &TempDir, portfolio_id: &str, as_of: &str) -> Result<Value> {
    run_cmd_json(home, &["summary", "--portfolio", portfolio_id, "--as-of", as_of])
}
