use crate::integration::infrastructure::FakeVm;
use anyhow::{Context, Result};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

async fn run_binary(args: &[&str]) -> Result<Output> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vmoptcheck"));
    cmd.args(args)
        .env_remove("TESTVMOPTS")
        .env_remove("TESTJAVAOPTS")
        .env_remove("TESTJAVA")
        .env_remove("TESTTIMEOUTFACTOR")
        .env_remove("RUST_LOG")
        .kill_on_drop(true);

    timeout(Duration::from_secs(60), cmd.output())
        .await
        .context("vmoptcheck did not finish")?
        .context("Failed to run vmoptcheck")
}

#[tokio::test]
async fn test_binary_passes_conforming_vm() -> Result<()> {
    let java = FakeVm::Conforming.path();
    let output = run_binary(&["--java", java.to_str().context("non-UTF-8 path")?]).await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("8 checks passed"));
    Ok(())
}

#[tokio::test]
async fn test_binary_reports_assertion_failure() -> Result<()> {
    let java = FakeVm::Lenient.path();
    let output = run_binary(&["--java", java.to_str().context("non-UTF-8 path")?]).await?;

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not-power-of-two"));
    Ok(())
}

#[tokio::test]
async fn test_binary_reports_harness_error() -> Result<()> {
    let output = run_binary(&["--java", "/nonexistent/bin/java"]).await?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}

#[tokio::test]
async fn test_binary_rejects_bad_baseline() -> Result<()> {
    let output = run_binary(&["--object-alignment", "12", "--list"]).await?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}

#[tokio::test]
async fn test_binary_lists_checks() -> Result<()> {
    let output = run_binary(&["--list"]).await?;
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let names: Vec<_> = stdout
        .lines()
        .filter_map(|line| line.split('\t').next())
        .collect();
    assert_eq!(
        names,
        vec![
            "experimental-gate",
            "unlocked",
            "too-small",
            "not-power-of-two",
            "accepted",
            "readback-32",
            "readback-64",
            "readback-128",
        ]
    );
    Ok(())
}
