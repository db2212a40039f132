use crate::integration::infrastructure::{harness_for, FakeVm};
use anyhow::{anyhow, Context, Result};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::time::{Duration, Instant};
use vmoptcheck::flags::{experimental_option_error_pattern, prepare_numeric_flag, UNLOCK_EXPERIMENTAL_VM_OPTIONS};
use vmoptcheck::{AssertionFailure, BaseOptions, Check, ExitCode, ExpectationSet, Invocation, SuiteConfig};

const TIMEOUT: Duration = Duration::from_secs(30);

fn checks() -> Result<Vec<Check>> {
    SuiteConfig::default()
        .checks(&BaseOptions::new())
        .map_err(|e| anyhow!("{:?}", e))
}

/// Runs the named startup check against the given VM.
async fn run_named(vm: FakeVm, name: &str) -> Result<std::result::Result<(), AssertionFailure>> {
    let harness = harness_for(vm, TIMEOUT)?;
    let checks = checks()?;
    let scenario = match checks.iter().find(|check| check.name() == name) {
        Some(Check::Startup(scenario)) => scenario.clone(),
        _ => return Err(anyhow!("no startup check named {}", name)),
    };

    match harness.verify_startup(&scenario.expectations, &scenario.invocation).await {
        Ok(_) => Ok(Ok(())),
        Err(e) => match e.downcast_ref::<AssertionFailure>() {
            Some(failure) => Ok(Err(failure.clone())),
            None => Err(anyhow!("harness error: {:?}", e)),
        },
    }
}

#[tokio::test]
async fn test_locked_experimental_option_fails_startup() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    assert_eq!(run_named(FakeVm::Conforming, "experimental-gate").await?, Ok(()));
    Ok(())
}

#[tokio::test]
async fn test_unlocked_experimental_option_starts() -> Result<()> {
    assert_eq!(run_named(FakeVm::Conforming, "unlocked").await?, Ok(()));
    Ok(())
}

#[tokio::test]
async fn test_too_small_value_fails_startup() -> Result<()> {
    assert_eq!(run_named(FakeVm::Conforming, "too-small").await?, Ok(()));
    Ok(())
}

#[tokio::test]
async fn test_non_power_of_two_fails_startup() -> Result<()> {
    assert_eq!(run_named(FakeVm::Conforming, "not-power-of-two").await?, Ok(()));
    Ok(())
}

#[tokio::test]
async fn test_accepted_value_starts_cleanly() -> Result<()> {
    assert_eq!(run_named(FakeVm::Conforming, "accepted").await?, Ok(()));
    Ok(())
}

#[tokio::test]
async fn test_lenient_vm_is_caught() -> Result<()> {
    // 127 is above the baseline, so a VM without the power-of-2 check starts fine
    let outcome = run_named(FakeVm::Lenient, "not-power-of-two").await?;
    assert!(matches!(outcome, Err(AssertionFailure::MissingPattern { .. })));
    Ok(())
}

#[tokio::test]
async fn test_gate_message_without_unlock() -> Result<()> {
    let harness = harness_for(FakeVm::Conforming, TIMEOUT)?;
    let gate = experimental_option_error_pattern("SurvivorAlignmentInBytes");

    // Without the unlock switch at all, the gate message must appear and the
    // forbidding expectation must name it.
    let invocation = Invocation::new().arg(prepare_numeric_flag("SurvivorAlignmentInBytes", 64));
    let expectations = ExpectationSet::new(ExitCode::Ok)
        .must_not_match(&gate)
        .map_err(|e| anyhow!("{:?}", e))?;
    let err = harness
        .verify_startup(&expectations, &invocation)
        .await
        .expect_err("locked option must be rejected");
    match err.downcast_ref::<AssertionFailure>() {
        Some(AssertionFailure::ForbiddenPattern { line, .. }) => {
            assert!(line.contains("is experimental"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // Last flag wins: unlocking after locking lets the VM start.
    let invocation = Invocation::new()
        .arg("-XX:-UnlockExperimentalVMOptions")
        .arg(UNLOCK_EXPERIMENTAL_VM_OPTIONS)
        .arg(prepare_numeric_flag("SurvivorAlignmentInBytes", 64));
    let output = harness
        .verify_startup(&ExpectationSet::new(ExitCode::Ok), &invocation)
        .await
        .map_err(|e| anyhow!("{:?}", e))?;
    assert_eq!(output.code(), Some(0));
    Ok(())
}

#[tokio::test]
async fn test_stdout_only_misses_stderr_diagnostics() -> Result<()> {
    let harness = harness_for(FakeVm::Conforming, TIMEOUT)?;
    let invocation = Invocation::new()
        .arg(UNLOCK_EXPERIMENTAL_VM_OPTIONS)
        .arg(prepare_numeric_flag("SurvivorAlignmentInBytes", 127));
    let expectations = ExpectationSet::new(ExitCode::Fail)
        .must_match(".*must be power of 2.*")
        .map_err(|e| anyhow!("{:?}", e))?
        .stdout_only(true);

    let err = harness
        .verify_startup(&expectations, &invocation)
        .await
        .expect_err("diagnostic is on stderr");
    assert!(matches!(
        err.downcast_ref::<AssertionFailure>(),
        Some(AssertionFailure::MissingPattern { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_hanging_vm_times_out() -> Result<()> {
    let harness = harness_for(FakeVm::Hanging, Duration::from_millis(500))?;
    let start = Instant::now();

    let err = harness
        .verify_startup(&ExpectationSet::new(ExitCode::Ok), &Invocation::new())
        .await
        .expect_err("hanging VM must time out");

    assert!(err.downcast_ref::<AssertionFailure>().is_none());
    assert!(err.to_string().contains("timed out"));
    assert!(start.elapsed() < Duration::from_secs(10));
    Ok(())
}

// Exited processes count as gone even before init reaps them.
fn is_running(pid: Pid) -> bool {
    if kill(pid, None).is_err() {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => !stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}

#[tokio::test]
async fn test_timeout_kills_grandchildren() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pid_file = dir.path().join("grandchild.pid");
    let harness = harness_for(FakeVm::Forking, Duration::from_secs(1))?;
    let invocation = Invocation::new().arg(pid_file.to_str().context("non-UTF-8 temp path")?);

    let err = harness
        .verify_startup(&ExpectationSet::new(ExitCode::Ok), &invocation)
        .await
        .expect_err("forking VM must time out");
    assert!(err.downcast_ref::<AssertionFailure>().is_none());
    assert!(err.to_string().contains("timed out"));

    let pid: i32 = std::fs::read_to_string(&pid_file)
        .context("grandchild PID was not written")?
        .trim()
        .parse()?;
    let grandchild = Pid::from_raw(pid);

    let deadline = Instant::now() + Duration::from_secs(5);
    while is_running(grandchild) {
        assert!(
            Instant::now() < deadline,
            "grandchild {} outlived the launch timeout",
            grandchild
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    Ok(())
}

#[tokio::test]
async fn test_missing_launcher_is_harness_error() -> Result<()> {
    let runner = vmoptcheck::ProcessRunner::new(vmoptcheck::RunnerConfig {
        executable: "/nonexistent/bin/java".into(),
        timeout: TIMEOUT,
        ..Default::default()
    });
    let harness = vmoptcheck::ProcessAssertionHarness::new(runner).map_err(|e| anyhow!("{:?}", e))?;

    let err = harness
        .verify_startup(&ExpectationSet::new(ExitCode::Ok), &Invocation::new())
        .await
        .expect_err("spawn must fail");
    assert!(err.downcast_ref::<AssertionFailure>().is_none());
    Ok(())
}
