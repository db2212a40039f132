use super::Result;
use crate::expectation::ProcessOutput;
use eyre::{eyre, WrapErr};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Environment variable scaling every launch timeout.
pub const TIMEOUT_FACTOR_VARIABLE: &str = "TESTTIMEOUTFACTOR";

/// Configuration for launching the VM under test
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Executable to launch
    pub executable: PathBuf,
    /// Upper bound on a single launch, after scaling
    pub timeout: Duration,
    /// Extra environment variables for the process
    pub environment: HashMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("java"),
            timeout: Duration::from_secs(120),
            environment: HashMap::new(),
        }
    }
}

impl RunnerConfig {
    /// Multiplies the timeout by `TESTTIMEOUTFACTOR` when it is set.
    pub fn with_timeout_factor_from_env(mut self) -> Result<Self> {
        if let Ok(raw) = std::env::var(TIMEOUT_FACTOR_VARIABLE) {
            let factor: f64 = raw
                .trim()
                .parse()
                .map_err(|e| eyre!("Invalid {} '{}': {}", TIMEOUT_FACTOR_VARIABLE, raw, e))?;
            self.timeout = scale_timeout(self.timeout, factor)?;
        }
        Ok(self)
    }
}

fn scale_timeout(timeout: Duration, factor: f64) -> Result<Duration> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(eyre!("Timeout factor must be a positive number, got {}", factor));
    }
    Duration::try_from_secs_f64(timeout.as_secs_f64() * factor).map_err(|e| {
        eyre!(
            "Timeout of {:?} scaled by {} is out of range: {}",
            timeout,
            factor,
            e
        )
    })
}

/// Launches the VM and collects everything it printed.
///
/// Each call owns exactly one child. The child runs in its own process group
/// with stdin closed; on timeout the whole group is killed, and dropping the
/// handle on any other early return kills the child too.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    config: RunnerConfig,
}

impl ProcessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Runs the executable with `args` and waits for it to exit.
    ///
    /// # Arguments
    /// * `args` - Complete argument vector, in order
    ///
    /// # Returns
    /// * `Result<ProcessOutput>` - Captured output, or an error if the process
    ///   could not be spawned, its streams could not be read, or it timed out
    pub async fn run(&self, args: &[String]) -> Result<ProcessOutput> {
        info!("Launching {} {}", self.config.executable.display(), args.join(" "));

        let mut command = Command::new(&self.config.executable);
        command.args(args);
        command.process_group(0);
        command.kill_on_drop(true);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        for (key, value) in &self.config.environment {
            command.env(key, value);
        }

        let start = Instant::now();
        let child = command
            .spawn()
            .wrap_err_with(|| format!("Failed to spawn {}", self.config.executable.display()))?;

        let pid = match child.id() {
            Some(pid) => Pid::from_raw(pid.try_into()?),
            None => return Err(eyre!("Failed to get process ID")),
        };
        debug!("Process spawned with PID: {}", pid);

        match timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output.wrap_err("Failed to collect process output")?;
                let duration = start.elapsed();
                debug!(
                    "Process {} exited with {:?} after {:?} ({} bytes stdout, {} bytes stderr)",
                    pid,
                    output.status,
                    duration,
                    output.stdout.len(),
                    output.stderr.len()
                );
                Ok(ProcessOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    duration,
                })
            }
            Err(_) => {
                warn!("Process {} did not exit within {:?}, killing process group", pid, self.config.timeout);
                // The child itself is reaped by kill_on_drop; this takes out anything it forked.
                match killpg(pid, Signal::SIGKILL) {
                    Ok(()) | Err(nix::Error::ESRCH) => {}
                    Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
                }
                Err(eyre!(
                    "{} timed out after {:?}",
                    self.config.executable.display(),
                    self.config.timeout
                ))
            }
        }
    }
}
