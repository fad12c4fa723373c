//! Scoped lifetime for a locally managed model server.
//!
//! [`ModelServerGuard`] starts the server, waits for it to answer its
//! health check, and stops it when dropped. Shutdown sends SIGINT first
//! and escalates to a kill once the grace period runs out.

use crate::config::ModelServerSettings;
use crate::error::{DigestError, Result};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(250);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Running model server, stopped on drop.
#[derive(Debug)]
pub struct ModelServerGuard {
    child: Option<Child>,
    grace: Duration,
}

impl ModelServerGuard {
    /// Spawn the configured command and wait until it is healthy.
    pub async fn start(settings: &ModelServerSettings) -> Result<Self> {
        info!(command = %settings.command, args = ?settings.args, "Starting model server");

        let child = Command::new(&settings.command)
            .args(&settings.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DigestError::ModelServer(format!("'{}' not found in PATH", settings.command))
                } else {
                    DigestError::ModelServer(format!("failed to start '{}': {}", settings.command, e))
                }
            })?;

        let mut guard = Self {
            child: Some(child),
            grace: Duration::from_secs(settings.shutdown_grace_seconds),
        };

        // On any error below the guard drops and stops the process.
        guard
            .wait_until_healthy(
                &settings.health_url,
                Duration::from_secs(settings.startup_timeout_seconds),
            )
            .await?;

        info!(pid = guard.pid(), "Model server is ready");
        Ok(guard)
    }

    async fn wait_until_healthy(&mut self, health_url: &str, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(status) = self.child.as_mut().and_then(|c| c.try_wait().ok().flatten()) {
                return Err(DigestError::ModelServer(format!(
                    "server exited during startup ({})",
                    status
                )));
            }

            match client.get(health_url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => debug!(status = %resp.status(), "Model server not ready yet"),
                Err(e) => debug!(error = %e, "Model server not reachable yet"),
            }

            if Instant::now() >= deadline {
                return Err(DigestError::ModelServer(format!(
                    "{} did not become healthy within {:?}",
                    health_url, timeout
                )));
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Stop the server now instead of at drop.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }

        let pid = child.id();
        info!(pid, "Stopping model server");
        send_interrupt(pid);

        let deadline = Instant::now() + self.grace;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(pid, %status, "Model server exited");
                    return;
                }
                Ok(None) if Instant::now() < deadline => std::thread::sleep(EXIT_POLL_INTERVAL),
                _ => break,
            }
        }

        warn!(pid, "Model server ignored SIGINT, killing");
        if let Err(e) = child.kill() {
            warn!(pid, error = %e, "Failed to kill model server");
        }
        let _ = child.wait();
    }
}

impl Drop for ModelServerGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(unix)]
fn send_interrupt(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "PID out of range, cannot send SIGINT");
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGINT) {
        warn!(pid, error = %e, "Could not send SIGINT");
    }
}

#[cfg(not(unix))]
fn send_interrupt(_pid: u32) {}
