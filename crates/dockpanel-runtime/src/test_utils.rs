//! Helpers for tests that talk to a live Docker daemon.
use crate::DockerRuntime;
use std::process::Command;

/// `docker info` succeeds from this host.
pub fn has_docker() -> bool {
    Command::new("docker")
        .arg("info")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// A connected runtime, or `None` when the daemon does not answer a ping.
pub async fn live_runtime() -> Option<DockerRuntime> {
    DockerRuntime::connect().await.ok()
}

/// Return early from a test when no daemon is reachable.
#[macro_export]
macro_rules! require_docker {
    () => {
        $crate::require_docker!(())
    };
    ($ret:expr) => {
        if !$crate::test_utils::has_docker() {
            eprintln!("Test ignored: Docker not available");
            return $ret;
        }
    };
}
