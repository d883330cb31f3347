//! Shared helpers for integration tests.
#![allow(dead_code)]

use member_runner::{LauncherConfig, MemberRunner, ProcessRecord, RunnerConfig};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Launcher running `script` through `/bin/sh -c`.
///
/// The runner's own flags arrive as positional parameters (`$@`).
pub fn sh_launcher(script: &str) -> LauncherConfig {
    LauncherConfig {
        command: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), script.to_string(), "member".to_string()],
        env: HashMap::new(),
    }
}

/// A member that prints its arguments and then idles until signalled.
pub const IDLE_MEMBER: &str = r#"echo "member $MEMBER_ID args: $*"; exec sleep 30"#;

/// A member that prints `line 1` .. `line 1000` and then idles.
pub const CHATTY_MEMBER: &str =
    r#"i=1; while [ $i -le 1000 ]; do echo "line $i"; i=$((i+1)); done; exec sleep 30"#;

pub fn runner(home: &Path, script: &str) -> MemberRunner {
    MemberRunner::new(RunnerConfig::new(home, sh_launcher(script))).unwrap()
}

pub fn record(identity: &str, pid: u32, home: &Path) -> ProcessRecord {
    let workspace = home.join(identity);
    ProcessRecord::new(
        identity,
        pid,
        &workspace,
        workspace.join("logging.properties"),
        workspace.join("logs/member.log"),
    )
}

/// Poll `tail_logs` until at least `lines` lines are present.
pub async fn wait_for_lines(runner: &MemberRunner, identity: &str, lines: usize) -> Vec<String> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if let Ok(found) = runner.tail_logs(identity, lines).await {
            if found.len() >= lines {
                return found;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {} log lines from {}",
            lines,
            identity
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Stop every registered member, ignoring failures.
pub async fn stop_all(runner: &MemberRunner) {
    if let Ok(identities) = runner.identities() {
        for identity in identities {
            let _ = runner.stop(&identity).await;
        }
    }
}
