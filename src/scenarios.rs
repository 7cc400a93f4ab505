//! Scenario executors: one pass/fail check per bundler/runtime combination

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::warn;

use crate::browser::{PageLoader, EXPECTED_TEXT};
use crate::error::{HarnessError, HarnessResult};
use crate::process::{run_captured, run_logged, ToolHandle};
use crate::server::{find_free_port, StaticServer};

/// How long a spawned dev/preview server gets to open its socket.
const SERVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Which executor a scenario runs. The catalog in [`crate::matrix`] maps
/// consumer templates onto these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    /// webpack production build, then serve `dist/` and load the page.
    WebpackBuild,
    /// Vite dev server on a discovered port, load the page against it.
    ViteDev,
    /// Vite production build, then `vite preview` and load the page.
    ViteBuild,
    /// Run the package's entry script under Node and compare stdout.
    NodeModule,
}

impl ScenarioKind {
    pub async fn run(&self, project: &Path) -> HarnessResult<()> {
        match self {
            ScenarioKind::WebpackBuild => webpack_build(project).await,
            ScenarioKind::ViteDev => vite_dev(project).await,
            ScenarioKind::ViteBuild => vite_build(project).await,
            ScenarioKind::NodeModule => node_module(project).await,
        }
    }
}

/// Build with webpack, serve the output directory ourselves, and race the
/// page verdict against the server falling over. Whichever settles first
/// wins; a dead server while the load is pending is a failure regardless
/// of what the page would eventually have said.
async fn webpack_build(project: &Path) -> HarnessResult<()> {
    run_logged("webpack", "npm", &["run", "build"], project).await?;

    let port = find_free_port()?;
    let mut server = StaticServer::start(&project.join("dist"), port).await?;
    let url = server.url().to_string();

    let loader = PageLoader::new()?;
    let verdict = race_page_check(loader.load(&url), &mut server).await;

    // The losing branch was dropped; release the socket either way.
    server.close();

    check_page_verdict(verdict?)
}

/// First of {page verdict, server death} to settle wins. A server that
/// dies while the check is still pending is the failure, regardless of
/// what the page would eventually have said; the loser is dropped and its
/// resources are released by the caller's cleanup step.
async fn race_page_check(
    check: impl Future<Output = HarnessResult<bool>>,
    server: &mut StaticServer,
) -> HarnessResult<bool> {
    tokio::select! {
        v = check => v,
        _ = server.closed() => Err(HarnessError::ServerDied),
    }
}

/// Spawn the Vite dev server on a discovered port and load the page
/// against it. The server process is terminated on every path.
async fn vite_dev(project: &Path) -> HarnessResult<()> {
    let port = find_free_port()?;
    let port_arg = port.to_string();
    let server = ToolHandle::spawn(
        "vite",
        "npm",
        &["run", "dev", "--", "--port", &port_arg, "--strictPort"],
        project,
    )?;

    let url = format!("http://127.0.0.1:{}", port);
    let verdict = load_once_reachable(&url).await;

    server.stop().await;
    check_page_verdict(verdict?)
}

/// Run the Vite production build to completion, then check the bundle
/// through `vite preview`. A failed build aborts before any server spawns.
async fn vite_build(project: &Path) -> HarnessResult<()> {
    run_logged("vite", "npm", &["run", "build"], project).await?;

    let port = find_free_port()?;
    let port_arg = port.to_string();
    let server = ToolHandle::spawn(
        "vite",
        "npm",
        &["run", "preview", "--", "--port", &port_arg, "--strictPort"],
        project,
    )?;

    let url = format!("http://127.0.0.1:{}", port);
    let verdict = load_once_reachable(&url).await;

    server.stop().await;
    check_page_verdict(verdict?)
}

/// Execute the package entry script under Node and compare the captured
/// stdout byte-for-byte against the expected success line.
async fn node_module(project: &Path) -> HarnessResult<()> {
    let stdout = run_captured("node", "node", &["index.js"], project).await?;

    if module_output_matches(&stdout) {
        Ok(())
    } else {
        Err(HarnessError::WrongModuleOutput(
            String::from_utf8_lossy(&stdout).into_owned(),
        ))
    }
}

fn check_page_verdict(ok: bool) -> HarnessResult<()> {
    if ok {
        Ok(())
    } else {
        Err(HarnessError::WrongPageText)
    }
}

fn module_output_matches(stdout: &[u8]) -> bool {
    stdout == format!("{}\n", EXPECTED_TEXT).as_bytes()
}

/// Poll until the spawned server answers on its socket, then run the page
/// check. Any HTTP response counts as reachable, since Vite serves errors
/// long before the app is ready to judge.
async fn load_once_reachable(url: &str) -> HarnessResult<bool> {
    wait_for_server(url, SERVER_STARTUP_TIMEOUT).await?;
    PageLoader::new()?.load(url).await
}

async fn wait_for_server(url: &str, timeout: Duration) -> HarnessResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = Instant::now();
    while start.elapsed() < timeout {
        match client.get(url).send().await {
            Ok(_) => return Ok(()),
            Err(e) => {
                // Connection refused is expected while the server starts.
                if !e.is_connect() {
                    warn!("readiness check error: {}", e);
                }
            }
        }
        sleep(Duration::from_millis(100)).await;
    }

    Err(HarnessError::ServerUnreachable(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_output_must_match_byte_for_byte() {
        assert!(module_output_matches(b"hello webpack\n"));
        assert!(!module_output_matches(b"hello webpack"));
        assert!(!module_output_matches(b"hello webpack\n\n"));
        assert!(!module_output_matches(b"goodbye webpack\n"));
    }

    #[test]
    fn wrong_page_text_is_a_failure_not_a_panic() {
        assert!(check_page_verdict(true).is_ok());
        assert!(matches!(
            check_page_verdict(false),
            Err(HarnessError::WrongPageText)
        ));
    }

    #[tokio::test]
    async fn server_death_mid_check_settles_as_server_died() {
        let dir = tempfile::tempdir().unwrap();
        let port = find_free_port().unwrap();
        let mut server = StaticServer::start(dir.path(), port).await.unwrap();

        // Kill the server, then race it against a check that never
        // settles: the death must win.
        server.close();
        let verdict = race_page_check(std::future::pending(), &mut server).await;

        assert!(matches!(verdict, Err(HarnessError::ServerDied)));
    }

    #[tokio::test]
    async fn page_verdict_wins_while_server_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let port = find_free_port().unwrap();
        let mut server = StaticServer::start(dir.path(), port).await.unwrap();

        let verdict = race_page_check(async { Ok(true) }, &mut server).await;
        assert!(verdict.unwrap());

        server.close();
    }

    #[tokio::test]
    async fn unreachable_server_times_out() {
        // Nothing listens on this port; use a short bound to keep the
        // test quick.
        let port = find_free_port().unwrap();
        let url = format!("http://127.0.0.1:{}", port);
        let err = wait_for_server(&url, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::ServerUnreachable(_)));
    }
}
