//! Headless page loading via a generated Playwright script

use std::process::Stdio;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

/// Text the marker element must carry for a page to count as working.
pub const EXPECTED_TEXT: &str = "hello webpack";

/// DOM element whose text content encodes the verdict.
pub const MARKER_SELECTOR: &str = "#result";

const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Drives one isolated headless browser per [`PageLoader::load`] call.
pub struct PageLoader {
    timeout_ms: u64,
}

/// The single JSON line the generated script prints before exiting.
#[derive(Debug, Deserialize)]
struct Verdict {
    ok: bool,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl PageLoader {
    pub fn new() -> HarnessResult<Self> {
        Self::check_playwright_installed()?;
        Ok(Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    fn check_playwright_installed() -> HarnessResult<()> {
        let status = std::process::Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(HarnessError::PlaywrightNotFound),
        }
    }

    /// Open `url`, wait for the marker element, and report whether its
    /// text equals [`EXPECTED_TEXT`].
    ///
    /// Navigation failures and wait timeouts are errors, not a `false`
    /// verdict: `false` means the marker appeared with the wrong text.
    /// The browser is torn down on every path.
    pub async fn load(&self, url: &str) -> HarnessResult<bool> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("load.js");
        std::fs::write(&script_path, self.build_script(url))?;

        debug!("running page check against {}", url);

        // kill_on_drop releases the script promptly when this future
        // loses a race and gets dropped; the script's own finally block
        // handles browser teardown on the normal paths.
        let output = Command::new("node")
            .arg(&script_path)
            .current_dir(temp_dir.path())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_verdict(&stdout) {
            Some(v) if v.ok => Ok(v.text.as_deref() == Some(EXPECTED_TEXT)),
            Some(v) => Err(HarnessError::Browser(
                v.error.unwrap_or_else(|| "page check failed".to_string()),
            )),
            None => Err(HarnessError::Browser(format!(
                "no verdict from browser script:\nstdout: {}\nstderr: {}",
                stdout,
                String::from_utf8_lossy(&output.stderr),
            ))),
        }
    }

    /// Build the Playwright script for one page check.
    fn build_script(&self, url: &str) -> String {
        format!(
            r#"const {{ chromium }} = require('playwright');

(async () => {{
  const browser = await chromium.launch({{ headless: true }});
  const context = await browser.newContext();
  const page = await context.newPage();
  page.setDefaultTimeout({timeout});
  page.setDefaultNavigationTimeout({timeout});
  try {{
    await page.goto('{url}');
    const marker = await page.waitForSelector('{selector}');
    const text = await marker.textContent();
    console.log(JSON.stringify({{ ok: true, text }}));
  }} catch (error) {{
    console.log(JSON.stringify({{ ok: false, error: error.message }}));
    process.exitCode = 1;
  }} finally {{
    await browser.close();
  }}
}})();
"#,
            timeout = self.timeout_ms,
            url = url,
            selector = MARKER_SELECTOR,
        )
    }
}

/// The script prints its verdict as the final JSON line on stdout; anything
/// a page logged via console ends up earlier in the stream, so scan from
/// the end.
fn parse_verdict(stdout: &str) -> Option<Verdict> {
    stdout
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str(line).ok())
}
