//! The test matrix: consumer-project catalog, filter resolution, and the
//! sequential fail-fast runner

use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::{HarnessError, HarnessResult};
use crate::scenarios::ScenarioKind;
use crate::stage::StagedProject;

/// One executable check against a staged copy of a test case.
///
/// Unnamed scenarios are identified by their parent case's directory.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: Option<&'static str>,
    pub kind: ScenarioKind,
}

/// One consumer-project template paired with its ordered scenarios.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub directory: &'static str,
    pub scenarios: Vec<Scenario>,
}

/// The fixed catalog of consumer projects, built once at startup and
/// injected into the runner.
pub fn catalog() -> Vec<TestCase> {
    vec![
        TestCase {
            directory: "webpack",
            scenarios: vec![Scenario {
                name: None,
                kind: ScenarioKind::WebpackBuild,
            }],
        },
        TestCase {
            directory: "vite",
            scenarios: vec![
                Scenario {
                    name: Some("vite-dev"),
                    kind: ScenarioKind::ViteDev,
                },
                Scenario {
                    name: Some("vite-build"),
                    kind: ScenarioKind::ViteBuild,
                },
            ],
        },
        TestCase {
            directory: "node-cjs",
            scenarios: vec![Scenario {
                name: None,
                kind: ScenarioKind::NodeModule,
            }],
        },
        TestCase {
            directory: "node-esm",
            scenarios: vec![Scenario {
                name: None,
                kind: ScenarioKind::NodeModule,
            }],
        },
    ]
}

/// Resolve a command-line filter against the catalog.
///
/// A filter matches a case directory first (keeping that case's full
/// scenario list, in order), then an individual scenario name (keeping
/// just that scenario within its parent case). An unmatched filter is a
/// configuration error, raised before anything is staged. No filter
/// selects the whole catalog.
pub fn select(catalog: &[TestCase], filter: Option<&str>) -> HarnessResult<Vec<TestCase>> {
    let filter = match filter {
        None => return Ok(catalog.to_vec()),
        Some(f) => f,
    };

    if let Some(case) = catalog.iter().find(|c| c.directory == filter) {
        return Ok(vec![case.clone()]);
    }

    for case in catalog {
        if let Some(scenario) = case.scenarios.iter().find(|s| s.name == Some(filter)) {
            return Ok(vec![TestCase {
                directory: case.directory,
                scenarios: vec![scenario.clone()],
            }]);
        }
    }

    Err(HarnessError::UnknownFilter(filter.to_string()))
}

/// Drives the selected cases strictly in order, one scenario at a time.
pub struct MatrixRunner {
    catalog: Vec<TestCase>,
    consumers_dir: PathBuf,
}

impl MatrixRunner {
    pub fn new(catalog: Vec<TestCase>, consumers_dir: PathBuf) -> Self {
        Self {
            catalog,
            consumers_dir,
        }
    }

    /// Run every selected scenario against a fresh staged copy of its
    /// template with the packed artifact installed.
    ///
    /// A successful scenario deletes its staged directory before the next
    /// one begins. Any failure keeps the staged directory on disk for
    /// post-mortem inspection, logs its path, and halts the run; nothing
    /// after it executes.
    pub async fn run(&self, filter: Option<&str>, artifact: &Path) -> HarnessResult<()> {
        let selected = select(&self.catalog, filter)?;

        for case in &selected {
            let template = self.consumers_dir.join(case.directory);

            for scenario in &case.scenarios {
                let label = scenario.name.unwrap_or(case.directory);
                banner(label);

                let staged = StagedProject::stage(&template)?;
                let outcome = async {
                    staged.install(artifact).await?;
                    scenario.kind.run(staged.path()).await
                }
                .await;

                match outcome {
                    Ok(()) => {
                        staged.cleanup()?;
                        info!("✓ {}", label);
                    }
                    Err(e) => {
                        let kept = staged.keep();
                        error!("✗ {}: {}", label, e);
                        error!("staged project kept for inspection: {}", kept.display());
                        return Err(e);
                    }
                }
            }
        }

        info!("all selected scenarios passed");
        Ok(())
    }
}

fn banner(label: &str) {
    info!("============================================");
    info!("  running test: {}", label);
    info!("============================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn case_directories_are_distinct() {
        let catalog = catalog();
        let dirs: HashSet<_> = catalog.iter().map(|c| c.directory).collect();
        assert_eq!(dirs.len(), catalog.len());
    }

    #[test]
    fn scenario_names_are_distinct_within_a_case() {
        for case in catalog() {
            let names: Vec<_> = case.scenarios.iter().filter_map(|s| s.name).collect();
            let unique: HashSet<_> = names.iter().collect();
            assert_eq!(unique.len(), names.len(), "case {}", case.directory);
        }
    }

    #[test]
    fn no_filter_selects_everything_in_order() {
        let catalog = catalog();
        let selected = select(&catalog, None).unwrap();
        let dirs: Vec<_> = selected.iter().map(|c| c.directory).collect();
        assert_eq!(dirs, vec!["webpack", "vite", "node-cjs", "node-esm"]);
    }

    #[test]
    fn case_filter_keeps_the_full_scenario_list() {
        let selected = select(&catalog(), Some("vite")).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].directory, "vite");
        let names: Vec<_> = selected[0].scenarios.iter().map(|s| s.name).collect();
        assert_eq!(names, vec![Some("vite-dev"), Some("vite-build")]);
    }

    #[test]
    fn scenario_filter_selects_exactly_one_within_its_case() {
        let selected = select(&catalog(), Some("vite-build")).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].directory, "vite");
        assert_eq!(selected[0].scenarios.len(), 1);
        assert_eq!(selected[0].scenarios[0].name, Some("vite-build"));
    }

    #[test]
    fn unmatched_filter_is_a_config_error() {
        let err = select(&catalog(), Some("parcel")).unwrap_err();
        assert!(matches!(err, HarnessError::UnknownFilter(_)));
    }
}
