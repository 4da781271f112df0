//! Project scaffolding for `walnut init`

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use walnut_core::Settings;

pub const CONFIG_FILE: &str = "config/walnut.toml";

const DIRECTORIES: [&str; 5] = [
    "config",
    "inputData",
    "output/logs",
    "output/reports",
    "suites",
];

const EXAMPLE_SUITE: &str = "suites/example.yaml";

const EXAMPLE_SUITE_BODY: &str = r#"name: Example
tests:
  - name: Open home page
    tags: [smoke]
    steps:
      - action: navigate
        url: https://example.com/
      - action: assert_title
        contains: Example
"#;

#[derive(Debug, Default, Serialize)]
pub struct Scaffold {
    pub created: Vec<PathBuf>,
    pub existing: Vec<PathBuf>,
}

/// Create the project layout under `root`, leaving existing entries untouched
pub fn scaffold(root: &Path) -> Result<Scaffold> {
    let mut result = Scaffold::default();

    for dir in DIRECTORIES {
        let path = root.join(dir);
        if path.exists() {
            result.existing.push(path);
            continue;
        }
        std::fs::create_dir_all(&path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        result.created.push(path);
    }

    let config = root.join(CONFIG_FILE);
    if config.exists() {
        result.existing.push(config);
    } else {
        Settings::default().save(&config)?;
        result.created.push(config);
    }

    let example = root.join(EXAMPLE_SUITE);
    if example.exists() {
        result.existing.push(example);
    } else {
        std::fs::write(&example, EXAMPLE_SUITE_BODY)
            .with_context(|| format!("cannot write {}", example.display()))?;
        result.created.push(example);
    }

    Ok(result)
}
