//! Build error taxonomy.
//!
//! Errors that a full `build` treats as fatal carry enough context to name
//! every offending path; the watch loop downcasts to decide which failures
//! are survivable (see [`crate::watch`]).

use std::path::PathBuf;
use thiserror::Error;

/// Site-level build errors.
#[derive(Debug, Error)]
pub enum SiteError {
    /// Filesystem walk or glob failure during discovery. Fatal.
    #[error("discovery failed under `{root}`")]
    Discovery {
        root: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// A pipeline step or template execution failed for one document.
    /// Fatal to a full build; caught and logged in watch mode.
    #[error("cannot transform `{path}` (step `{step}`)")]
    Transform {
        path: PathBuf,
        step: String,
        #[source]
        source: anyhow::Error,
    },

    /// A changed path matches no known document even after rediscovery.
    /// Non-fatal; the watch loop logs it and keeps watching.
    #[error("`{path}` is not tracked; restart to track")]
    Untracked { path: PathBuf },

    /// Previously recorded output paths are missing after a build.
    #[error(
        "cool URIs do not change, but these ones were removed by this build:\n\n- {}",
        missing.join("\n- ")
    )]
    UriRegression { missing: Vec<String> },

    /// Two documents resolved to the same output path.
    #[error("both `{first}` and `{second}` wanted to build to `{web_path}`; remove one")]
    OutputCollision {
        web_path: String,
        first: PathBuf,
        second: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_regression_lists_every_path() {
        let err = SiteError::UriRegression {
            missing: vec!["hello.html".into(), "goodbye.html".into()],
        };
        let display = format!("{err}");
        assert!(display.contains("- hello.html"));
        assert!(display.contains("- goodbye.html"));
    }

    #[test]
    fn test_collision_names_both_sources() {
        let err = SiteError::OutputCollision {
            web_path: "hello.html".into(),
            first: PathBuf::from("src/cold/hello.md"),
            second: PathBuf::from("src/warm/hello.org"),
        };
        let display = format!("{err}");
        assert!(display.contains("src/cold/hello.md"));
        assert!(display.contains("src/warm/hello.org"));
        assert!(display.contains("hello.html"));
    }

    #[test]
    fn test_untracked_is_actionable() {
        let err = SiteError::Untracked {
            path: PathBuf::from("src/stray.txt"),
        };
        assert!(format!("{err}").contains("restart to track"));
    }
}
