//! Preparing simulator executables with the external build tool.

use crate::command::{executable_name, executable_path, CommandLine};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::executor::run_process;
use std::path::PathBuf;

/// Build-tool invocation producing `<tool>-<configuration>` in the simulator root.
pub fn build_tool_command(config: &HarnessConfig, configuration: &str) -> CommandLine {
    let command = CommandLine::new(&config.build_tool)
        .arg("build")
        .arg("--compiler")
        .arg(config.compiler.as_str())
        .arg("-b")
        .arg(config.build_type.as_str())
        .arg("-c")
        .arg(configuration)
        .arg("--force");

    if log::log_enabled!(log::Level::Debug) {
        command
    } else {
        command.arg("--vquiet")
    }
}

/// Make sure the executable for `configuration` exists, building it if needed.
///
/// An existing executable is reused unless `force_build` is set. A failing
/// build is fatal.
pub async fn ensure_executable(config: &HarnessConfig, configuration: &str) -> Result<PathBuf> {
    log::info!(
        "Preparing executable '{}' ...",
        executable_name(&config.tool_name, configuration, config.build_type, config.compiler)
    );
    let target = executable_path(config, configuration);

    if !config.force_build && target.is_file() {
        log::info!("  Found executable '{}'.", target.display());
        return Ok(target);
    }

    log::info!("  Building executable '{}' ...", target.display());
    let command = build_tool_command(config, configuration);
    let outcome = run_process(&command, &config.sim_root).await?;
    if !outcome.success() {
        return Err(HarnessError::BuildFailed(outcome.code()));
    }

    let built = config
        .sim_root
        .join(format!("{}-{}", config.tool_name, configuration));
    tokio::fs::rename(&built, &target).await?;
    log::debug!("  Moved '{}' to '{}'.", built.display(), target.display());

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildType, Compiler};

    #[test]
    fn test_build_tool_command_layout() {
        let config = HarnessConfig {
            compiler: Compiler::Ldc2,
            build_type: BuildType::Cov,
            ..HarnessConfig::default()
        };
        let args = build_tool_command(&config, "d2q9").to_vec();
        assert_eq!(
            &args[..9],
            &["dub", "build", "--compiler", "ldc2", "-b", "cov", "-c", "d2q9", "--force"]
        );
    }

    #[tokio::test]
    async fn test_existing_executable_is_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            sim_root: tmp.path().to_path_buf(),
            build_tool: "/nonexistent/build-tool".to_string(),
            ..HarnessConfig::default()
        };
        let exe = tmp.path().join("dlbc-d2q9-release-dmd");
        std::fs::write(&exe, "").unwrap();

        let found = ensure_executable(&config, "d2q9").await.unwrap();
        assert_eq!(found, exe);
    }

    #[tokio::test]
    async fn test_forced_build_with_missing_tool_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            sim_root: tmp.path().to_path_buf(),
            build_tool: "/nonexistent/build-tool".to_string(),
            force_build: true,
            ..HarnessConfig::default()
        };
        std::fs::write(tmp.path().join("dlbc-d2q9-release-dmd"), "").unwrap();

        let err = ensure_executable(&config, "d2q9").await.unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_moves_output_to_target() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let tool = tmp.path().join("fake-dub");
        std::fs::write(&tool, "#!/bin/sh\ntouch dlbc-d1q3\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = HarnessConfig {
            sim_root: tmp.path().to_path_buf(),
            build_tool: tool.display().to_string(),
            ..HarnessConfig::default()
        };
        let target = ensure_executable(&config, "d1q3").await.unwrap();
        assert_eq!(target, tmp.path().join("dlbc-d1q3-release-dmd"));
        assert!(target.is_file());
        assert!(!tmp.path().join("dlbc-d1q3").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_build_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            sim_root: tmp.path().to_path_buf(),
            build_tool: "false".to_string(),
            ..HarnessConfig::default()
        };
        let err = ensure_executable(&config, "d1q3").await.unwrap_err();
        assert!(matches!(err, HarnessError::BuildFailed(1)));
    }
}
