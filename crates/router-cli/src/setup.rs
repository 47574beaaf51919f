//! Shared config-loading / Router-construction boilerplate used by the
//! `serve`, `route`, and `exec-task` subcommands.

use std::path::PathBuf;

use anyhow::Context;
use router_core::Config;
use router_policy::Router;

pub fn load_config() -> Config {
    router_core::load_config(None)
}

/// `repo_root` is the working directory subprocess invocations run from —
/// the directory the CLI itself is run from, matching "the repository
/// root" as the teacher's tools resolve it relative to the CLI's cwd.
pub fn build_router(config: &Config) -> anyhow::Result<Router> {
    let repo_root = std::env::current_dir().context("failed to resolve current directory")?;
    let runtime_dir = router_core::config::resolve_runtime_dir(config);
    std::fs::create_dir_all(&runtime_dir)
        .with_context(|| format!("failed to create runtime dir: {}", runtime_dir.display()))?;
    Ok(Router::new(config, repo_root, runtime_dir))
}

pub fn default_runtime_dir() -> PathBuf {
    router_core::config::default_runtime_dir()
}
