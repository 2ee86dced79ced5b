// build.rs - build metadata for VIGIL
//
// Exports the build timestamp, compiler version, git revision and enabled
// feature list as compile-time environment variables read by src/lib.rs.

use std::collections::BTreeSet;
use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=build.rs");

    set_build_env_vars();

    let features = collect_enabled_features();
    println!(
        "cargo:rustc-env=VIGIL_FEATURES={}",
        features.into_iter().collect::<Vec<_>>().join(",")
    );
}

/// Set build environment variables that the code expects
fn set_build_env_vars() {
    println!(
        "cargo:rustc-env=VIGIL_BUILD_TIMESTAMP={}",
        chrono::Utc::now().to_rfc3339()
    );

    let rustc_version =
        command_output("rustc", &["--version"]).unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=VIGIL_RUST_VERSION={}", rustc_version);

    // Not a git checkout when building from a published crate
    let git_hash = command_output("git", &["rev-parse", "--short", "HEAD"])
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Collect all enabled feature flags from environment variables
fn collect_enabled_features() -> BTreeSet<String> {
    env::vars()
        .filter_map(|(key, _)| {
            key.strip_prefix("CARGO_FEATURE_")
                .map(|name| name.to_lowercase().replace('_', "-"))
        })
        .collect()
}
