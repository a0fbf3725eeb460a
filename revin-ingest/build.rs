//! Build script for revin-ingest
//!
//! Stamps the binary with a build identity (git revision, build time, profile)
//! that `main` logs on startup and `/health` reports.

use std::process::Command;

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let revision = String::from_utf8(output.stdout).ok()?;
    Some(revision.trim().to_string())
}

fn main() {
    let revision = git_revision().unwrap_or_else(|| "unknown".to_string());
    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=REVIN_GIT_HASH={}", revision);
    println!("cargo:rustc-env=REVIN_BUILD_TIMESTAMP={}", built_at);
    println!("cargo:rustc-env=REVIN_BUILD_PROFILE={}", profile);
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
