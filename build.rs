// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=PHOTOBOOTH_VERSION");

    // Packagers may pin the version explicitly
    let version = std::env::var("PHOTOBOOTH_VERSION").unwrap_or_else(|_| describe_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Version string from `git describe`, or the crate version outside a checkout.
///
/// - exact tag `v0.1.0` becomes `0.1.0`
/// - `v0.1.0-5-gabcdef1` becomes `0.1.0-dev-abcdef1`
fn describe_version() -> String {
    let output = Command::new("git")
        .args(["describe", "--tags", "--match", "v*"])
        .output();

    let described = match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => return env!("CARGO_PKG_VERSION").to_string(),
    };

    let described = described.strip_prefix('v').unwrap_or(&described);

    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    if parts.len() == 3 {
        let hash = parts[0].strip_prefix('g').unwrap_or(parts[0]);
        format!("{}-dev-{}", parts[2], hash)
    } else {
        described.to_string()
    }
}
