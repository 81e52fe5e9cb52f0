/// Platform identifiers understood by the lock engine, in the solver's
/// `<os>-<arch>` subdir notation.
pub const PLATFORMS: &[&str] = &[
    "linux-64",
    "linux-aarch64",
    "linux-ppc64le",
    "osx-64",
    "osx-arm64",
    "win-64",
];

/// Alias tokens accepted by a trailing line selector for each platform.
///
/// A selector matches a target platform when it equals the platform id
/// itself or any alias in this set. The table is fixed; selector syntax is
/// deliberately limited to literal single-token matching.
pub fn platform_aliases(platform: &str) -> Option<&'static [&'static str]> {
    match platform {
        "linux-64" => Some(&["linux64", "unix", "linux"]),
        "linux-aarch64" => Some(&["aarch64", "unix", "linux"]),
        "linux-ppc64le" => Some(&["ppc64le", "unix", "linux"]),
        "osx-64" => Some(&["osx", "osx64", "unix"]),
        "osx-arm64" => Some(&["arm64", "osx", "unix"]),
        "win-64" => Some(&["win", "win64"]),
        _ => None,
    }
}

/// Subdir identifier for the machine we are running on, if it is one of the
/// supported platforms.
pub fn host_platform() -> Option<&'static str> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => Some("linux-64"),
        ("linux", "aarch64") => Some("linux-aarch64"),
        ("linux", "powerpc64le") => Some("linux-ppc64le"),
        ("macos", "x86_64") => Some("osx-64"),
        ("macos", "aarch64") => Some("osx-arm64"),
        ("windows", "x86_64") => Some("win-64"),
        _ => None,
    }
}
