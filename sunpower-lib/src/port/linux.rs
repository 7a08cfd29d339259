use glob::glob;
use std::fs;
use std::path::PathBuf;

/// Scans `/proc/*/fd` for a descriptor pointing at `port_name`.
pub fn is_port_open(port_name: &str) -> bool {
    let target = fs::canonicalize(port_name).unwrap_or_else(|_| PathBuf::from(port_name));

    let paths = match glob("/proc/[0-9]*/fd/*") {
        Ok(paths) => paths,
        Err(_) => return false,
    };

    paths
        .filter_map(|p| p.ok())
        .filter_map(|path| fs::read_link(path).ok())
        .any(|link| link == target)
}
