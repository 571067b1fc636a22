use log::debug;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;
use walkdir::WalkDir;

// `ttyUSB0`, `ttyACM1`, `tty5` and `hidraw3`, but not the bare `tty` class directory.
static NODE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(tty.*[0-9]|hidraw[0-9])").expect("node name pattern is valid"));

pub fn is_device_node(name: &str) -> bool {
    NODE_NAME.is_match(name)
}

/// Collect the names of `tty*` / `hidraw*` entries anywhere below `dir`.
///
/// Symbolic links are never followed, since sysfs links back up the tree
/// (`subsystem`, `driver`, `port`). Entries that vanish while walking, which
/// happens when a device is unplugged, are skipped.
pub fn find_device_nodes(dir: &Path) -> BTreeSet<String> {
    let mut nodes = BTreeSet::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .follow_root_links(true);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping entry below {}: {}", dir.display(), e);
                continue;
            }
        };

        if let Some(name) = entry.file_name().to_str() {
            if is_device_node(name) {
                nodes.insert(name.to_string());
            }
        }
    }

    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn test_node_names() {
        assert!(is_device_node("hidraw0"));
        assert!(is_device_node("hidraw12"));
        assert!(is_device_node("ttyUSB0"));
        assert!(is_device_node("ttyACM3"));
        assert!(is_device_node("tty7"));
        assert!(!is_device_node("tty"));
        assert!(!is_device_node("hidraw"));
        assert!(!is_device_node("idVendor"));
        assert!(!is_device_node("usb1"));
    }

    #[test]
    fn test_find_nested_nodes() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("1-1:1.0/0003:413D:2107.0001/hidraw/hidraw0")).unwrap();
        fs::create_dir_all(root.join("1-1:1.1/0003:413D:2107.0002/hidraw/hidraw1")).unwrap();
        fs::write(root.join("idVendor"), "413d\n").unwrap();

        let nodes: Vec<String> = find_device_nodes(root).into_iter().collect();
        assert_eq!(nodes, vec!["hidraw0", "hidraw1"]);
    }

    #[test]
    fn test_find_serial_node_deduplicated() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("1-2:1.0/ttyUSB0/tty/ttyUSB0")).unwrap();

        let nodes: Vec<String> = find_device_nodes(root).into_iter().collect();
        assert_eq!(nodes, vec!["ttyUSB0"]);
    }

    #[test]
    fn test_symlink_cycles_not_followed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("child/hidraw2")).unwrap();
        symlink(root, root.join("child/subsystem")).unwrap();

        let other = TempDir::new().unwrap();
        fs::create_dir_all(other.path().join("hidraw9")).unwrap();
        symlink(other.path(), root.join("driver")).unwrap();

        let nodes: Vec<String> = find_device_nodes(root).into_iter().collect();
        assert_eq!(nodes, vec!["hidraw2"]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(find_device_nodes(&dir.path().join("gone")).is_empty());
    }
}
