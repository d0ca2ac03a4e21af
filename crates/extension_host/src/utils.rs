//! Utility functions and helpers

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Parse a version string into (major, minor, patch)
///
/// A missing patch component is read as 0, so "1.2" parses as (1, 2, 0).
pub fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse::<u32>().ok()?;
    let minor = parts.next()?.parse::<u32>().ok()?;
    let patch = match parts.next() {
        Some(p) => p.parse::<u32>().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

/// Check if two versions are compatible (major.minor matching)
pub fn is_version_compatible(version1: &str, version2: &str) -> bool {
    match (parse_version(version1), parse_version(version2)) {
        (Some((major1, minor1, _)), Some((major2, minor2, _))) => {
            major1 == major2 && minor1 == minor2
        }
        _ => version1 == version2,
    }
}

/// Safe string conversion from C string pointer
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub unsafe fn c_str_to_string(ptr: *const std::os::raw::c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    std::ffi::CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Whether a directory entry name is hidden (leading dot)
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!(parse_version("1.2.3"), Some((1, 2, 3)));
        assert_eq!(parse_version("0.1.0"), Some((0, 1, 0)));
        assert_eq!(parse_version("1.2"), Some((1, 2, 0)));
        assert_eq!(parse_version("invalid"), None);
        assert_eq!(parse_version("1.2.3.4"), None);
    }

    #[test]
    fn test_version_compatibility() {
        assert!(is_version_compatible("1.2.3", "1.2.4"));
        assert!(is_version_compatible("1.2.0", "1.2.999"));
        assert!(!is_version_compatible("1.2.0", "1.3.0"));
        assert!(!is_version_compatible("1.2.0", "2.2.0"));
        assert!(is_version_compatible("invalid", "invalid"));
        assert!(!is_version_compatible("invalid", "1.2.3"));
    }

    #[test]
    fn test_c_str_conversion() {
        let owned = std::ffi::CString::new("0.1.0").unwrap();
        assert_eq!(unsafe { c_str_to_string(owned.as_ptr()) }, Some("0.1.0".to_string()));
        assert_eq!(unsafe { c_str_to_string(std::ptr::null()) }, None);
    }

    #[test]
    fn test_hidden_names() {
        assert!(is_hidden(".git"));
        assert!(!is_hidden("demo"));
    }

    #[test]
    fn test_timestamp_is_monotonic_enough() {
        let a = current_timestamp();
        let b = current_timestamp();
        assert!(b >= a);
        assert!(a > 0);
    }
}
