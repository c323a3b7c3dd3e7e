//! Environment variable utilities

/// Get environment variable as Option
///
/// Returns `Some(value)` if set and valid unicode, `None` otherwise.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Whether the variable is set at all, to any value
pub fn env_is_set(key: &str) -> bool {
    std::env::var_os(key).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_variables() {
        let key = "MODHOST_TEST_SURELY_UNSET_VARIABLE";
        assert_eq!(env_opt(key), None);
        assert!(!env_is_set(key));
    }
}
