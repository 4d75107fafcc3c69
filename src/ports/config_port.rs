//! Configuration access port trait.

/// Raw `[section] key` lookups. Numeric keys are read as strings and parsed
/// by `domain::config_validation`, so a malformed number is an error instead
/// of a silent default.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
