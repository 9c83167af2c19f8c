/// Read a configuration value from the environment.
///
/// `LOCKSIDE_{key}` takes priority over the bare `{key}`, so the crate's
/// settings can coexist with another service's variables in the same
/// environment.
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("LOCKSIDE_{key}"))
        .or_else(|_| std::env::var(key))
        .ok()
}
