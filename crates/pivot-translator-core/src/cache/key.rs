use crate::planner::RoutePlan;

/// Cache key for translated units.
///
/// Keys are opaque MD5 hashes of all relevant inputs, ensuring:
/// - Same text + languages + route = same key
/// - A different model on any step produces a different key
/// - Keys are fixed-length (32 hex chars) for consistent storage
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: String,
}

impl CacheKey {
    pub fn new(text: &str, plan: &RoutePlan) -> Self {
        // Null bytes as separators prevent collisions between inputs
        // like ("a", "bc") and ("ab", "c").
        let combined = format!(
            "{}\0{}\0{}\0{}",
            text,
            plan.source(),
            plan.target(),
            plan.handles().join("\0"),
        );

        Self {
            hash: format!("{:x}", md5::compute(combined.as_bytes())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}
