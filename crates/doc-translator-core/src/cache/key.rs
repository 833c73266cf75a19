/// Cache key for a translated chunk.
///
/// Keys are opaque MD5 hashes of the model and the chunk text, so:
/// - Same model + same source text = same key
/// - Any change to either produces a different key
/// - Keys are fixed-length (32 hex chars) for consistent storage
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: String,
}

impl CacheKey {
    pub fn new(model: &str, content: &str) -> Self {
        // Null separator keeps ("a", "bc") and ("ab", "c") apart.
        let combined = format!("{model}\0{content}");

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
