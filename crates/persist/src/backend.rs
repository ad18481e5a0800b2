/// Errors reported by a key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("key {0:?} holds a value of the wrong type")]
    WrongType(String),
    #[error("score {0} is not a number")]
    InvalidScore(f64),
}

/// The operations the entity store needs from a key-value backend: plain
/// byte values plus sorted sets ordered by a floating point score.
///
/// Methods take `&mut self` like a single connection; callers serialize
/// access.
pub trait KvBackend: Send {
    /// `SET key value`
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), BackendError>;

    /// `GET key`; `None` if the key does not exist.
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// `DEL key`; whether a value was removed.
    fn del(&mut self, key: &str) -> Result<bool, BackendError>;

    /// `KEYS pattern` with glob semantics (`*`, `?`, `[...]`, `\` escapes).
    fn keys(&mut self, pattern: &str) -> Result<Vec<String>, BackendError>;

    /// `ZADD set score member`, replacing the member's previous score.
    fn zadd(&mut self, set: &str, score: f64, member: &str) -> Result<(), BackendError>;

    /// `ZREM set member`; whether the member was present.
    fn zrem(&mut self, set: &str, member: &str) -> Result<bool, BackendError>;

    /// `ZRANGEBYSCORE set min max`, inclusive on both ends, ordered by score.
    fn zrange_by_score(&mut self, set: &str, min: f64, max: f64)
    -> Result<Vec<String>, BackendError>;
}
