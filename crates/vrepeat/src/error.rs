use thiserror::Error;

/// Configuration failures surfaced by `bind`, `attach` and `items_changed`.
///
/// Runtime scroll and mutation problems never produce a `ConfigError`; they
/// are logged and absorbed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("virtual repeat has no binding scope; call bind() before attach()")]
    NotBound,

    #[error("value of type `{found}` is not iterable and cannot be virtualized")]
    NotIterable { found: String },

    #[error("infinite-scroll-next `{name}` must be a function or evaluate to one")]
    LoadMoreNotCallable { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let err = ConfigError::NotIterable {
            found: "number".into(),
        };
        assert!(err.to_string().contains("`number`"));

        let err = ConfigError::LoadMoreNotCallable {
            name: "getMore".into(),
        };
        assert!(err.to_string().contains("getMore"));
    }
}
