//! Store errors

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a document store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Insert of an id that already exists
    #[error("{entity} {id} already exists")]
    Duplicate {
        /// Entity kind
        entity: &'static str,
        /// Offending id
        id: String,
    },

    /// Replace or delete of an id that does not exist
    #[error("{entity} {id} does not exist")]
    Missing {
        /// Entity kind
        entity: &'static str,
        /// Offending id
        id: String,
    },

    /// Backend failure (connection, timeout, conflict)
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Check if the failed unit may succeed when re-run
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    pub(crate) fn duplicate(entity: &'static str, id: impl ToString) -> Self {
        Self::Duplicate {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn missing(entity: &'static str, id: impl ToString) -> Self {
        Self::Missing {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::duplicate("key dev", "01H");
        assert_eq!(err.to_string(), "key dev 01H already exists");
        assert!(!err.is_retryable());
        assert!(StoreError::Unavailable("down".into()).is_retryable());
    }
}
