//! Parse and validation errors for model value types

/// Errors raised while constructing or parsing model values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Weight outside the allowed step set
    #[error("invalid weight {0}: expected one of 0, 0.25, 0.5, 0.75, 1")]
    InvalidWeight(f64),

    /// Month reference not in `YYYY-MM` form
    #[error("invalid month reference {0:?}: expected YYYY-MM")]
    InvalidMonthRef(String),

    /// Human id not in `KD-###` form
    #[error("invalid human id {0:?}: expected KD-<number>")]
    InvalidHumanId(String),

    /// Unknown status name
    #[error("unknown status: {0}")]
    UnknownStatus(String),

    /// Unknown role name
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// A user must hold at least one role
    #[error("role set must not be empty")]
    EmptyRoleSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_display() {
        let err = ModelError::InvalidMonthRef("2026/01".to_string());
        assert!(err.to_string().contains("YYYY-MM"));

        let err = ModelError::InvalidWeight(0.3);
        assert!(err.to_string().contains("0.3"));
    }
}
