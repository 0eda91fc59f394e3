use rusqlite::ffi;
use thiserror::Error;

/// Expected failure kinds of board operations. Everything that is not one
/// of the four domain kinds is a storage failure and maps to a generic
/// message at the HTTP boundary.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type BoardResult<T> = Result<T, BoardError>;

impl BoardError {
    pub fn not_found(what: impl Into<String>) -> Self {
        BoardError::NotFound(what.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        BoardError::InvalidArgument(msg.into())
    }

    pub fn login_required() -> Self {
        BoardError::Unauthenticated("login required".into())
    }
}

impl From<rusqlite::Error> for BoardError {
    fn from(err: rusqlite::Error) -> Self {
        BoardError::Storage(err.into())
    }
}

/// True when the error chain bottoms out in a UNIQUE or PRIMARY KEY
/// constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(failure, _))
                if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
    })
}

/// Turns a unique-constraint failure into `Conflict`, passing anything else
/// through as a storage error.
pub fn conflict_on_unique(err: anyhow::Error, message: impl Into<String>) -> BoardError {
    if is_unique_violation(&err) {
        BoardError::Conflict(message.into())
    } else {
        BoardError::Storage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn unique_violations_become_conflicts() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE NOT NULL);")
            .unwrap();
        conn.execute("INSERT INTO t (name) VALUES ('tech')", []).unwrap();
        let err = conn
            .execute("INSERT INTO t (name) VALUES ('tech')", [])
            .map_err(anyhow::Error::from)
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(matches!(
            conflict_on_unique(err, "taken"),
            BoardError::Conflict(msg) if msg == "taken"
        ));
    }

    #[test]
    fn other_failures_stay_storage_errors() {
        let err = anyhow::anyhow!("disk on fire");
        assert!(!is_unique_violation(&err));
        assert!(matches!(conflict_on_unique(err, "taken"), BoardError::Storage(_)));
    }
}
