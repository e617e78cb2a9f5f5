use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestTrackError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{name} not found in schema")]
    NotFoundInSchema { name: String },

    #[error("Filesystem error: {0}")]
    FilesystemError(String),

    #[error("Remote rejected migration {version}: {reason}")]
    RemoteUnaccepted { version: String, reason: String },

    #[error("Remote protocol error: unexpected status {status} from {path}")]
    RemoteProtocolError { status: u16, path: String },

    #[error("Schema is inconsistent after replay:\n{diff}")]
    InconsistentSchema { diff: String },

    #[error("Can't undo: {0}")]
    UndoImpossible(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("HTTP transport error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl TestTrackError {
    /// A stable exit code for a hypothetical CLI front end, so a shell
    /// script driving the tool can branch on failure class without
    /// parsing the message. Transport-ish failures (IO, remote) get a
    /// distinct code from input/schema-shape failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            TestTrackError::InvalidInput(_) => 2,
            TestTrackError::NotFoundInSchema { .. } => 3,
            TestTrackError::FilesystemError(_) => 4,
            TestTrackError::RemoteUnaccepted { .. } => 5,
            TestTrackError::RemoteProtocolError { .. } => 6,
            TestTrackError::InconsistentSchema { .. } => 7,
            TestTrackError::UndoImpossible(_) => 8,
            TestTrackError::IoError(_) => 4,
            TestTrackError::YamlError(_) => 7,
            TestTrackError::HttpError(_) => 6,
        }
    }
}

pub type Result<T> = std::result::Result<T, TestTrackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_across_error_classes() {
        let codes = [
            TestTrackError::InvalidInput("x".to_string()).exit_code(),
            TestTrackError::NotFoundInSchema { name: "x".to_string() }.exit_code(),
            TestTrackError::FilesystemError("x".to_string()).exit_code(),
            TestTrackError::RemoteUnaccepted {
                version: "v".to_string(),
                reason: "r".to_string(),
            }
            .exit_code(),
            TestTrackError::RemoteProtocolError {
                status: 500,
                path: "p".to_string(),
            }
            .exit_code(),
            TestTrackError::InconsistentSchema { diff: "d".to_string() }.exit_code(),
            TestTrackError::UndoImpossible("x".to_string()).exit_code(),
        ];
        let unique: std::collections::BTreeSet<i32> = codes.iter().copied().collect();
        assert_eq!(unique.len(), codes.len());
        assert!(codes.iter().all(|&c| c != 0));
    }
}
