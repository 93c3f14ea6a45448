use common::domain::DomainError;

/// An id a batch operation could not process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub id: String,
    pub message: String,
}

/// Result of acting on several objects one at a time
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn record(&mut self, id: &str, result: Result<(), DomainError>) {
        match result {
            Ok(()) => self.succeeded.push(id.to_string()),
            Err(err) => self.failed.push(BatchFailure {
                id: id.to_string(),
                message: err.to_string(),
            }),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
