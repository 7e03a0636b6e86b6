//! Oracle that answers from a fixed list of recorded replies.

use super::{clean_response, Oracle, OracleError, OracleRequest};
use std::cell::RefCell;
use std::fs;
use std::path::Path;

/// Serves recorded responses in order and keeps every request it saw.
///
/// An `Err` entry simulates a transport failure for that call.
#[derive(Debug, Default)]
pub struct ReplayOracle {
    responses: RefCell<Vec<Result<String, String>>>,
    requests: RefCell<Vec<OracleRequest>>,
}

impl ReplayOracle {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(responses.into_iter().map(|r| Ok(r.into())))
    }

    pub fn with_results(responses: impl IntoIterator<Item = Result<String, String>>) -> Self {
        let mut responses: Vec<_> = responses.into_iter().collect();
        responses.reverse();
        Self {
            responses: RefCell::new(responses),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// One recorded response per file, in the given order.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> std::io::Result<Self> {
        let mut responses = Vec::with_capacity(paths.len());
        for path in paths {
            responses.push(fs::read_to_string(path)?);
        }
        Ok(Self::new(responses))
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl Oracle for ReplayOracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        self.requests.borrow_mut().push(request.clone());
        let served = self.requests.borrow().len() - 1;

        match self.responses.borrow_mut().pop() {
            Some(Ok(text)) => Ok(clean_response(&text)),
            Some(Err(reason)) => Err(OracleError::Recorded(reason)),
            None => Err(OracleError::ReplayExhausted { served }),
        }
    }
}
