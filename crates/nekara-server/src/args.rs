//! Positional argument decoding.

use nekara_types::{ResourceId, TaskId};
use serde_json::Value;

use crate::error::{ServerError, ServerResult};

/// Positional arguments of one call, with typed accessors.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    function: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(function: &'a str, values: &'a [Value]) -> Self {
        Self { function, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn invalid(&self, message: impl Into<String>) -> ServerError {
        ServerError::InvalidArguments {
            function: self.function.to_string(),
            message: message.into(),
        }
    }

    /// Requires exactly `n` arguments.
    pub fn expect_len(&self, n: usize) -> ServerResult<()> {
        self.expect_between(n, n)
    }

    /// Requires between `min` and `max` arguments, inclusive.
    pub fn expect_between(&self, min: usize, max: usize) -> ServerResult<()> {
        let len = self.values.len();
        if len < min || len > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            return Err(self.invalid(format!("expected {expected} arguments, got {len}")));
        }
        Ok(())
    }

    fn get(&self, index: usize) -> ServerResult<&'a Value> {
        self.values
            .get(index)
            .ok_or_else(|| self.invalid(format!("missing argument {index}")))
    }

    pub fn u64(&self, index: usize) -> ServerResult<u64> {
        self.get(index)?
            .as_u64()
            .ok_or_else(|| self.invalid(format!("argument {index} must be a non-negative integer")))
    }

    /// Like [`Args::u64`], but absent or `null` yields `None`.
    pub fn opt_u64(&self, index: usize) -> ServerResult<Option<u64>> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.u64(index).map(Some),
        }
    }

    pub fn bool(&self, index: usize) -> ServerResult<bool> {
        self.get(index)?
            .as_bool()
            .ok_or_else(|| self.invalid(format!("argument {index} must be a boolean")))
    }

    pub fn str(&self, index: usize) -> ServerResult<&'a str> {
        self.get(index)?
            .as_str()
            .ok_or_else(|| self.invalid(format!("argument {index} must be a string")))
    }

    pub fn task(&self, index: usize) -> ServerResult<TaskId> {
        self.u64(index).map(TaskId::new)
    }

    pub fn resource(&self, index: usize) -> ServerResult<ResourceId> {
        self.u64(index).map(ResourceId::new)
    }

    /// An array of resource IDs.
    pub fn resources(&self, index: usize) -> ServerResult<Vec<ResourceId>> {
        let items = self
            .get(index)?
            .as_array()
            .ok_or_else(|| self.invalid(format!("argument {index} must be an array")))?;
        items
            .iter()
            .map(|item| {
                item.as_u64().map(ResourceId::new).ok_or_else(|| {
                    self.invalid(format!("argument {index} must contain resource ids"))
                })
            })
            .collect()
    }
}
