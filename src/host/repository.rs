//! Function Repository - the closed table of host capabilities.
//!
//! The worker never holds a callable, only a [`CapabilityId`]. The host looks
//! the id up here and runs the trusted function with plain data input. The
//! table is sealed by [`FunctionRepositoryBuilder::build`]; nothing can be
//! registered afterwards.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};
use crate::protocol::{CapabilityError, CapabilityOutcome};
use crate::types::CapabilityId;

/// A trusted host callable.
pub type Capability = Box<dyn Fn(&Value) -> std::result::Result<Value, String>>;

struct Entry {
    name: String,
    call: Capability,
}

pub struct FunctionRepository {
    entries: HashMap<CapabilityId, Entry>,
}

#[derive(Default)]
pub struct FunctionRepositoryBuilder {
    entries: Vec<(CapabilityId, String, Capability)>,
}

impl FunctionRepositoryBuilder {
    pub fn register(
        mut self,
        id: CapabilityId,
        name: impl Into<String>,
        call: impl Fn(&Value) -> std::result::Result<Value, String> + 'static,
    ) -> Self {
        self.entries.push((id, name.into(), Box::new(call)));
        self
    }

    /// Seal the table. Registering one id twice is a configuration error.
    pub fn build(self) -> Result<FunctionRepository> {
        let mut entries = HashMap::with_capacity(self.entries.len());
        for (id, name, call) in self.entries {
            if let Some(previous) = entries.insert(id, Entry { name: name.clone(), call }) {
                return Err(BridgeError::Config(format!(
                    "capability {id} registered twice (`{}` and `{name}`)",
                    previous.name
                )));
            }
        }
        Ok(FunctionRepository { entries })
    }
}

impl FunctionRepository {
    pub fn builder() -> FunctionRepositoryBuilder {
        FunctionRepositoryBuilder::default()
    }

    /// A repository with no capabilities.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn contains(&self, id: CapabilityId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn name(&self, id: CapabilityId) -> Option<&str> {
        self.entries.get(&id).map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run capability `id` with `input`. Never fails outward: unknown ids,
    /// errors and panics all become a failed outcome.
    pub fn execute(&self, id: CapabilityId, input: &Value) -> CapabilityOutcome {
        let Some(entry) = self.entries.get(&id) else {
            debug!(capability = %id, "unknown capability requested");
            return CapabilityOutcome::Failed(CapabilityError::UnknownCapability(id));
        };

        match panic::catch_unwind(AssertUnwindSafe(|| (entry.call)(input))) {
            Ok(Ok(value)) => CapabilityOutcome::Fulfilled(value),
            Ok(Err(reason)) => {
                debug!(capability = %id, name = %entry.name, %reason, "capability rejected");
                CapabilityOutcome::Failed(CapabilityError::Rejected(reason))
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "capability panicked".to_string());
                warn!(capability = %id, name = %entry.name, %reason, "capability panicked");
                CapabilityOutcome::Failed(CapabilityError::Rejected(reason))
            }
        }
    }
}

impl fmt::Debug for FunctionRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self
            .entries
            .iter()
            .map(|(id, entry)| (id.0, entry.name.as_str()))
            .collect();
        names.sort();
        f.debug_struct("FunctionRepository").field("entries", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repository() -> FunctionRepository {
        FunctionRepository::builder()
            .register(CapabilityId(1), "double", |input| {
                input
                    .as_i64()
                    .map(|n| json!(n * 2))
                    .ok_or_else(|| "expected a number".to_string())
            })
            .register(CapabilityId(2), "explode", |_| panic!("host bug"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_registered_capability_runs() {
        assert_eq!(
            repository().execute(CapabilityId(1), &json!(21)),
            CapabilityOutcome::Fulfilled(json!(42))
        );
    }

    #[test]
    fn test_unknown_id_fails_closed() {
        assert_eq!(
            repository().execute(CapabilityId(99), &json!(null)),
            CapabilityOutcome::Failed(CapabilityError::UnknownCapability(CapabilityId(99)))
        );
    }

    #[test]
    fn test_errors_and_panics_are_contained() {
        let repository = repository();
        assert_eq!(
            repository.execute(CapabilityId(1), &json!("x")),
            CapabilityOutcome::Failed(CapabilityError::Rejected("expected a number".into()))
        );
        assert_eq!(
            repository.execute(CapabilityId(2), &json!(null)),
            CapabilityOutcome::Failed(CapabilityError::Rejected("host bug".into()))
        );
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let err = FunctionRepository::builder()
            .register(CapabilityId(1), "a", |_| Ok(Value::Null))
            .register(CapabilityId(1), "b", |_| Ok(Value::Null))
            .build()
            .unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
