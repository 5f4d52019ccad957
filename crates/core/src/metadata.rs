//! Output tagging
//!
//! Every product can be wrapped with the tool that produced it, a run
//! identifier shared by all outputs of one invocation, a semantic kind, a
//! units label and the parameters used, so downstream consumers never have to
//! guess what a grid means.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Descriptive tag attached to one output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTag {
    pub tool_id: String,
    pub run_id: String,
    /// Semantic label such as `viewshed` or `accumulated_cost`
    pub kind: String,
    pub units: String,
    /// Parameters serialised as JSON
    pub params: serde_json::Value,
}

/// An output together with its tag
#[derive(Debug, Clone, Serialize)]
pub struct Tagged<T> {
    pub tag: OutputTag,
    pub value: T,
}

/// Fresh run identifier: `prefix` followed by eight hex digits
pub fn new_run_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..8])
}

/// Tags every output of one run with the same tool and run identifiers.
#[derive(Debug, Clone)]
pub struct RunTagger {
    tool_id: String,
    run_id: String,
}

impl RunTagger {
    pub fn new(tool_id: impl Into<String>) -> Self {
        Self::with_run_id(tool_id, new_run_id("run"))
    }

    pub fn with_run_id(tool_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn tool_id(&self) -> &str {
        &self.tool_id
    }

    /// Build the tag for one output.
    pub fn tag_for<P: Serialize>(&self, kind: &str, units: &str, params: &P) -> Result<OutputTag> {
        Ok(OutputTag {
            tool_id: self.tool_id.clone(),
            run_id: self.run_id.clone(),
            kind: kind.to_string(),
            units: units.to_string(),
            params: serde_json::to_value(params)?,
        })
    }

    pub fn tag<T, P: Serialize>(
        &self,
        value: T,
        kind: &str,
        units: &str,
        params: &P,
    ) -> Result<Tagged<T>> {
        Ok(Tagged {
            tag: self.tag_for(kind, units, params)?,
            value,
        })
    }
}
