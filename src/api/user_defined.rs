use crate::error::ValidationError;
use crate::schema::BlockCategory;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The block kinds users can register their own definitions for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserDefinedKind {
    Actions,
    Conditions,
    Triggers,
    Variables,
}

impl UserDefinedKind {
    pub fn segment(&self) -> &'static str {
        match self {
            UserDefinedKind::Actions => "actions",
            UserDefinedKind::Conditions => "conditions",
            UserDefinedKind::Triggers => "triggers",
            UserDefinedKind::Variables => "variables",
        }
    }

    pub fn category(&self) -> BlockCategory {
        match self {
            UserDefinedKind::Actions => BlockCategory::Action,
            UserDefinedKind::Conditions => BlockCategory::Condition,
            UserDefinedKind::Triggers => BlockCategory::Trigger,
            UserDefinedKind::Variables => BlockCategory::Variable,
        }
    }
}

impl TryFrom<BlockCategory> for UserDefinedKind {
    type Error = String;

    fn try_from(category: BlockCategory) -> Result<Self, Self::Error> {
        match category {
            BlockCategory::Action => Ok(UserDefinedKind::Actions),
            BlockCategory::Condition => Ok(UserDefinedKind::Conditions),
            BlockCategory::Trigger => Ok(UserDefinedKind::Triggers),
            BlockCategory::Variable => Ok(UserDefinedKind::Variables),
            BlockCategory::Result => Err("result blocks cannot be user defined".to_string()),
        }
    }
}

/// A user-registered block definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserDefinedBlock {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Parameter schema, in the same shape the editor renders.
    #[serde(default)]
    pub schema: Option<Value>,
    /// The automation body the block expands to.
    #[serde(default)]
    pub definition: Option<Value>,
}

impl UserDefinedBlock {
    /// Client-side checks run before submission.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::KeyMissing("name"));
        }
        Ok(())
    }
}
