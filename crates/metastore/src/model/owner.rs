use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of principal an element is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnerType {
    User,
    Role,
    SystemRole,
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OwnerType::User => "user",
            OwnerType::Role => "role",
            OwnerType::SystemRole => "system-role",
        };
        f.write_str(name)
    }
}

/// Who or what an element belongs to. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementOwner {
    pub name: String,
    pub owner_type: OwnerType,
}

impl ElementOwner {
    pub fn new(name: impl Into<String>, owner_type: OwnerType) -> Self {
        Self {
            name: name.into(),
            owner_type,
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::new(name, OwnerType::User)
    }

    pub fn role(name: impl Into<String>) -> Self {
        Self::new(name, OwnerType::Role)
    }
}

impl fmt::Display for ElementOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner_type, self.name)
    }
}
