use std::fmt;
use thiserror::Error;

/// Errors raised by store operations.
///
/// The `*Exists` kinds and [`MetaStoreError::DependenciesExist`] are expected
/// outcomes callers branch on; only the unavailable kinds signal a broken
/// backend (see [`MetaStoreError::is_unavailable`]).
#[derive(Error, Debug)]
pub enum MetaStoreError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Namespace already exists: {0}")]
    NamespaceExists(String),

    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("Element type '{id}' already exists in namespace '{namespace}'")]
    ElementTypeExists { namespace: String, id: String },

    #[error("Element type '{id}' not found in namespace '{namespace}'")]
    ElementTypeNotFound { namespace: String, id: String },

    #[error("Element '{id}' already exists in type '{element_type}'")]
    ElementExists { element_type: String, id: String },

    #[error("Element '{id}' not found in type '{element_type}'")]
    ElementNotFound { element_type: String, id: String },

    #[error("{message} (dependencies: {})", .dependencies.join(", "))]
    DependenciesExist {
        message: String,
        dependencies: Vec<String>,
    },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MapError),
}

impl MetaStoreError {
    /// True for backend-level failures (I/O, corrupt data, connectivity).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            MetaStoreError::StoreUnavailable(_)
                | MetaStoreError::Io(_)
                | MetaStoreError::Serialization(_)
        )
    }

    /// The blocking identifiers carried by a dependency failure.
    pub fn dependencies(&self) -> Option<&[String]> {
        match self {
            MetaStoreError::DependenciesExist { dependencies, .. } => Some(dependencies),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MetaStoreError>;

/// A single element that could not be read during a tolerant listing.
#[derive(Debug)]
pub struct LoadFailure {
    pub element_id: String,
    pub error: MetaStoreError,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element '{}': {}", self.element_id, self.error)
    }
}

/// A stored value that could not be converted to its field's declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionFailure {
    /// Dotted field path, e.g. `attributes[1].level`.
    pub path: String,
    pub expected: &'static str,
    pub found: String,
}

impl fmt::Display for CoercionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}': cannot convert {} to {}",
            self.path, self.found, self.expected
        )
    }
}

/// Errors raised by the object mapper.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("Cyclic object graph at '{path}'")]
    CyclicGraph { path: String },

    #[error("Coercion failed: {0}")]
    Coercion(CoercionFailure),

    #[error("Field '{path}' is marked sensitive but does not hold a primitive value")]
    SensitiveValue { path: String },

    #[error("Field '{path}' is mutably borrowed elsewhere")]
    BorrowConflict { path: String },

    #[error("Object of type '{type_name}' has no value for its name field '{field}'")]
    MissingName {
        type_name: &'static str,
        field: &'static str,
    },

    #[error("Name field '{field}' of type '{type_name}' cannot be sensitive")]
    SensitiveName {
        type_name: &'static str,
        field: &'static str,
    },

    #[error("Key '{key}' at '{path}' is reserved")]
    ReservedKey { path: String, key: String },
}
