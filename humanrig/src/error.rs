use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("failed to parse OBJ line {line}: {message}")]
    ObjParse { line: usize, message: String },

    #[cfg(feature = "json")]
    #[error("failed to parse {context}: {message}")]
    JsonParse { context: String, message: String },

    #[error("rig has no root joint (every joint names a parent)")]
    NoRootJoint,

    #[error("unknown parent joint '{parent}' for joint '{joint}'")]
    UnknownJointParent { joint: String, parent: String },

    #[error("unknown vertex group '{group}' referenced by joint '{joint}'")]
    UnknownJointGroup { joint: String, group: String },

    #[error("joint '{joint}' has an empty head vertex group")]
    EmptyHeadVertices { joint: String },

    #[error(
        "head vertex {index} of joint '{joint}' is out of range for a mesh with {vertex_count} vertices"
    )]
    HeadVertexOutOfRange {
        joint: String,
        index: usize,
        vertex_count: usize,
    },

    #[error("skinning failed at vertex {vertex}: {message}")]
    SkinningFailure { vertex: usize, message: String },

    #[error("empty or unparsable target '{}': {message}", path.display())]
    EmptyOrUnparsableTarget { path: PathBuf, message: String },

    #[error("target '{name}' does not affect any sub-mesh")]
    UnboundTarget { name: String },

    #[error(
        "blend shape '{name}' is already bound to '{mesh}' with different indices (existing {existing:?}, incoming {incoming:?})"
    )]
    DuplicateBlendShapeConflict {
        name: String,
        mesh: String,
        existing: Vec<usize>,
        incoming: Vec<usize>,
    },

    #[error("macro data must be loaded before using macro variable '{macrovar}'")]
    MacrodataNotLoaded { macrovar: String },

    #[error("unknown macro variable '{macrovar}'")]
    UnknownMacrovar { macrovar: String },

    #[error("unknown modifier '{name}'")]
    UnknownModifier { name: String },

    #[error("unknown joint '{joint}' referenced by {context}")]
    UnknownJoint { context: String, joint: String },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error belongs to the malformed-rig family, which is fatal to a rig build.
    pub fn is_malformed_rig(&self) -> bool {
        matches!(
            self,
            Self::NoRootJoint
                | Self::UnknownJointParent { .. }
                | Self::UnknownJointGroup { .. }
                | Self::EmptyHeadVertices { .. }
                | Self::HeadVertexOutOfRange { .. }
        )
    }
}
