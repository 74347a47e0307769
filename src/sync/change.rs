use derive_more::Display;

/// What happened to the node at [`ChangeRecord::path`].
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ChangeOp {
    /// `content` is `None` for folders.
    #[display("create")]
    Create { content: Option<Vec<u8>> },
    #[display("write")]
    Write { content: Vec<u8> },
    #[display("rename to {to}")]
    Rename { to: String },
    #[display("remove")]
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{op} {path}")]
pub struct ChangeRecord {
    pub path: String,
    pub op: ChangeOp,
}

/// Records in the order their mutations were applied to the tree.
pub type ChangeSet = Vec<ChangeRecord>;

impl ChangeRecord {
    pub fn create(path: impl Into<String>, content: Option<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            op: ChangeOp::Create { content },
        }
    }

    pub fn write(path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            op: ChangeOp::Write { content },
        }
    }

    pub fn rename(path: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            op: ChangeOp::Rename { to: to.into() },
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            op: ChangeOp::Remove,
        }
    }

    /// Every path this record touches.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        let target = match &self.op {
            ChangeOp::Rename { to } => Some(to.as_str()),
            _ => None,
        };
        std::iter::once(self.path.as_str()).chain(target)
    }
}
