//! Typed content sections.
//!
//! A passfile holds a list of sections of exactly one shape. The shape is
//! tied to the runtime [`PassFileType`] through [`Section::PASSFILE_TYPE`],
//! so a shape without a type mapping does not compile.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::{Content, PassFileContent};
use crate::error::PassfileError;

/// Runtime tag for the content shape of a passfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassFileType {
    /// Login entries (`PwdSection`)
    Pwd,
    /// Free-text notes (`TxtSection`)
    Txt,
}

impl PassFileType {
    /// File extension used for content files of this type.
    pub fn extension(self) -> &'static str {
        match self {
            PassFileType::Pwd => "pwd",
            PassFileType::Txt => "txt",
        }
    }
}

impl fmt::Display for PassFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for PassFileType {
    type Err = PassfileError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pwd" => Ok(PassFileType::Pwd),
            "txt" => Ok(PassFileType::Txt),
            other => Err(PassfileError::InvalidInput(format!(
                "Unknown passfile type: {} (use pwd or txt)",
                other
            ))),
        }
    }
}

/// Stable identity of a section; the key the merge engine diffs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(Uuid);

impl SectionId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SectionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A content shape that can live inside a passfile.
pub trait Section:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Runtime type of passfiles holding this shape.
    const PASSFILE_TYPE: PassFileType;

    fn id(&self) -> SectionId;

    fn name(&self) -> &str;

    fn content_of(content: &PassFileContent) -> Option<&Content<Self>>;

    fn content_of_mut(content: &mut PassFileContent) -> Option<&mut Content<Self>>;

    fn wrap(content: Content<Self>) -> PassFileContent;
}

/// One credential inside a password section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PwdItem {
    #[serde(default)]
    pub usernames: Vec<String>,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub remark: String,
}

impl PwdItem {
    pub fn new(usernames: Vec<String>, password: impl Into<String>) -> Self {
        Self {
            usernames,
            password: password.into(),
            remark: String::new(),
        }
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }
}

/// A login entry: a named website with its credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PwdSection {
    pub id: SectionId,
    pub name: String,
    #[serde(default)]
    pub website_url: String,
    #[serde(default)]
    pub items: Vec<PwdItem>,
}

impl PwdSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SectionId::new(),
            name: name.into(),
            website_url: String::new(),
            items: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.website_url = url.into();
        self
    }

    pub fn with_item(mut self, item: PwdItem) -> Self {
        self.items.push(item);
        self
    }
}

impl Section for PwdSection {
    const PASSFILE_TYPE: PassFileType = PassFileType::Pwd;

    fn id(&self) -> SectionId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn content_of(content: &PassFileContent) -> Option<&Content<Self>> {
        match content {
            PassFileContent::Pwd(inner) => Some(inner),
            PassFileContent::Txt(_) => None,
        }
    }

    fn content_of_mut(content: &mut PassFileContent) -> Option<&mut Content<Self>> {
        match content {
            PassFileContent::Pwd(inner) => Some(inner),
            PassFileContent::Txt(_) => None,
        }
    }

    fn wrap(content: Content<Self>) -> PassFileContent {
        PassFileContent::Pwd(content)
    }
}

/// A free-text note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxtSection {
    pub id: SectionId,
    pub name: String,
    #[serde(default)]
    pub content: String,
}

impl TxtSection {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: SectionId::new(),
            name: name.into(),
            content: content.into(),
        }
    }
}

impl Section for TxtSection {
    const PASSFILE_TYPE: PassFileType = PassFileType::Txt;

    fn id(&self) -> SectionId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn content_of(content: &PassFileContent) -> Option<&Content<Self>> {
        match content {
            PassFileContent::Txt(inner) => Some(inner),
            PassFileContent::Pwd(_) => None,
        }
    }

    fn content_of_mut(content: &mut PassFileContent) -> Option<&mut Content<Self>> {
        match content {
            PassFileContent::Txt(inner) => Some(inner),
            PassFileContent::Pwd(_) => None,
        }
    }

    fn wrap(content: Content<Self>) -> PassFileContent {
        PassFileContent::Txt(content)
    }
}
