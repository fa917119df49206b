use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies a class by grade and class number.
///
/// `ClassId::NONE` (`0-0`) marks an account that belongs to no class, such as
/// the seeded administrator. Such accounts never appear in a class roster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId {
    pub grade: u32,
    pub class: u32,
}

impl ClassId {
    pub const NONE: ClassId = ClassId { grade: 0, class: 0 };

    pub fn new(grade: u32, class: u32) -> Self {
        Self { grade, class }
    }

    pub fn is_assigned(&self) -> bool {
        *self != Self::NONE
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.grade, self.class)
    }
}

impl FromStr for ClassId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (grade, class) = s
            .split_once('-')
            .ok_or_else(|| format!("expected <grade>-<class>, got {:?}", s))?;
        let grade = grade
            .parse()
            .map_err(|e| format!("invalid grade in {:?}: {}", s, e))?;
        let class = class
            .parse()
            .map_err(|e| format!("invalid class in {:?}: {}", s, e))?;
        Ok(Self { grade, class })
    }
}

/// Permission level of an account. Ordered: student < teacher < admin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    Student,
    Teacher,
    Admin,
}

impl Privilege {
    /// Unknown names fall back to `Student`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "teacher" => Privilege::Teacher,
            "admin" => Privilege::Admin,
            _ => Privilege::Student,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::Student => "student",
            Privilege::Teacher => "teacher",
            Privilege::Admin => "admin",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub credential: String,
    pub class_id: ClassId,
    pub privilege: Privilege,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        credential: impl Into<String>,
        class_id: ClassId,
        privilege: Privilege,
    ) -> Self {
        Self {
            id: id.into(),
            credential: credential.into(),
            class_id,
            privilege,
        }
    }
}
