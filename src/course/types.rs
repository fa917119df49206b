use serde::{Deserialize, Serialize};

/// A course offered for selection.
///
/// `enrolled_count` always equals the size of the course roster once the
/// course is launched. Name, teacher and capacity are frozen by launch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub teacher: String,
    pub capacity: u32,
    pub enrolled_count: u32,
    pub is_launched: bool,
}

impl Course {
    pub fn new(name: impl Into<String>, teacher: impl Into<String>, capacity: u32) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            teacher: teacher.into(),
            capacity,
            enrolled_count: 0,
            is_launched: false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.enrolled_count >= self.capacity
    }
}
