//! API Protocol
//!
//! Wire format of the single `/api` endpoint. Every call is a POST carrying an
//! action name, the caller's token and action-specific parameters. Field names
//! follow the camelCase convention of the browser client.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::account::types::{Account, ClassId, Privilege};
use crate::course::types::Course;

pub const ENDPOINT_API: &str = "/api";

pub const MSG_PERMISSION_DENIED: &str = "Permission denied";
pub const MSG_INVALID_TOKEN: &str = "Invalid token";
pub const MSG_UNKNOWN_ACTION: &str = "Unknown action";

// --- Envelope ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiRequest {
    #[serde(default)]
    pub token: String,
    pub action: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Opaque client metadata, accepted and ignored.
    #[serde(default)]
    pub meta: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Register,
    Remove,
    LogIn,
    LogOut,
    ModifyPassword,
    GetUserInfo,
    GetAllUsersInfo,
    GetPartUsersInfo,
    AddCourse,
    ModifyCourse,
    LaunchCourse,
    GetAllCoursesInfo,
    SelectCourse,
    DropCourse,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "Register" => Action::Register,
            "Remove" => Action::Remove,
            "LogIn" => Action::LogIn,
            "LogOut" => Action::LogOut,
            "ModifyPassword" => Action::ModifyPassword,
            "GetUserInfo" => Action::GetUserInfo,
            "GetAllUsersInfo" => Action::GetAllUsersInfo,
            "GetPartUsersInfo" => Action::GetPartUsersInfo,
            "AddCourse" => Action::AddCourse,
            "ModifyCourse" => Action::ModifyCourse,
            "LaunchCourse" => Action::LaunchCourse,
            "GetAllCoursesInfo" => Action::GetAllCoursesInfo,
            "SelectCourse" => Action::SelectCourse,
            "DropCourse" => Action::DropCourse,
            other => return Err(format!("unknown action {:?}", other)),
        };
        Ok(action)
    }
}

impl Action {
    /// Every action except `LogIn` needs a live session.
    pub fn requires_session(&self) -> bool {
        *self != Action::LogIn
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(rename = "authToken", skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(rename = "userInfo", skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courses: Option<Vec<CourseView>>,
    #[serde(rename = "courseName", skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
}

impl ApiResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

// --- Parameters ---

/// Privilege as sent by clients: either a name or the numeric level 0-2.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrivilegeParam {
    Level(u8),
    Name(String),
}

impl Default for PrivilegeParam {
    fn default() -> Self {
        PrivilegeParam::Level(0)
    }
}

impl PrivilegeParam {
    pub fn to_privilege(&self) -> Privilege {
        match self {
            PrivilegeParam::Level(1) => Privilege::Teacher,
            PrivilegeParam::Level(2) => Privilege::Admin,
            PrivilegeParam::Level(_) => Privilege::Student,
            PrivilegeParam::Name(name) => Privilege::from_name(name),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityInfoParam {
    #[serde(default)]
    pub class: Option<ClassId>,
    #[serde(default)]
    pub privilege: PrivilegeParam,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfoParam {
    pub name: String,
    pub password: String,
    #[serde(rename = "identityInfo")]
    pub identity_info: IdentityInfoParam,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterParams {
    #[serde(rename = "userInfo")]
    pub user_info: UserInfoParam,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NameParams {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogInParams {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordParams {
    pub password: String,
}

/// `way` 0 lists a class, `way` 1 lists the members of a course.
#[derive(Debug, Serialize, Deserialize)]
pub struct PartUsersParams {
    pub way: u8,
    #[serde(default)]
    pub class: Option<ClassId>,
    #[serde(rename = "courseName", default)]
    pub course_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CourseInfoParam {
    pub name: String,
    #[serde(rename = "teacherName")]
    pub teacher_name: String,
    pub maximum: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddCourseParams {
    #[serde(rename = "courseInfo")]
    pub course_info: CourseInfoParam,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModifyCourseParams {
    #[serde(rename = "courseName")]
    pub course_name: String,
    #[serde(rename = "courseInfo")]
    pub course_info: CourseInfoParam,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CourseNameParams {
    #[serde(rename = "courseName")]
    pub course_name: String,
}

// --- Views ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityView {
    pub class: ClassId,
    pub privilege: Privilege,
}

/// Account as shown to clients. The credential never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserView {
    pub name: String,
    #[serde(rename = "identityInfo")]
    pub identity_info: IdentityView,
    #[serde(rename = "selectedCourse", skip_serializing_if = "Option::is_none", default)]
    pub selected_course: Option<String>,
}

impl From<Account> for UserView {
    fn from(account: Account) -> Self {
        Self {
            name: account.id,
            identity_info: IdentityView {
                class: account.class_id,
                privilege: account.privilege,
            },
            selected_course: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseView {
    /// Stable key for `courseName` parameters; `name` may change until launch.
    pub id: String,
    pub name: String,
    #[serde(rename = "teacherName")]
    pub teacher_name: String,
    pub maximum: u32,
    pub selected: u32,
    pub launched: bool,
}

impl From<Course> for CourseView {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            name: course.name,
            teacher_name: course.teacher,
            maximum: course.capacity,
            selected: course.enrolled_count,
            launched: course.is_launched,
        }
    }
}
