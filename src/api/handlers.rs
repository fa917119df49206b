use axum::{Extension, Json, http::StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;

use super::protocol::*;
use crate::account::service::AccountService;
use crate::account::types::{Account, ClassId, Privilege};
use crate::course::service::CourseService;
use crate::error::ServiceError;
use crate::session::service::SessionService;
use crate::session::types::Identity;

/// Services shared by every request.
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub courses: Arc<CourseService>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub fn new(
        accounts: Arc<AccountService>,
        courses: Arc<CourseService>,
        sessions: Arc<SessionService>,
    ) -> Arc<Self> {
        Arc::new(Self {
            accounts,
            courses,
            sessions,
        })
    }
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("{}", MSG_PERMISSION_DENIED)]
    PermissionDenied,

    #[error("invalid parameters: {0}")]
    BadParameters(String),

    #[error("failed to create session")]
    SessionUnavailable,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ApiError {
    /// Business failures travel in `errorMessage` with 200, as the client expects.
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadParameters(_) => StatusCode::BAD_REQUEST,
            ApiError::SessionUnavailable
            | ApiError::Service(ServiceError::ConsistencyFault(_))
            | ApiError::Service(ServiceError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        }
    }
}

type ApiResult = Result<ApiResponse, ApiError>;

pub async fn handle_api(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<ApiRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let action = req.action.parse::<Action>();

    let caller = match &action {
        Ok(action) if !action.requires_session() => None,
        _ => match state.sessions.resolve(&req.token) {
            Ok(identity) => Some(identity),
            Err(_) => {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(ApiResponse::error(MSG_INVALID_TOKEN)),
                );
            }
        },
    };

    let action = match action {
        Ok(action) => action,
        Err(e) => {
            tracing::warn!("Rejected request: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(MSG_UNKNOWN_ACTION)),
            );
        }
    };

    let result = match caller {
        Some(caller) => dispatch(&state, action, &caller, &req.token, req.parameters),
        None => log_in(&state, req.parameters),
    };

    match result {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(e) => {
            tracing::debug!("Action {:?} failed: {}", action, e);
            (e.status(), Json(ApiResponse::error(e.to_string())))
        }
    }
}

fn dispatch(
    state: &AppState,
    action: Action,
    caller: &Identity,
    token: &str,
    parameters: serde_json::Value,
) -> ApiResult {
    match action {
        Action::LogIn => log_in(state, parameters),
        Action::LogOut => {
            state.sessions.logout(token)?;
            Ok(ApiResponse::default())
        }
        Action::Register => {
            require(caller, Privilege::Admin)?;
            let RegisterParams { user_info } = decode(parameters)?;
            let account = Account::new(
                user_info.name,
                user_info.password,
                user_info.identity_info.class.unwrap_or(ClassId::NONE),
                user_info.identity_info.privilege.to_privilege(),
            );
            state.accounts.register(account)?;
            Ok(ApiResponse::default())
        }
        Action::Remove => {
            require(caller, Privilege::Admin)?;
            let NameParams { name } = decode(parameters)?;
            remove_account(state, &name)?;
            Ok(ApiResponse::default())
        }
        Action::ModifyPassword => {
            let PasswordParams { password } = decode(parameters)?;
            state.accounts.change_credential(&caller.id, &password)?;
            Ok(ApiResponse::default())
        }
        Action::GetUserInfo => {
            let NameParams { name } = decode(parameters)?;
            if name != caller.id {
                require(caller, Privilege::Teacher)?;
            }
            let mut view = UserView::from(state.accounts.get(&name)?);
            view.selected_course = state.courses.enrolled_course(&name);
            Ok(ApiResponse {
                user_info: Some(view),
                ..Default::default()
            })
        }
        Action::GetAllUsersInfo => {
            require(caller, Privilege::Admin)?;
            Ok(users_response(state.accounts.list_all()))
        }
        Action::GetPartUsersInfo => {
            require(caller, Privilege::Teacher)?;
            let params: PartUsersParams = decode(parameters)?;
            let members = match (params.way, params.class, params.course_name) {
                (0, Some(class_id), _) => state.accounts.list_by_class(class_id)?,
                (1, _, Some(course_id)) => state
                    .accounts
                    .list_by_course(&course_id, state.courses.as_ref())?,
                (0, None, _) => return Err(ApiError::BadParameters("way 0 needs class".into())),
                (1, _, None) => {
                    return Err(ApiError::BadParameters("way 1 needs courseName".into()));
                }
                (way, _, _) => return Err(ApiError::BadParameters(format!("unknown way {}", way))),
            };
            Ok(users_response(members))
        }
        Action::AddCourse => {
            require(caller, Privilege::Teacher)?;
            let AddCourseParams { course_info } = decode(parameters)?;
            state.courses.define(
                &course_info.name,
                &course_info.teacher_name,
                course_info.maximum,
            )?;
            Ok(ApiResponse::default())
        }
        Action::ModifyCourse => {
            require(caller, Privilege::Teacher)?;
            let ModifyCourseParams {
                course_name,
                course_info,
            } = decode(parameters)?;
            state.courses.edit(
                &course_name,
                &course_info.name,
                &course_info.teacher_name,
                course_info.maximum,
            )?;
            Ok(ApiResponse::default())
        }
        Action::LaunchCourse => {
            require(caller, Privilege::Teacher)?;
            let CourseNameParams { course_name } = decode(parameters)?;
            state.courses.launch(&course_name)?;
            Ok(ApiResponse::default())
        }
        Action::GetAllCoursesInfo => {
            let courses = state
                .courses
                .get_all_courses()
                .into_iter()
                .map(CourseView::from)
                .collect();
            Ok(ApiResponse {
                courses: Some(courses),
                ..Default::default()
            })
        }
        Action::SelectCourse => {
            let CourseNameParams { course_name } = decode(parameters)?;
            // Sessions outlive account removal; the enrollment is made while
            // the caller's account is pinned so a racing `Remove` cannot strand it.
            state
                .accounts
                .with_account(&caller.id, |_| state.courses.enroll(&caller.id, &course_name))??;
            Ok(ApiResponse::default())
        }
        Action::DropCourse => {
            let course_id = state.courses.withdraw(&caller.id)?;
            Ok(ApiResponse {
                course_name: Some(course_id),
                ..Default::default()
            })
        }
    }
}

fn log_in(state: &AppState, parameters: serde_json::Value) -> ApiResult {
    let LogInParams { name, password } = decode(parameters)?;
    let privilege = state.accounts.authenticate(&name, &password)?;
    let token = state.sessions.login(Identity::new(name, privilege));
    if token.is_empty() {
        return Err(ApiError::SessionUnavailable);
    }
    Ok(ApiResponse {
        auth_token: Some(token),
        ..Default::default()
    })
}

/// Drops the account's enrollment and deletes the account as one step, so no
/// course roster is left naming a deleted user.
fn remove_account(state: &AppState, name: &str) -> Result<(), ApiError> {
    state.accounts.remove_with(name, || match state.courses.withdraw(name) {
        Ok(course_id) => {
            tracing::info!("Dropped {} from course {} before removal", name, course_id);
            Ok(())
        }
        Err(ServiceError::NotEnrolled(_)) => Ok(()),
        Err(e) => Err(e),
    })?;
    Ok(())
}

fn require(caller: &Identity, minimum: Privilege) -> Result<(), ApiError> {
    if caller.privilege >= minimum {
        return Ok(());
    }
    tracing::warn!(
        "Permission denied: user {} ({}) needs {}",
        caller.id,
        caller.privilege,
        minimum
    );
    Err(ApiError::PermissionDenied)
}

fn decode<T: DeserializeOwned>(parameters: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(parameters).map_err(|e| {
        tracing::warn!("Failed to parse parameters: {}", e);
        ApiError::BadParameters(e.to_string())
    })
}

fn users_response(accounts: Vec<Account>) -> ApiResponse {
    ApiResponse {
        users: Some(accounts.into_iter().map(UserView::from).collect()),
        ..Default::default()
    }
}
