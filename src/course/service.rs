use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use super::RosterLookup;
use super::types::Course;
use crate::error::{ServiceError, ServiceResult};
use crate::storage::memory::ConcurrentMap;

const COURSES_FILE: &str = "courses.json";
const LAUNCHED_FILE: &str = "launched_courses.json";
const ROSTERS_FILE: &str = "course_rosters.json";
const ENROLLMENTS_FILE: &str = "enrollments.json";

/// Owns courses and the two enrollment indexes.
///
/// - `rosters`: course id -> ids of enrolled accounts.
/// - `enrollments`: account id -> the single course it is enrolled in.
///
/// `enroll` and `withdraw` are the only operations that touch both indexes and
/// the capacity counter, and they run under `enrollment_lock` so the capacity
/// check and the three writes form one unit. Everything else relies on the
/// per-map locks alone.
pub struct CourseService {
    courses: ConcurrentMap<String, Course>,
    launched: ConcurrentMap<String, ()>,
    rosters: ConcurrentMap<String, BTreeSet<String>>,
    enrollments: ConcurrentMap<String, String>,
    enrollment_lock: Mutex<()>,
}

impl CourseService {
    /// Creates an empty, purely in-memory service.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::empty())
    }

    /// Loads every snapshot found in `data_dir` and runs the startup
    /// reconciliation pass.
    pub fn open(data_dir: impl AsRef<Path>) -> ServiceResult<Arc<Self>> {
        let service = Self::empty();
        service.load_snapshot(data_dir.as_ref())?;
        let repairs = service.reconcile();
        if repairs > 0 {
            tracing::warn!("Course reconciliation applied {} repair(s)", repairs);
        }
        tracing::info!(
            "Course system initialized: {} course(s), {} launched, {} enrollment(s)",
            service.courses.len(),
            service.launched.len(),
            service.enrollments.len()
        );
        Ok(Arc::new(service))
    }

    fn empty() -> Self {
        Self {
            courses: ConcurrentMap::new(),
            launched: ConcurrentMap::new(),
            rosters: ConcurrentMap::new(),
            enrollments: ConcurrentMap::new(),
            enrollment_lock: Mutex::new(()),
        }
    }

    pub fn load_snapshot(&self, data_dir: &Path) -> ServiceResult<()> {
        self.courses.load(data_dir.join(COURSES_FILE))?;
        self.launched.load(data_dir.join(LAUNCHED_FILE))?;
        self.rosters.load(data_dir.join(ROSTERS_FILE))?;
        self.enrollments.load(data_dir.join(ENROLLMENTS_FILE))?;
        Ok(())
    }

    /// Writes all four maps. Every map is attempted; the first failure is returned.
    pub fn store_snapshot(&self, data_dir: &Path) -> ServiceResult<()> {
        let results = [
            ("courses", self.courses.store(data_dir.join(COURSES_FILE))),
            ("launched courses", self.launched.store(data_dir.join(LAUNCHED_FILE))),
            ("course rosters", self.rosters.store(data_dir.join(ROSTERS_FILE))),
            ("enrollments", self.enrollments.store(data_dir.join(ENROLLMENTS_FILE))),
        ];

        let mut first_error = None;
        for (what, result) in results {
            if let Err(e) = result {
                tracing::error!("Failed to store {}: {}", what, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => {
                tracing::info!("Course data stored successfully");
                Ok(())
            }
        }
    }

    /// Repairs cross-map invariants after a load. Returns the number of repairs.
    ///
    /// The roster is the authority for enrollments: the reverse index and the
    /// enrolled counts are rebuilt from it.
    fn reconcile(&self) -> usize {
        let mut repairs = 0;

        for course_id in self.launched.read_all().into_keys() {
            if !self.courses.contains(&course_id) {
                tracing::error!(
                    "Inconsistent state: launched course {} does not exist, removing",
                    course_id
                );
                self.launched.delete(&course_id);
                repairs += 1;
            }
        }

        for (course_id, course) in self.courses.read_all() {
            let launched = self.launched.contains(&course_id);
            if course.is_launched != launched {
                tracing::error!(
                    "Inconsistent state: course {} launch flag disagrees with launched set, fixing",
                    course_id
                );
                self.courses.update(&course_id, |c| c.is_launched = launched);
                repairs += 1;
            }
            if launched && !self.rosters.contains(&course_id) {
                tracing::error!(
                    "Inconsistent state: launched course {} has no roster, creating",
                    course_id
                );
                self.rosters.write(course_id.clone(), BTreeSet::new());
                repairs += 1;
            }
        }

        for course_id in self.rosters.read_all().into_keys() {
            if !self.launched.contains(&course_id) {
                tracing::error!(
                    "Inconsistent state: roster for {} has no launched course, removing",
                    course_id
                );
                self.rosters.delete(&course_id);
                repairs += 1;
            }
        }

        // An account may hold one seat only; the first roster by course id keeps it.
        let mut by_course: Vec<_> = self.rosters.read_all().into_iter().collect();
        by_course.sort_by(|a, b| a.0.cmp(&b.0));
        let mut seat_holder: HashMap<String, String> = HashMap::new();
        for (course_id, members) in by_course {
            for account_id in members {
                if let Some(kept) = seat_holder.get(&account_id) {
                    tracing::error!(
                        "Inconsistent state: user {} listed in rosters of {} and {}, removing from {}",
                        account_id,
                        kept,
                        course_id,
                        course_id
                    );
                    self.rosters.update(&course_id, |m| m.remove(&account_id));
                    repairs += 1;
                } else {
                    seat_holder.insert(account_id, course_id.clone());
                }
            }
        }

        let rosters = self.rosters.read_all();
        for (course_id, members) in &rosters {
            for account_id in members {
                if self.enrollments.read(account_id).as_ref() != Some(course_id) {
                    tracing::error!(
                        "Inconsistent state: user {} in roster of {} but reverse index disagrees, fixing",
                        account_id,
                        course_id
                    );
                    self.enrollments.write(account_id.clone(), course_id.clone());
                    repairs += 1;
                }
            }
        }

        for (account_id, course_id) in self.enrollments.read_all() {
            let listed = rosters
                .get(&course_id)
                .is_some_and(|members| members.contains(&account_id));
            if !listed {
                tracing::error!(
                    "Inconsistent state: user {} mapped to {} but missing from its roster, removing",
                    account_id,
                    course_id
                );
                self.enrollments.delete(&account_id);
                repairs += 1;
            }
        }

        for (course_id, members) in &rosters {
            let size = members.len() as u32;
            let fixed = self.courses.update(course_id, |c| {
                if c.enrolled_count != size {
                    c.enrolled_count = size;
                    true
                } else {
                    false
                }
            });
            if fixed == Some(true) {
                tracing::error!(
                    "Inconsistent state: enrolled count of {} did not match roster, set to {}",
                    course_id,
                    size
                );
                repairs += 1;
            }
        }

        repairs
    }

    /// Creates a course in the defined (not launched) state. The name is its id.
    pub fn define(&self, name: &str, teacher: &str, capacity: u32) -> ServiceResult<Course> {
        let course = Course::new(name, teacher, capacity);
        if !self.courses.insert_if_absent(course.id.clone(), course.clone()) {
            tracing::warn!("Addition failed: course {} already exists", name);
            return Err(ServiceError::AlreadyExists(format!("course {}", name)));
        }
        tracing::info!("Course {} added (teacher: {}, capacity: {})", name, teacher, capacity);
        Ok(course)
    }

    /// Overwrites name, teacher and capacity of a course that is not launched.
    pub fn edit(
        &self,
        course_id: &str,
        name: &str,
        teacher: &str,
        capacity: u32,
    ) -> ServiceResult<()> {
        let key = course_id.to_string();
        if self.launched.contains(&key) {
            tracing::warn!("Modification failed: course {} is already launched", course_id);
            return Err(ServiceError::AlreadyLaunched(course_id.to_string()));
        }

        // The flag is re-checked inside the write so a racing launch cannot be overwritten.
        let outcome = self.courses.update(&key, |course| {
            if course.is_launched {
                return false;
            }
            course.name = name.to_string();
            course.teacher = teacher.to_string();
            course.capacity = capacity;
            true
        });

        match outcome {
            Some(true) => {
                tracing::info!("Course {} modified", course_id);
                Ok(())
            }
            Some(false) => {
                tracing::warn!("Modification failed: course {} is already launched", course_id);
                Err(ServiceError::AlreadyLaunched(course_id.to_string()))
            }
            None => {
                tracing::warn!("Modification failed: course {} does not exist", course_id);
                Err(ServiceError::NotFound(format!("course {}", course_id)))
            }
        }
    }

    /// One-way `Defined -> Launched` transition.
    ///
    /// The flag flip on the course record decides races between launches. The
    /// roster is allocated before the launched set is written, and enrollment
    /// only consults the launched set, so no enrollment can see a launched
    /// course without its roster.
    pub fn launch(&self, course_id: &str) -> ServiceResult<()> {
        let key = course_id.to_string();
        let flipped = self.courses.update(&key, |course| {
            if course.is_launched {
                false
            } else {
                course.is_launched = true;
                true
            }
        });

        match flipped {
            None => {
                tracing::warn!("Launch failed: course {} does not exist", course_id);
                return Err(ServiceError::NotFound(format!("course {}", course_id)));
            }
            Some(false) => {
                tracing::warn!("Launch failed: course {} is already launched", course_id);
                return Err(ServiceError::AlreadyLaunched(course_id.to_string()));
            }
            Some(true) => {}
        }

        self.rosters.write(key.clone(), BTreeSet::new());
        self.launched.write(key, ());
        tracing::info!("Course {} launched successfully", course_id);
        Ok(())
    }

    /// Enrolls `account_id` in `course_id`, enforcing the capacity bound.
    pub fn enroll(&self, account_id: &str, course_id: &str) -> ServiceResult<()> {
        let _guard = self.enrollment_lock.lock();

        let account = account_id.to_string();
        let key = course_id.to_string();

        if self.enrollments.contains(&account) {
            tracing::warn!("Selection failed: user {} has already selected a course", account_id);
            return Err(ServiceError::AlreadyEnrolled(account));
        }
        if !self.launched.contains(&key) {
            tracing::warn!("Selection failed: course {} is not launched", course_id);
            return Err(ServiceError::NotLaunched(key));
        }

        let course = self.courses.read(&key).ok_or_else(|| {
            ServiceError::fault(format!("launched course {} has no course record", course_id))
        })?;
        if course.is_full() {
            tracing::warn!("Selection failed: course {} is full", course_id);
            return Err(ServiceError::Full(key));
        }

        match self.rosters.update(&key, |members| members.insert(account.clone())) {
            Some(true) => {}
            Some(false) => {
                return Err(ServiceError::fault(format!(
                    "user {} is in the roster of {} without a reverse index entry",
                    account_id, course_id
                )));
            }
            None => {
                return Err(ServiceError::fault(format!(
                    "launched course {} has no roster",
                    course_id
                )));
            }
        }
        self.enrollments.write(account, key.clone());
        self.courses.update(&key, |c| c.enrolled_count += 1);

        tracing::info!("User {} selected course {} successfully", account_id, course_id);
        Ok(())
    }

    /// Withdraws `account_id` from whatever course it is enrolled in.
    /// Returns the id of that course.
    pub fn withdraw(&self, account_id: &str) -> ServiceResult<String> {
        let _guard = self.enrollment_lock.lock();

        let account = account_id.to_string();
        let Some(course_id) = self.enrollments.read(&account) else {
            tracing::warn!("Drop failed: user {} has not selected any course", account_id);
            return Err(ServiceError::NotEnrolled(account));
        };

        match self.rosters.update(&course_id, |members| members.remove(&account)) {
            Some(true) => {}
            Some(false) => {
                return Err(ServiceError::fault(format!(
                    "user {} is mapped to course {} but absent from its roster",
                    account_id, course_id
                )));
            }
            None => {
                return Err(ServiceError::fault(format!(
                    "course {} for user {} has no roster",
                    course_id, account_id
                )));
            }
        }
        self.enrollments.delete(&account);
        self.courses
            .update(&course_id, |c| c.enrolled_count = c.enrolled_count.saturating_sub(1));

        tracing::info!("User {} dropped course {} successfully", account_id, course_id);
        Ok(course_id)
    }

    pub fn get_course(&self, course_id: &str) -> ServiceResult<Course> {
        self.courses
            .read(&course_id.to_string())
            .ok_or_else(|| ServiceError::NotFound(format!("course {}", course_id)))
    }

    /// All courses, ordered by id.
    pub fn get_all_courses(&self) -> Vec<Course> {
        let mut courses: Vec<Course> = self.courses.read_all().into_values().collect();
        courses.sort_by(|a, b| a.id.cmp(&b.id));
        courses
    }

    /// Ids of the accounts enrolled in a launched course, in sorted order.
    pub fn list_roster(&self, course_id: &str) -> ServiceResult<Vec<String>> {
        match self.rosters.read(&course_id.to_string()) {
            Some(members) => Ok(members.into_iter().collect()),
            None => {
                tracing::warn!(
                    "GetCourseUsers failed: course {} is not launched or does not exist",
                    course_id
                );
                Err(ServiceError::NotFound(format!("launched course {}", course_id)))
            }
        }
    }

    /// The course an account is enrolled in, if any.
    pub fn enrolled_course(&self, account_id: &str) -> Option<String> {
        self.enrollments.read(&account_id.to_string())
    }

    pub fn enrollment_count(&self) -> usize {
        self.enrollments.len()
    }
}

impl RosterLookup for CourseService {
    fn roster(&self, course_id: &str) -> ServiceResult<Vec<String>> {
        self.list_roster(course_id)
    }
}
