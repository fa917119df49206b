use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use super::types::{Account, ClassId, Privilege};
use crate::course::RosterLookup;
use crate::error::{ServiceError, ServiceResult};
use crate::storage::memory::ConcurrentMap;

const ACCOUNTS_FILE: &str = "accounts.json";
const CLASS_ROSTERS_FILE: &str = "class_rosters.json";

pub const DEFAULT_ADMIN_ID: &str = "admin";
pub const DEFAULT_ADMIN_CREDENTIAL: &str = "123456";

/// Account lifecycle plus the class roster index derived from it.
///
/// `register` and `remove` change both maps and run under `index_lock`, so a
/// racing register/remove pair cannot leave an account without its roster
/// entry or a roster entry without its account.
pub struct AccountService {
    accounts: ConcurrentMap<String, Account>,
    class_rosters: ConcurrentMap<ClassId, BTreeSet<String>>,
    index_lock: Mutex<()>,
}

impl AccountService {
    /// Creates an in-memory service holding only the default administrator.
    pub fn new() -> Arc<Self> {
        let service = Self::empty();
        service.seed_admin();
        Arc::new(service)
    }

    /// Loads the snapshots in `data_dir`, seeds the administrator if missing and
    /// reconciles the class rosters against the accounts.
    pub fn open(data_dir: impl AsRef<Path>) -> ServiceResult<Arc<Self>> {
        let service = Self::empty();
        service.load_snapshot(data_dir.as_ref())?;
        service.seed_admin();
        let repairs = service.reconcile();
        if repairs > 0 {
            tracing::warn!("Account reconciliation applied {} repair(s)", repairs);
        }
        tracing::info!("Account system initialized: {} account(s)", service.accounts.len());
        Ok(Arc::new(service))
    }

    fn empty() -> Self {
        Self {
            accounts: ConcurrentMap::new(),
            class_rosters: ConcurrentMap::new(),
            index_lock: Mutex::new(()),
        }
    }

    fn seed_admin(&self) {
        let admin = Account::new(
            DEFAULT_ADMIN_ID,
            DEFAULT_ADMIN_CREDENTIAL,
            ClassId::NONE,
            Privilege::Admin,
        );
        if self.accounts.insert_if_absent(admin.id.clone(), admin) {
            tracing::info!("Seeded default administrator account");
        }
    }

    pub fn load_snapshot(&self, data_dir: &Path) -> ServiceResult<()> {
        self.accounts.load(data_dir.join(ACCOUNTS_FILE))?;
        self.class_rosters.load(data_dir.join(CLASS_ROSTERS_FILE))?;
        Ok(())
    }

    pub fn store_snapshot(&self, data_dir: &Path) -> ServiceResult<()> {
        let accounts = self.accounts.store(data_dir.join(ACCOUNTS_FILE));
        if let Err(e) = &accounts {
            tracing::error!("Failed to store user info: {}", e);
        }
        let rosters = self.class_rosters.store(data_dir.join(CLASS_ROSTERS_FILE));
        if let Err(e) = &rosters {
            tracing::error!("Failed to store class user info: {}", e);
        }
        accounts?;
        rosters?;
        tracing::info!("Account data stored successfully");
        Ok(())
    }

    /// Startup repair. Accounts are the source of truth for class membership.
    fn reconcile(&self) -> usize {
        let mut repairs = 0;
        let accounts = self.accounts.read_all();

        for (class_id, members) in self.class_rosters.read_all() {
            for account_id in members {
                let belongs = accounts
                    .get(&account_id)
                    .is_some_and(|account| account.class_id == class_id);
                if !belongs {
                    tracing::error!(
                        "Inconsistent state: user {} listed in class {} but does not belong there, removing",
                        account_id,
                        class_id
                    );
                    self.class_rosters.update(&class_id, |set| set.remove(&account_id));
                    repairs += 1;
                }
            }
        }

        for account in accounts.values() {
            if !account.class_id.is_assigned() {
                continue;
            }
            let added = self
                .class_rosters
                .upsert_with(account.class_id, BTreeSet::new, |set| {
                    set.insert(account.id.clone())
                });
            if added {
                tracing::error!(
                    "Inconsistent state: user {} missing from class {}, adding",
                    account.id,
                    account.class_id
                );
                repairs += 1;
            }
        }

        repairs
    }

    pub fn register(&self, account: Account) -> ServiceResult<()> {
        let _guard = self.index_lock.lock();

        let id = account.id.clone();
        let class_id = account.class_id;
        if !self.accounts.insert_if_absent(id.clone(), account) {
            tracing::warn!("Registration failed: user {} already exists", id);
            return Err(ServiceError::AlreadyExists(format!("user {}", id)));
        }
        if class_id.is_assigned() {
            self.class_rosters
                .upsert_with(class_id, BTreeSet::new, |set| set.insert(id.clone()));
        }

        tracing::info!("User {} registered in class {}", id, class_id);
        Ok(())
    }

    /// Deletes an account and its class roster entry.
    ///
    /// A missing roster for an assigned class aborts the removal with a
    /// `ConsistencyFault`; nothing is deleted in that case.
    pub fn remove(&self, id: &str) -> ServiceResult<Account> {
        self.remove_with(id, || Ok(()))
    }

    /// Like `remove`, but first runs `detach` to release whatever else refers
    /// to the account. `detach` runs under the index lock, after the existence
    /// and roster checks; if it fails nothing is deleted.
    ///
    /// `detach` must not call back into this service's locking operations.
    pub fn remove_with(
        &self,
        id: &str,
        detach: impl FnOnce() -> ServiceResult<()>,
    ) -> ServiceResult<Account> {
        let _guard = self.index_lock.lock();

        let key = id.to_string();
        let Some(account) = self.accounts.read(&key) else {
            tracing::warn!("Removal failed: user {} does not exist", id);
            return Err(ServiceError::NotFound(format!("user {}", id)));
        };

        let class_id = account.class_id;
        if class_id.is_assigned() && !self.class_rosters.contains(&class_id) {
            return Err(ServiceError::fault(format!(
                "class {} for user {} does not exist",
                class_id, id
            )));
        }

        detach()?;

        if class_id.is_assigned() {
            self.class_rosters.update(&class_id, |set| set.remove(&key));
        }
        self.accounts.delete(&key);

        tracing::info!("User {} removed", id);
        Ok(account)
    }

    /// Runs `f` on the account while it cannot be removed.
    ///
    /// `f` must not call back into this service's locking operations.
    pub fn with_account<R>(&self, id: &str, f: impl FnOnce(&Account) -> R) -> ServiceResult<R> {
        let _guard = self.index_lock.lock();
        let account = self.get(id)?;
        Ok(f(&account))
    }

    pub fn authenticate(&self, id: &str, credential: &str) -> ServiceResult<Privilege> {
        let Some(account) = self.accounts.read(&id.to_string()) else {
            tracing::warn!("Login failed: user {} does not exist", id);
            return Err(ServiceError::NotFound(format!("user {}", id)));
        };
        if account.credential != credential {
            tracing::warn!("Login failed: incorrect password for user {}", id);
            return Err(ServiceError::InvalidCredential(id.to_string()));
        }
        tracing::info!("User {} logged in successfully", id);
        Ok(account.privilege)
    }

    pub fn change_credential(&self, id: &str, new_credential: &str) -> ServiceResult<()> {
        let changed = self.accounts.update(&id.to_string(), |account| {
            account.credential = new_credential.to_string();
        });
        match changed {
            Some(()) => {
                tracing::info!("Password for user {} modified successfully", id);
                Ok(())
            }
            None => {
                tracing::warn!("Password modification failed: user {} does not exist", id);
                Err(ServiceError::NotFound(format!("user {}", id)))
            }
        }
    }

    pub fn get(&self, id: &str) -> ServiceResult<Account> {
        self.accounts.read(&id.to_string()).ok_or_else(|| {
            tracing::warn!("GetUserInfo failed: user {} does not exist", id);
            ServiceError::NotFound(format!("user {}", id))
        })
    }

    /// Roster read and member lookup happen under the index lock so a
    /// concurrent `remove` cannot slip between them.
    pub fn list_by_class(&self, class_id: ClassId) -> ServiceResult<Vec<Account>> {
        let _guard = self.index_lock.lock();
        let Some(members) = self.class_rosters.read(&class_id) else {
            tracing::warn!("GetClassUsers failed: class {} does not exist", class_id);
            return Err(ServiceError::NotFound(format!("class {}", class_id)));
        };
        self.resolve_members(members, &format!("class {}", class_id))
    }

    /// Lists the accounts enrolled in `course_id`, as reported by `rosters`.
    ///
    /// Holds the index lock like `list_by_class`; `rosters` must not call
    /// back into this service.
    pub fn list_by_course(
        &self,
        course_id: &str,
        rosters: &dyn RosterLookup,
    ) -> ServiceResult<Vec<Account>> {
        let _guard = self.index_lock.lock();
        let members = rosters.roster(course_id)?;
        self.resolve_members(members, &format!("course {}", course_id))
    }

    /// All accounts, ordered by id.
    pub fn list_all(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.accounts.read_all().into_values().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }

    fn resolve_members(
        &self,
        members: impl IntoIterator<Item = String>,
        scope: &str,
    ) -> ServiceResult<Vec<Account>> {
        members
            .into_iter()
            .map(|id| {
                self.accounts.read(&id).ok_or_else(|| {
                    ServiceError::fault(format!("user {} in {} does not exist", id, scope))
                })
            })
            .collect()
    }
}
