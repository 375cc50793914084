// src/db/memory.rs

//! In-process stores. Selected with `STORAGE_BACKEND=memory`; the test
//! suite runs the whole router against them.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CourseMutation, CourseStore, EvaluationStore, UserStore,
    vault::{FileTables, VaultDriver, VaultTable},
};
use crate::{
    error::AppError,
    models::{
        course::Course,
        evaluation::{Evaluation, EvaluationResult},
        file::{FileIndexEntry, FileLocation, StoredFile},
        user::User,
    },
};

#[derive(Default)]
pub struct MemoryStore {
    courses: Mutex<HashMap<Uuid, Course>>,
    users: Mutex<HashMap<Uuid, User>>,
    evaluations: Mutex<HashMap<Uuid, Evaluation>>,
    results: Mutex<Vec<EvaluationResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CourseStore for MemoryStore {
    async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        let courses = self.courses.lock().await;
        let mut list: Vec<Course> = courses.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, AppError> {
        Ok(self.courses.lock().await.get(&id).cloned())
    }

    async fn insert_course(&self, mut course: Course) -> Result<Course, AppError> {
        course.created_at = Some(chrono::Utc::now());
        self.courses.lock().await.insert(course.id, course.clone());
        Ok(course)
    }

    async fn update_course(&self, id: Uuid, mutation: CourseMutation) -> Result<Course, AppError> {
        // The lock is held across the whole read-modify-write
        let mut courses = self.courses.lock().await;
        let current = courses
            .get(&id)
            .ok_or(AppError::NotFound("Course not found".to_string()))?;

        let mut updated = current.clone();
        mutation(&mut updated)?;
        courses.insert(id, updated.clone());

        Ok(updated)
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool, AppError> {
        let removed = self.courses.lock().await.remove(&id).is_some();
        if !removed {
            return Ok(false);
        }

        let mut evaluations = self.evaluations.lock().await;
        let dropped: Vec<Uuid> = evaluations
            .values()
            .filter(|e| e.course_id == id)
            .map(|e| e.id)
            .collect();
        for evaluation_id in &dropped {
            evaluations.remove(evaluation_id);
        }
        drop(evaluations);

        self.results
            .lock()
            .await
            .retain(|r| !dropped.contains(&r.evaluation_id));

        for user in self.users.lock().await.values_mut() {
            user.enrolled_courses.retain(|c| *c != id);
            user.created_courses.retain(|c| *c != id);
        }

        Ok(true)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, mut user: User) -> Result<User, AppError> {
        let mut users = self.users.lock().await;
        if users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(AppError::Conflict(format!(
                "Username '{}' or email '{}' already exists",
                user.username, user.email
            )));
        }

        user.created_at = Some(chrono::Utc::now());
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let users = self.users.lock().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn add_enrolled_course(&self, user_id: Uuid, course_id: Uuid) -> Result<(), AppError> {
        let mut users = self.users.lock().await;
        let user = users
            .get_mut(&user_id)
            .ok_or(AppError::NotFound("User not found".to_string()))?;
        if !user.enrolled_courses.contains(&course_id) {
            user.enrolled_courses.push(course_id);
        }
        Ok(())
    }

    async fn add_created_course(&self, user_id: Uuid, course_id: Uuid) -> Result<(), AppError> {
        let mut users = self.users.lock().await;
        let user = users
            .get_mut(&user_id)
            .ok_or(AppError::NotFound("User not found".to_string()))?;
        if !user.created_courses.contains(&course_id) {
            user.created_courses.push(course_id);
        }
        Ok(())
    }
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn insert_evaluation(&self, mut evaluation: Evaluation) -> Result<Evaluation, AppError> {
        evaluation.created_at = Some(chrono::Utc::now());
        self.evaluations
            .lock()
            .await
            .insert(evaluation.id, evaluation.clone());
        Ok(evaluation)
    }

    async fn get_evaluation(&self, id: Uuid) -> Result<Option<Evaluation>, AppError> {
        Ok(self.evaluations.lock().await.get(&id).cloned())
    }

    async fn list_evaluations(&self, course_id: Uuid) -> Result<Vec<Evaluation>, AppError> {
        let evaluations = self.evaluations.lock().await;
        let mut list: Vec<Evaluation> = evaluations
            .values()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect();
        list.sort_by_key(|e| e.start_date);
        Ok(list)
    }

    async fn insert_result(&self, result: EvaluationResult) -> Result<EvaluationResult, AppError> {
        let mut results = self.results.lock().await;
        if results
            .iter()
            .any(|r| r.evaluation_id == result.evaluation_id && r.student_id == result.student_id)
        {
            return Err(AppError::Conflict("Evaluation already submitted".to_string()));
        }
        results.push(result.clone());
        Ok(result)
    }

    async fn list_results(&self, evaluation_id: Uuid) -> Result<Vec<EvaluationResult>, AppError> {
        let results = self.results.lock().await;
        Ok(results
            .iter()
            .filter(|r| r.evaluation_id == evaluation_id)
            .cloned()
            .collect())
    }
}

/// In-memory file vault driver. Counts DDL so bootstrap behavior can be observed.
#[derive(Default)]
pub struct MemoryVaultDriver {
    tables: Arc<MemoryFileTables>,
    keyspaces_created: AtomicUsize,
    connections: AtomicUsize,
    fail_keyspace: AtomicBool,
}

impl MemoryVaultDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table set every session of this driver shares.
    pub fn tables(&self) -> Arc<MemoryFileTables> {
        self.tables.clone()
    }

    pub fn keyspaces_created(&self) -> usize {
        self.keyspaces_created.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Makes keyspace creation fail until switched off again.
    pub fn fail_keyspace_creation(&self, fail: bool) {
        self.fail_keyspace.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl VaultDriver for MemoryVaultDriver {
    async fn create_keyspace(&self, keyspace: &str) -> Result<(), AppError> {
        if self.fail_keyspace.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(format!(
                "cannot create keyspace {}",
                keyspace
            )));
        }
        self.keyspaces_created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(&self, _keyspace: &str) -> Result<Arc<dyn FileTables>, AppError> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.clone())
    }
}

#[derive(Default)]
pub struct MemoryFileTables {
    files: Mutex<HashMap<Uuid, StoredFile>>,
    index: Mutex<HashMap<FileLocation, BTreeMap<Uuid, FileIndexEntry>>>,
    tables_created: AtomicUsize,
    payload_reads: AtomicUsize,
    fail_index_writes: AtomicBool,
    fail_index_deletes: AtomicBool,
}

impl MemoryFileTables {
    pub fn tables_created(&self) -> usize {
        self.tables_created.load(Ordering::SeqCst)
    }

    /// How many times a full record, payload included, was read.
    pub fn payload_reads(&self) -> usize {
        self.payload_reads.load(Ordering::SeqCst)
    }

    /// Makes writes to `files_by_course` fail until switched off again.
    pub fn fail_index_writes(&self, fail: bool) {
        self.fail_index_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes deletes from `files_by_course` fail until switched off again.
    pub fn fail_index_deletes(&self, fail: bool) {
        self.fail_index_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn primary_count(&self) -> usize {
        self.files.lock().await.len()
    }

    pub async fn index_count(&self) -> usize {
        self.index.lock().await.values().map(BTreeMap::len).sum()
    }
}

#[async_trait]
impl FileTables for MemoryFileTables {
    async fn create_table(&self, table: VaultTable) -> Result<(), AppError> {
        tracing::debug!("Creating in-memory table {}", table.name());
        self.tables_created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn insert_file(&self, file: &StoredFile) -> Result<(), AppError> {
        self.files.lock().await.insert(file.id, file.clone());
        Ok(())
    }

    async fn insert_index(&self, entry: &FileIndexEntry) -> Result<(), AppError> {
        if self.fail_index_writes.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(
                "files_by_course write rejected".to_string(),
            ));
        }
        self.index
            .lock()
            .await
            .entry(entry.location.clone())
            .or_default()
            .insert(entry.file_id, entry.clone());
        Ok(())
    }

    async fn get_file(&self, id: Uuid) -> Result<Option<StoredFile>, AppError> {
        self.payload_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.files.lock().await.get(&id).cloned())
    }

    async fn get_file_info(&self, id: Uuid) -> Result<Option<FileIndexEntry>, AppError> {
        Ok(self.files.lock().await.get(&id).map(FileIndexEntry::from))
    }

    async fn list_index(&self, location: &FileLocation) -> Result<Vec<FileIndexEntry>, AppError> {
        let index = self.index.lock().await;
        Ok(index
            .get(location)
            .map(|partition| partition.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_file(&self, id: Uuid) -> Result<(), AppError> {
        self.files.lock().await.remove(&id);
        Ok(())
    }

    async fn delete_index(&self, location: &FileLocation, file_id: Uuid) -> Result<(), AppError> {
        if self.fail_index_deletes.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(
                "files_by_course delete rejected".to_string(),
            ));
        }
        let mut index = self.index.lock().await;
        if let Some(partition) = index.get_mut(location) {
            partition.remove(&file_id);
            if partition.is_empty() {
                index.remove(location);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::course::{CourseState, Tab},
        services::ordering,
    };

    fn course() -> Course {
        Course {
            id: Uuid::new_v4(),
            code: "CS101".to_string(),
            name: "Intro".to_string(),
            description: String::new(),
            start_date: None,
            end_date: None,
            image: None,
            student_list: Vec::new(),
            teacher: "teacher1".to_string(),
            state: CourseState::InEdition,
            tabs: Vec::new(),
            created_at: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_tab_inserts_keep_orders_contiguous() {
        const TASKS: i32 = 32;
        let store = Arc::new(MemoryStore::new());
        let course = store.insert_course(course()).await.unwrap();
        let course_id = course.id;

        let handles: Vec<_> = (0..TASKS)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .update_course(
                            course_id,
                            Box::new(move |course: &mut Course| -> Result<(), AppError> {
                                let order = ordering::place(&mut course.tabs, Some(0));
                                course.tabs.push(Tab {
                                    id: Uuid::new_v4(),
                                    course: course_id,
                                    title: format!("Tab {}", i),
                                    description: String::new(),
                                    order,
                                    parent_tab: None,
                                    contents: Vec::new(),
                                });
                                Ok(())
                            }),
                        )
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.get_course(course_id).await.unwrap().unwrap();
        let mut orders: Vec<i32> = stored.tabs.iter().map(|t| t.order).collect();
        orders.sort();
        assert_eq!(orders, (0..TASKS).collect::<Vec<_>>());
    }
}
