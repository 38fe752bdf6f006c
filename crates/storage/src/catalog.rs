use async_trait::async_trait;
use interview_core::model::{Task, TaskId, TaskLevel, TaskSummary};
use rand::seq::IndexedRandom;
use std::collections::BTreeMap;

use crate::repository::{StorageError, TaskCatalog};

const BUILTIN_TASKS: &str = include_str!("../data/tasks.json");

/// Immutable task set held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tasks: BTreeMap<TaskId, Task>,
}

impl InMemoryCatalog {
    /// Build a catalog from a task list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if two tasks share an id.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Result<Self, StorageError> {
        let mut map = BTreeMap::new();
        for task in tasks {
            let id = task.id().clone();
            if map.insert(id.clone(), task).is_some() {
                return Err(StorageError::Conflict(format!("duplicate task id {id}")));
            }
        }
        Ok(Self { tasks: map })
    }

    /// Parse a JSON array of tasks.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for malformed JSON and
    /// `StorageError::Conflict` for duplicate ids.
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        let tasks: Vec<Task> =
            serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Self::from_tasks(tasks)
    }

    /// The catalog bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the bundled data is malformed.
    pub fn builtin() -> Result<Self, StorageError> {
        Self::from_json(BUILTIN_TASKS)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn pick(candidates: &[&Task]) -> Option<Task> {
        candidates.choose(&mut rand::rng()).map(|task| (*task).clone())
    }
}

#[async_trait]
impl TaskCatalog for InMemoryCatalog {
    async fn get(&self, id: &TaskId) -> Result<Task, StorageError> {
        self.tasks.get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn random(&self) -> Result<Option<Task>, StorageError> {
        let all: Vec<&Task> = self.tasks.values().collect();
        Ok(Self::pick(&all))
    }

    async fn random_by_level(&self, level: TaskLevel) -> Result<Option<Task>, StorageError> {
        let leveled: Vec<&Task> = self
            .tasks
            .values()
            .filter(|task| task.level() == level)
            .collect();
        Ok(Self::pick(&leveled))
    }

    async fn list(&self) -> Result<Vec<TaskSummary>, StorageError> {
        let mut summaries: Vec<TaskSummary> = self.tasks.values().map(Task::summary).collect();
        summaries.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(value: u8) -> TaskLevel {
        TaskLevel::try_from(value).unwrap()
    }

    fn task(id: &str, lvl: u8) -> Task {
        Task::new(
            TaskId::new(id).unwrap(),
            level(lvl),
            id.to_uppercase(),
            "desc",
            "def f():\n    pass",
            Vec::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn builtin_catalog_covers_every_level() {
        let catalog = InMemoryCatalog::builtin().unwrap();
        for lvl in TaskLevel::all() {
            let drawn = catalog.random_by_level(lvl).await.unwrap().unwrap();
            assert_eq!(drawn.level(), lvl);
        }

        let sum = catalog
            .get(&TaskId::new("sum_array").unwrap())
            .await
            .unwrap();
        assert_eq!(sum.tests().len(), 3);
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let catalog = InMemoryCatalog::builtin().unwrap();
        let err = catalog
            .get(&TaskId::new("does_not_exist").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn random_by_level_is_none_for_empty_level() {
        let catalog = InMemoryCatalog::from_tasks(vec![task("a", 1)]).unwrap();
        assert!(catalog.random_by_level(level(3)).await.unwrap().is_none());
        assert!(catalog.random().await.unwrap().is_some());
        assert!(
            InMemoryCatalog::default()
                .random()
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn list_orders_by_level_then_id() {
        let catalog =
            InMemoryCatalog::from_tasks(vec![task("zeta", 1), task("alpha", 2), task("beta", 1)])
                .unwrap();
        let ids: Vec<_> = catalog
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(ids, vec!["beta", "zeta", "alpha"]);
    }

    #[test]
    fn duplicate_ids_conflict() {
        let err = InMemoryCatalog::from_tasks(vec![task("a", 1), task("a", 2)]).unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }
}
