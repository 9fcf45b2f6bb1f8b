use crate::firestore::constants::DEFAULT_DATABASE_ID;
use crate::firestore::error::{missing_project_id, FirestoreResult};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DatabaseId {
    project_id: String,
    database: String,
}

impl DatabaseId {
    pub fn new(project_id: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: database.into(),
        }
    }

    pub fn default(project_id: impl Into<String>) -> Self {
        Self::new(project_id, DEFAULT_DATABASE_ID)
    }

    /// Builds the id for the default database, rejecting a blank project id.
    pub fn for_project(project_id: &str) -> FirestoreResult<Self> {
        if project_id.trim().is_empty() {
            return Err(missing_project_id());
        }
        Ok(Self::default(project_id))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self::new(self.project_id.clone(), database)
    }

    /// `projects/{project}/databases/{database}`
    pub fn database_name(&self) -> String {
        format!("projects/{}/databases/{}", self.project_id, self.database)
    }

    /// Absolute prefix shared by every document name, including the trailing slash.
    pub fn documents_root(&self) -> String {
        format!("{}/documents/", self.database_name())
    }

    /// Absolute resource name of the document at `relative_path`.
    pub fn document_name(&self, relative_path: &str) -> String {
        format!(
            "{}{}",
            self.documents_root(),
            relative_path.trim_matches('/')
        )
    }
}
