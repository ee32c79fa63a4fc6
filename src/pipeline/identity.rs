//! Student display names from the `students` collection.

use crate::error::{Result, SmartClassError};
use crate::model::Student;
use crate::store::{DocumentStore, Query, collections, decode};
use log::{debug, warn};
use std::sync::Arc;

/// Name shown when no student matches or the lookup fails.
pub const UNKNOWN_STUDENT: &str = "Unknown";

pub struct IdentityResolver {
    store: Arc<dyn DocumentStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Exact match on an already normalized matric id.
    pub async fn lookup(&self, matricid: &str) -> Result<Option<String>> {
        let query = Query::new().where_eq("matricid", matricid).limit(1);
        let docs = self
            .store
            .query(collections::STUDENTS, &query)
            .await
            .map_err(|e| SmartClassError::LookupFailure(e.to_string()))?;

        match docs.into_iter().next() {
            Some(doc) => {
                let student: Student =
                    decode(doc).map_err(|e| SmartClassError::LookupFailure(e.to_string()))?;
                Ok(Some(student.name.unwrap_or_else(|| UNKNOWN_STUDENT.to_string())))
            }
            None => Ok(None),
        }
    }

    /// Display name for `matricid`, degrading to "Unknown".
    pub async fn display_name(&self, matricid: &str) -> String {
        match self.lookup(matricid).await {
            Ok(Some(name)) => {
                debug!("[Router] Student match for {}: {}", matricid, name);
                name
            }
            Ok(None) => {
                debug!("[Router] No student found for matricid {}", matricid);
                UNKNOWN_STUDENT.to_string()
            }
            Err(e) => {
                warn!("[Router] {}; using \"{}\"", e, UNKNOWN_STUDENT);
                UNKNOWN_STUDENT.to_string()
            }
        }
    }
}
