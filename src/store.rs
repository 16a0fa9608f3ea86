use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ActivityFilters, ActivityPage, ActivityPatch, ActivityRecord, Credential, FileUploadRecord,
    PageCursor,
};

/// The storage and query backend the core reads from and writes to.
///
/// Every call needs a credential; callers without one skip the call instead of erroring.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// One page of records matching `filters`, starting after `cursor` (`None` = from the top).
    /// `page_size == 0` asks for everything in one page.
    async fn retrieve_activities(
        &self,
        credential: &Credential,
        filters: &ActivityFilters,
        cursor: Option<&PageCursor>,
        page_size: usize,
    ) -> Result<ActivityPage>;

    /// Stores new records, returning how many were written. The store assigns ids.
    async fn submit_records(
        &self,
        credential: &Credential,
        records: &[ActivityRecord],
    ) -> Result<usize>;

    async fn delete_record(&self, credential: &Credential, id: &str) -> Result<()>;

    async fn update_record(
        &self,
        credential: &Credential,
        id: &str,
        patch: &ActivityPatch,
    ) -> Result<()>;

    async fn list_uploads(&self, credential: &Credential) -> Result<Vec<FileUploadRecord>>;

    async fn record_upload(&self, credential: &Credential, upload: &FileUploadRecord) -> Result<()>;
}
