use log::{info, warn};

use crate::categorizer::{apply_mappings, CategoryMapping};
use crate::checksum::{compute_checksum, is_duplicate, upload_record_for};
use crate::error::Result;
use crate::importer::{self, RawLayout};
use crate::models::{ActivityRecord, Credential, FileUploadRecord};
use crate::store::ActivityStore;

/// A parsed file ready to be reviewed and submitted.
#[derive(Debug, Clone)]
pub struct UploadPreview {
    pub layout: RawLayout,
    /// `false` when the layout came from an explicit choice or the fallback.
    pub detected: bool,
    pub checksum: String,
    /// The same file content was uploaded before.
    pub duplicate: bool,
    pub records: Vec<ActivityRecord>,
    pub categorized: usize,
    pub start_date: String,
    pub end_date: String,
}

impl UploadPreview {
    pub fn upload_record(&self) -> FileUploadRecord {
        upload_record_for(&self.checksum, &self.records)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted { count: usize },
    /// Already uploaded and `force` was not given.
    SkippedDuplicate,
    NothingToSubmit,
    NotAuthenticated,
}

/// Works out the layout, parses the file and applies category mappings.
///
/// An explicit `layout` wins; otherwise the file is detected and `fallback` is used when
/// detection is inconclusive. A duplicate is flagged but still parsed.
pub fn prepare(
    file_name: &str,
    text: &str,
    layout: Option<RawLayout>,
    fallback: RawLayout,
    known_uploads: &[FileUploadRecord],
    mappings: &[CategoryMapping],
) -> UploadPreview {
    let detected_layout = importer::detect(file_name, text);
    let (layout, detected) = match (layout, detected_layout) {
        (Some(chosen), _) => (chosen, false),
        (None, Some(found)) => (found, true),
        (None, None) => {
            warn!("could not detect layout of {file_name}, using {}", fallback.key());
            (fallback, false)
        }
    };

    let checksum = compute_checksum(text);
    let duplicate = is_duplicate(&checksum, known_uploads);
    if duplicate {
        warn!("{file_name} has been uploaded before");
    }

    let parsed = importer::parse(layout, text);
    let categorized = apply_mappings(&parsed, mappings);
    let span = upload_record_for(&checksum, &categorized.records);

    UploadPreview {
        layout,
        detected,
        checksum,
        duplicate,
        records: categorized.records,
        categorized: categorized.categorized,
        start_date: span.start_date,
        end_date: span.end_date,
    }
}

/// Sends the preview's records to the store and remembers the upload's checksum.
pub async fn submit<S: ActivityStore + ?Sized>(
    store: &S,
    credential: Option<&Credential>,
    preview: &UploadPreview,
    force: bool,
) -> Result<SubmitOutcome> {
    let Some(credential) = credential else {
        return Ok(SubmitOutcome::NotAuthenticated);
    };
    if preview.duplicate && !force {
        return Ok(SubmitOutcome::SkippedDuplicate);
    }
    if preview.records.is_empty() {
        return Ok(SubmitOutcome::NothingToSubmit);
    }

    let count = store.submit_records(credential, &preview.records).await?;
    store.record_upload(credential, &preview.upload_record()).await?;
    info!("submitted {count} activities ({})", preview.layout.key());
    Ok(SubmitOutcome::Submitted { count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::models::ActivityFilters;

    const CAP1: &str = "Transaction Date,Posted Date,Card No.,Description,Category,Debit,Credit
2025-01-20,2025-01-21,1234,UBER EATS,Dining,23.50,
2025-01-05,2025-01-06,1234,PAYMENT THANK YOU,Payment,,500.00
";

    const TD: &str = "Date,Description,Withdrawals,Deposits,Balance
01/03/2025,HYDRO ONE,80.00,,1000.00
";

    fn mapping(pattern: &str, category: &str) -> CategoryMapping {
        CategoryMapping {
            pattern: pattern.to_string(),
            category: category.to_string(),
            match_type: "contains".to_string(),
        }
    }

    #[test]
    fn test_prepare_detects_and_spans_dates() {
        let preview = prepare("statement.csv", CAP1, None, RawLayout::Td, &[], &[]);
        assert_eq!(preview.layout, RawLayout::CapitalOne);
        assert!(preview.detected);
        assert!(!preview.duplicate);
        assert_eq!(preview.records.len(), 2);
        assert_eq!(preview.start_date, "2025-01-05");
        assert_eq!(preview.end_date, "2025-01-20");
    }

    #[test]
    fn test_prepare_explicit_layout_wins() {
        let explicit = Some(RawLayout::Td);
        let preview = prepare("statement.csv", TD, explicit, RawLayout::CapitalOne, &[], &[]);
        assert_eq!(preview.layout, RawLayout::Td);
        assert!(!preview.detected);
        assert_eq!(preview.records[0].amount, 80.0);
    }

    #[test]
    fn test_prepare_falls_back_when_inconclusive() {
        let text = "a,b,c,d\n01/03/2025,X,1.00,\n";
        let preview = prepare("mystery.csv", text, None, RawLayout::Td, &[], &[]);
        assert_eq!(preview.layout, RawLayout::Td);
        assert!(!preview.detected);
        assert_eq!(preview.records.len(), 1);
    }

    #[test]
    fn test_prepare_flags_duplicate_and_applies_mappings() {
        let known = vec![FileUploadRecord {
            checksum: compute_checksum(CAP1),
            start_date: String::new(),
            end_date: String::new(),
        }];
        let mappings = [mapping("uber", "Takeout")];
        let preview = prepare("x.csv", CAP1, None, RawLayout::Td, &known, &mappings);
        assert!(preview.duplicate);
        assert_eq!(preview.categorized, 1);
        assert!(preview.records.iter().any(|r| r.category == "Takeout"));
    }

    #[tokio::test]
    async fn test_submit_stores_records_and_upload() {
        let store = SqliteStore::in_memory().unwrap();
        let cred = Credential::new("alice").unwrap();
        let preview = prepare("x.csv", CAP1, None, RawLayout::Td, &[], &[]);

        let outcome = submit(&store, Some(&cred), &preview, false).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Submitted { count: 2 });

        let uploads = store.list_uploads(&cred).await.unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].checksum, preview.checksum);
        assert_eq!(uploads[0].start_date, "2025-01-05");

        let page = store
            .retrieve_activities(&cred, &ActivityFilters::default(), None, 0)
            .await
            .unwrap();
        assert_eq!(page.records.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_needs_force() {
        let store = SqliteStore::in_memory().unwrap();
        let cred = Credential::new("alice").unwrap();
        let first = prepare("x.csv", CAP1, None, RawLayout::Td, &[], &[]);
        submit(&store, Some(&cred), &first, false).await.unwrap();

        let known = store.list_uploads(&cred).await.unwrap();
        let again = prepare("x.csv", CAP1, None, RawLayout::Td, &known, &[]);
        assert_eq!(
            submit(&store, Some(&cred), &again, false).await.unwrap(),
            SubmitOutcome::SkippedDuplicate
        );
        assert_eq!(
            submit(&store, Some(&cred), &again, true).await.unwrap(),
            SubmitOutcome::Submitted { count: 2 }
        );
    }

    #[tokio::test]
    async fn test_submit_without_credential_is_a_no_op() {
        let store = SqliteStore::in_memory().unwrap();
        let preview = prepare("x.csv", CAP1, None, RawLayout::Td, &[], &[]);
        assert_eq!(
            submit(&store, None, &preview, false).await.unwrap(),
            SubmitOutcome::NotAuthenticated
        );
    }

    #[tokio::test]
    async fn test_header_only_file_has_nothing_to_submit() {
        let store = SqliteStore::in_memory().unwrap();
        let cred = Credential::new("alice").unwrap();
        let header = "Transaction Date,Posted Date,Card No.,Description,Category,Debit,Credit\n";
        let preview = prepare("x.csv", header, None, RawLayout::Td, &[], &[]);
        assert!(preview.records.is_empty());
        assert_eq!(preview.start_date, "");
        assert_eq!(
            submit(&store, Some(&cred), &preview, false).await.unwrap(),
            SubmitOutcome::NothingToSubmit
        );
    }
}
