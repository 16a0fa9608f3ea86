use sha2::{Digest, Sha256};

use crate::models::{ActivityRecord, FileUploadRecord};

/// Hex SHA-256 of the file text. Only used to warn about re-uploads, never to reject them.
pub fn compute_checksum(file_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_text.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn is_duplicate(checksum: &str, known_uploads: &[FileUploadRecord]) -> bool {
    known_uploads.iter().any(|u| u.checksum == checksum)
}

/// The upload record to store once a file's records have been submitted.
/// Dates span the earliest and latest record; both are empty when there are no records.
pub fn upload_record_for(checksum: &str, records: &[ActivityRecord]) -> FileUploadRecord {
    let start_date = records.iter().map(|r| r.date.as_str()).min().unwrap_or("");
    let end_date = records.iter().map(|r| r.date.as_str()).max().unwrap_or("");
    FileUploadRecord {
        checksum: checksum.to_string(),
        start_date: start_date.to_string(),
        end_date: end_date.to_string(),
    }
}
