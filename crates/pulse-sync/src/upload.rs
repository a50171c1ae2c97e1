// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment bundle submission.
//!
//! A bundle (text plus files) is accepted or rejected as a whole. Local
//! checks run before any network call; every failure surfaces as
//! [`PulseError::Upload`].

use std::sync::Arc;

use pulse_config::model::UploadConfig;
use pulse_core::{Message, PulseError, RemoteAuthority, UploadBundle};
use tracing::{debug, info};

pub struct UploadCoordinator {
    authority: Arc<dyn RemoteAuthority>,
    limits: UploadConfig,
}

impl UploadCoordinator {
    pub fn new(authority: Arc<dyn RemoteAuthority>, limits: UploadConfig) -> Self {
        Self { authority, limits }
    }

    /// Checks a bundle against the configured limits without sending it.
    pub fn validate(&self, bundle: &UploadBundle) -> Result<(), PulseError> {
        validate_bundle(&self.limits, bundle)
    }

    /// Validates and submits `bundle` as one multipart request.
    pub async fn submit(&self, bundle: &UploadBundle) -> Result<Message, PulseError> {
        self.validate(bundle)?;
        debug!(
            receiver_id = %bundle.receiver_id,
            files = bundle.files.len(),
            bytes = bundle.total_bytes(),
            "submitting attachment bundle"
        );
        let stored = self
            .authority
            .send_message_with_attachments(bundle)
            .await
            .map_err(into_upload_error)?;
        info!(
            message_id = %stored.id,
            attachments = stored.attachments.len(),
            "attachment bundle accepted"
        );
        Ok(stored)
    }
}

fn validate_bundle(limits: &UploadConfig, bundle: &UploadBundle) -> Result<(), PulseError> {
    if bundle.body.trim().is_empty() && bundle.files.is_empty() {
        return Err(PulseError::upload("nothing to send: empty body and no files"));
    }
    if bundle.files.len() > limits.max_attachments {
        return Err(PulseError::upload(format!(
            "{} attachments exceed the limit of {}",
            bundle.files.len(),
            limits.max_attachments
        )));
    }
    for file in &bundle.files {
        if file.file_name.trim().is_empty() {
            return Err(PulseError::upload("attachment has an empty file name"));
        }
        if file.data.is_empty() {
            return Err(PulseError::upload(format!(
                "attachment `{}` is empty",
                file.file_name
            )));
        }
        let size = file.data.len() as u64;
        if size > limits.max_attachment_bytes {
            return Err(PulseError::upload(format!(
                "attachment `{}` is {size} bytes, over the limit of {}",
                file.file_name, limits.max_attachment_bytes
            )));
        }
    }
    Ok(())
}

fn into_upload_error(err: PulseError) -> PulseError {
    match err {
        err @ PulseError::Upload { .. } => err,
        other => PulseError::Upload {
            message: format!("attachment bundle rejected: {other}"),
            source: Some(Box::new(other)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::{UploadFile, UserId};

    fn bundle(body: &str, files: Vec<UploadFile>) -> UploadBundle {
        UploadBundle {
            sender_id: UserId::from("alice"),
            receiver_id: UserId::from("bob"),
            body: body.to_string(),
            files,
        }
    }

    fn file(name: &str, size: usize) -> UploadFile {
        UploadFile {
            file_name: name.to_string(),
            mime_type: None,
            data: vec![7; size],
        }
    }

    fn limits() -> UploadConfig {
        UploadConfig {
            max_attachments: 2,
            max_attachment_bytes: 8,
        }
    }

    fn check(bundle: &UploadBundle) -> Result<(), PulseError> {
        validate_bundle(&limits(), bundle)
    }

    #[test]
    fn text_only_bundle_is_valid() {
        assert!(check(&bundle("hello", vec![])).is_ok());
    }

    #[test]
    fn files_without_text_are_valid() {
        assert!(check(&bundle("", vec![file("a.txt", 3)])).is_ok());
    }

    #[test]
    fn empty_bundle_is_rejected() {
        let err = check(&bundle("  ", vec![])).unwrap_err();
        assert!(matches!(err, PulseError::Upload { .. }));
    }

    #[test]
    fn too_many_files_are_rejected() {
        let files = vec![file("a", 1), file("b", 1), file("c", 1)];
        let err = check(&bundle("x", files)).unwrap_err();
        assert!(err.to_string().contains("exceed"), "got: {err}");
    }

    #[test]
    fn oversize_file_is_rejected() {
        let err = check(&bundle("x", vec![file("big.bin", 9)])).unwrap_err();
        assert!(err.to_string().contains("big.bin"), "got: {err}");
    }

    #[test]
    fn empty_file_and_blank_name_are_rejected() {
        assert!(check(&bundle("x", vec![file("empty", 0)])).is_err());
        assert!(check(&bundle("x", vec![file(" ", 1)])).is_err());
    }

    #[test]
    fn foreign_errors_are_wrapped_as_upload() {
        let wrapped = into_upload_error(PulseError::request("413 payload too large"));
        assert!(matches!(wrapped, PulseError::Upload { .. }));
        assert!(wrapped.to_string().contains("413"));

        let kept = into_upload_error(PulseError::upload("bad"));
        assert_eq!(kept.to_string(), "upload error: bad");
    }
}
