use crate::{errors::ValidationError, model::NewFile};

pub fn require_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(())
}

/// File names become the last path segment in the asset store, so they
/// must be a single, non-empty segment.
pub fn validate_file_name(name: &str) -> Result<(), ValidationError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if invalid {
        return Err(ValidationError::InvalidFileName(name.to_owned()));
    }
    Ok(())
}

pub fn validate_create(
    title: &str,
    description: &str,
    files: &[NewFile],
) -> Result<(), ValidationError> {
    require_title(title)?;
    if description.trim().is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    if files.is_empty() {
        return Err(ValidationError::NoFiles);
    }
    for file in files {
        validate_file_name(&file.name)?;
    }
    Ok(())
}

/// Edits only require a title; the description may be cleared.
pub fn validate_edit<'a, I>(title: &str, pending: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a NewFile>,
{
    require_title(title)?;
    for file in pending {
        validate_file_name(&file.name)?;
    }
    Ok(())
}

pub fn validate_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::EmptyEmail);
    }
    if password.is_empty() {
        return Err(ValidationError::EmptyPassword);
    }
    Ok(())
}
