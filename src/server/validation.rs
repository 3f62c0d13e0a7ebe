use crate::server::response::ApiError;

const MAX_NAME_LEN: usize = 100;
const MAX_PATH_LEN: usize = 1024;

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
}

fn validate_name(name: &str, entity: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request(format!(
            "{entity} name cannot be empty"
        )));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "{entity} name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(is_valid_name_char) {
        return Err(ApiError::bad_request(format!(
            "{entity} name can only contain alphanumeric characters, hyphens, underscores, and periods"
        )));
    }
    Ok(())
}

pub fn validate_owner(name: &str) -> Result<(), ApiError> {
    validate_name(name, "Owner")
}

pub fn validate_repo_name(name: &str) -> Result<(), ApiError> {
    validate_name(name, "Repository")
}

/// Repository file paths: relative, slash-separated, no control characters.
/// Traversal is rejected again at the mirror boundary; this check exists to
/// produce a readable 400 before any remote call is made.
pub fn validate_file_path(path: &str) -> Result<(), ApiError> {
    if path.is_empty() {
        return Err(ApiError::bad_request("Path cannot be empty"));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(ApiError::bad_request(format!(
            "Path cannot exceed {MAX_PATH_LEN} characters"
        )));
    }
    if path.starts_with('/') {
        return Err(ApiError::bad_request("Path must be relative"));
    }
    if path.chars().any(|c| c.is_control()) {
        return Err(ApiError::bad_request("Path contains invalid characters"));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(ApiError::bad_request("Path cannot contain '..' segments"));
    }
    Ok(())
}

/// Branch names may contain slashes (e.g. "release/1.x") but must stay
/// printable and relative.
pub fn validate_branch_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("Branch name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Branch name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    if name.starts_with('/') || name.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(ApiError::bad_request("Branch name contains invalid characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_pass() {
        assert!(validate_owner("octocat").is_ok());
        assert!(validate_repo_name("my-docs.site_2").is_ok());
    }

    #[test]
    fn invalid_names_fail() {
        assert!(validate_owner("").is_err());
        assert!(validate_owner("has space").is_err());
        assert!(validate_repo_name("slash/y").is_err());
    }

    #[test]
    fn branch_names_allow_slashes_but_not_whitespace() {
        assert!(validate_branch_name("main").is_ok());
        assert!(validate_branch_name("release/1.x").is_ok());
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("has space").is_err());
    }

    #[test]
    fn file_paths_reject_traversal_and_absolutes() {
        assert!(validate_file_path("docs/intro.md").is_ok());
        assert!(validate_file_path("/etc/passwd").is_err());
        assert!(validate_file_path("docs/../secret").is_err());
        assert!(validate_file_path("").is_err());
        assert!(validate_file_path("docs/\0evil").is_err());
    }
}
