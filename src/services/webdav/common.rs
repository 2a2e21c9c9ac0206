/// Common utilities shared by the WebDAV mirror services

/// Build the User-Agent string sent with every request
pub fn build_user_agent() -> String {
    format!("davmirror/{} (WebDAV-Mirror)", env!("CARGO_PKG_VERSION"))
}

/// Last non-empty segment of a remote path, percent-decoded for use as a local name.
///
/// `/data/sub/` yields `sub`, `/data/My%20File.txt` yields `My File.txt`.
pub fn local_name_for(remote_path: &str) -> Option<String> {
    let segment = remote_path.trim_end_matches('/').rsplit('/').next()?;
    if segment.is_empty() || segment == "." || segment == ".." {
        return None;
    }

    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    // A decoded separator would escape the destination directory
    if decoded.contains('/') || decoded == "." || decoded == ".." {
        return None;
    }
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_format() {
        let ua = build_user_agent();
        assert!(ua.starts_with("davmirror/"));
        assert!(ua.contains("WebDAV-Mirror"));
    }

    #[test]
    fn test_local_name_for_files_and_directories() {
        assert_eq!(local_name_for("/data/a.txt").as_deref(), Some("a.txt"));
        assert_eq!(local_name_for("/data/sub/").as_deref(), Some("sub"));
        assert_eq!(local_name_for("/data/My%20File.txt").as_deref(), Some("My File.txt"));
    }

    #[test]
    fn test_local_name_rejects_traversal() {
        assert_eq!(local_name_for("/"), None);
        assert_eq!(local_name_for("/data/../"), None);
        assert_eq!(local_name_for("/data/evil%2F..%2Fescape"), None);
        assert_eq!(local_name_for("/data/%2E%2E"), None);
    }
}
