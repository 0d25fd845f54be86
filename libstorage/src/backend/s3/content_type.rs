use mime_guess::Mime;

/// Best-effort content type for an object key, from its file extension.
pub(crate) fn guess(key: &str) -> Option<Mime> {
    if key.ends_with('/') {
        return None;
    }
    mime_guess::from_path(key).first()
}
