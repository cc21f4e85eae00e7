//! Scoped preview-handle lifecycle.
//!
//! A staged photo owns a preview resource (an object URL or equivalent) that
//! must be released exactly once, on every exit path. The handle wraps the
//! release action so revocation is idempotent and guaranteed on drop; only the
//! staging cache that created a handle may revoke it.

/// Handle to a preview resource. Revoked at most once; dropping an unrevoked
/// handle revokes it.
pub struct PreviewHandle {
    url: String,
    revoked: bool,
    on_revoke: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl PreviewHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            revoked: false,
            on_revoke: None,
        }
    }

    /// Attach a release action invoked exactly once on revocation.
    pub fn with_callback(
        url: impl Into<String>,
        on_revoke: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            url: url.into(),
            revoked: false,
            on_revoke: Some(Box::new(on_revoke)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// Release the underlying resource. Calling again is a no-op.
    pub fn revoke(&mut self) {
        if self.revoked {
            return;
        }
        self.revoked = true;
        if let Some(release) = self.on_revoke.take() {
            release();
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.revoke();
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("url", &self.url)
            .field("revoked", &self.revoked)
            .finish()
    }
}
