// Clipboard bridge. Both directions are best-effort: a missing display
// server or clipboard daemon just means no auto-detected URL and no copied
// path.

/// Clipboard access used for URL auto-detect and copying the saved path.
pub trait Clipboard {
    /// Trimmed clipboard text, or `None` when empty or unavailable.
    fn read_text(&mut self) -> Option<String>;
    /// Returns whether the text was placed on the clipboard.
    fn write_text(&mut self, text: &str) -> bool;
}

/// System clipboard using arboard. The handle is opened on first use and
/// kept for the life of the session, since on X11 the copied text only
/// lives as long as its owner.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self { inner: None }
    }

    fn ensure(&mut self) -> Option<&mut arboard::Clipboard> {
        if self.inner.is_none() {
            match arboard::Clipboard::new() {
                Ok(cb) => self.inner = Some(cb),
                Err(e) => {
                    tracing::debug!(error = %e, "clipboard unavailable");
                    return None;
                }
            }
        }
        self.inner.as_mut()
    }
}

impl Clipboard for SystemClipboard {
    fn read_text(&mut self) -> Option<String> {
        let text = self.ensure()?.get_text().ok()?;
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    fn write_text(&mut self, text: &str) -> bool {
        let Some(cb) = self.ensure() else {
            return false;
        };
        match cb.set_text(text.to_string()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "clipboard write failed");
                false
            }
        }
    }
}
