/// Where text input currently goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusTarget {
    /// The shared main composer.
    Composer,
    /// The inline editor of one draft, by owner key.
    Editor(String),
    /// Nothing is focused.
    None,
}

/// Single shared input affordance: at most one editor is focused at a time,
/// and the main composer's state is restored when the last editor closes.
#[derive(Debug)]
pub(crate) struct FocusState {
    pub(crate) target: FocusTarget,
    pub(crate) composer_visible: bool,
    /// Composer state captured when the first editor opened.
    saved: Option<(FocusTarget, bool)>,
}

impl Default for FocusState {
    fn default() -> Self {
        Self {
            target: FocusTarget::Composer,
            composer_visible: true,
            saved: None,
        }
    }
}

impl FocusState {
    /// An editor for `owner_key` opened; it takes focus and hides the composer.
    pub(crate) fn begin_edit(&mut self, owner_key: &str) {
        if self.saved.is_none() {
            self.saved = Some((self.target.clone(), self.composer_visible));
        }
        self.target = FocusTarget::Editor(owner_key.to_string());
        self.composer_visible = false;
    }

    /// The editor for `owner_key` closed. `next` is the most recently opened
    /// editor still in progress, if any.
    pub(crate) fn end_edit(&mut self, owner_key: &str, next: Option<&str>) {
        match next {
            Some(next) => {
                if self.target == FocusTarget::Editor(owner_key.to_string()) {
                    self.target = FocusTarget::Editor(next.to_string());
                }
            }
            None => {
                let (target, visible) = self
                    .saved
                    .take()
                    .unwrap_or((FocusTarget::Composer, true));
                self.target = target;
                self.composer_visible = visible;
            }
        }
    }

    pub(crate) fn focus_composer(&mut self) {
        self.target = FocusTarget::Composer;
    }
}
