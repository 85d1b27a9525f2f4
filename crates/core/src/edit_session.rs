use crate::error::GridError;
use crate::matrix::CellAddress;

/// `Idle -> Editing(cell, staged) -> Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditSession {
    #[default]
    Idle,
    Editing {
        cell: CellAddress,
        initial: String,
        staged: String,
    },
}

impl EditSession {
    #[must_use]
    pub fn is_editing(&self) -> bool {
        matches!(self, Self::Editing { .. })
    }

    #[must_use]
    pub fn cell(&self) -> Option<CellAddress> {
        match self {
            Self::Idle => None,
            Self::Editing { cell, .. } => Some(*cell),
        }
    }

    #[must_use]
    pub fn staged_value(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Editing { staged, .. } => Some(staged.as_str()),
        }
    }

    /// Whether the staged text differs from the text the session started with.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        match self {
            Self::Idle => false,
            Self::Editing {
                initial, staged, ..
            } => initial != staged,
        }
    }

    /// Starts editing `cell`. Returns `false` when that cell is already being
    /// edited; a different cell in edit mode is an [`GridError::EditConflict`].
    pub fn begin(&mut self, cell: CellAddress, initial: String) -> Result<bool, GridError> {
        match self {
            Self::Editing { cell: editing, .. } if *editing == cell => Ok(false),
            Self::Editing { cell: editing, .. } => Err(GridError::EditConflict {
                editing: *editing,
                requested: cell,
            }),
            Self::Idle => {
                *self = Self::Editing {
                    cell,
                    staged: initial.clone(),
                    initial,
                };
                Ok(true)
            }
        }
    }

    pub fn staged_mut(&mut self) -> Result<&mut String, GridError> {
        match self {
            Self::Idle => Err(GridError::NotEditing),
            Self::Editing { staged, .. } => Ok(staged),
        }
    }

    /// Ends the session, handing back the edited cell and its staged text.
    pub fn finish(&mut self) -> Option<(CellAddress, String)> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::Editing { cell, staged, .. } => Some((cell, staged)),
        }
    }

    pub fn cancel(&mut self) -> Option<CellAddress> {
        self.finish().map(|(cell, _)| cell)
    }
}

#[cfg(test)]
mod tests {
    use super::EditSession;
    use crate::error::GridError;
    use crate::matrix::CellAddress;

    #[test]
    fn begin_then_finish_returns_to_idle() {
        let mut session = EditSession::default();
        let cell = CellAddress::new(1, 2);
        assert_eq!(session.begin(cell, "old".to_string()), Ok(true));
        session
            .staged_mut()
            .expect("session should be editing")
            .push('!');

        assert!(session.is_modified());
        assert_eq!(session.finish(), Some((cell, "old!".to_string())));
        assert!(!session.is_editing());
    }

    #[test]
    fn editing_another_cell_is_a_conflict() {
        let mut session = EditSession::default();
        let first = CellAddress::new(0, 0);
        let second = CellAddress::new(0, 1);
        session
            .begin(first, String::new())
            .expect("first edit should start");

        assert_eq!(session.begin(first, String::new()), Ok(false));
        assert_eq!(
            session.begin(second, String::new()),
            Err(GridError::EditConflict {
                editing: first,
                requested: second
            })
        );
        assert_eq!(session.cell(), Some(first));
    }

    #[test]
    fn restoring_the_initial_text_is_not_a_modification() {
        let mut session = EditSession::default();
        session
            .begin(CellAddress::new(0, 0), "abc".to_string())
            .expect("edit should start");
        assert!(!session.is_modified());

        let staged = session.staged_mut().expect("session should be editing");
        staged.push('d');
        staged.pop();
        assert!(!session.is_modified());
    }

    #[test]
    fn staging_requires_an_active_edit() {
        let mut session = EditSession::default();
        assert_eq!(session.staged_mut().err(), Some(GridError::NotEditing));
        assert_eq!(session.cancel(), None);
    }
}
