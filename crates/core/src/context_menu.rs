use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::grid_state::GridState;
use crate::matrix::Header;

pub const PIN_HEADER_KEY: &str = "pin-header";
pub const SORT_ASC_KEY: &str = "sort-asc";
pub const SORT_DESC_KEY: &str = "sort-desc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSortOption {
    pub column_name: String,
    pub by: SortDirection,
}

/// What a provider gets to see about the header being opened.
#[derive(Debug, Clone, Copy)]
pub struct HeaderContext<'a> {
    pub header: &'a Header,
    pub table_name: Option<&'a str>,
    pub sticky: bool,
    pub fully_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderCommand {
    TogglePin { col: usize },
    Sort(ColumnSortOption),
    Extension { key: String, col: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuItem {
    /// Rendered by the host from an opaque payload.
    Custom {
        key: String,
        payload: serde_json::Value,
    },
    Action {
        key: String,
        label: String,
        disabled: bool,
        checked: bool,
        command: HeaderCommand,
    },
    Separator,
}

impl MenuItem {
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Custom { key, .. } | Self::Action { key, .. } => Some(key),
            Self::Separator => None,
        }
    }
}

pub trait ContextMenuProvider {
    fn header_menu(&self, context: &HeaderContext<'_>) -> Vec<MenuItem>;
}

/// Header menu providers, asked in registration order.
#[derive(Default)]
pub struct ExtensionRegistry {
    providers: Vec<Box<dyn ContextMenuProvider>>,
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl ExtensionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: impl ContextMenuProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Extension items first, then pin, a separator and the sort actions.
    pub fn header_menu(
        &self,
        state: &GridState,
        col: usize,
        table_name: Option<&str>,
    ) -> Result<Vec<MenuItem>, GridError> {
        let header = state
            .matrix()
            .header(col)
            .ok_or(GridError::ColumnOutOfRange {
                col,
                cols: state.header_count(),
            })?;
        let context = HeaderContext {
            header,
            table_name,
            sticky: state.sticky_header() == Some(col),
            fully_selected: state.is_full_selection_col(col),
        };

        let mut items = self
            .providers
            .iter()
            .flat_map(|provider| provider.header_menu(&context))
            .collect::<Vec<_>>();

        items.push(MenuItem::Action {
            key: PIN_HEADER_KEY.to_string(),
            label: "Pin Header".to_string(),
            disabled: false,
            checked: context.sticky,
            command: HeaderCommand::TogglePin { col },
        });
        items.push(MenuItem::Separator);
        for (key, label, by) in [
            (SORT_ASC_KEY, "Sort A → Z", SortDirection::Asc),
            (SORT_DESC_KEY, "Sort Z → A", SortDirection::Desc),
        ] {
            items.push(MenuItem::Action {
                key: key.to_string(),
                label: label.to_string(),
                disabled: table_name.is_none(),
                checked: false,
                command: HeaderCommand::Sort(ColumnSortOption {
                    column_name: header.name.clone(),
                    by,
                }),
            });
        }
        Ok(items)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderCommandOutcome {
    PinChanged(Option<usize>),
    /// The host reruns the query with this ordering.
    SortRequested(Vec<ColumnSortOption>),
    Extension { key: String, col: usize },
}

pub fn apply_header_command(
    state: &mut GridState,
    command: &HeaderCommand,
) -> Result<HeaderCommandOutcome, GridError> {
    match command {
        HeaderCommand::TogglePin { col } => state
            .toggle_sticky_header(*col)
            .map(HeaderCommandOutcome::PinChanged),
        HeaderCommand::Sort(option) => {
            if state.matrix().header_by_name(&option.column_name).is_none() {
                return Err(GridError::UnknownColumn(option.column_name.clone()));
            }
            Ok(HeaderCommandOutcome::SortRequested(vec![option.clone()]))
        }
        HeaderCommand::Extension { key, col } => {
            state.matrix().validate_col(*col)?;
            Ok(HeaderCommandOutcome::Extension {
                key: key.clone(),
                col: *col,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        apply_header_command, ColumnSortOption, ContextMenuProvider, ExtensionRegistry,
        HeaderCommand, HeaderCommandOutcome, HeaderContext, MenuItem, SortDirection,
        PIN_HEADER_KEY, SORT_ASC_KEY, SORT_DESC_KEY,
    };
    use crate::error::GridError;
    use crate::grid_state::GridState;
    use crate::matrix::{CellValue, ColumnDefinition, ColumnType, ResultSet};
    use crate::viewport::ViewportConfig;

    struct CopyColumnName;

    impl ContextMenuProvider for CopyColumnName {
        fn header_menu(&self, context: &HeaderContext<'_>) -> Vec<MenuItem> {
            vec![MenuItem::Action {
                key: "copy-column-name".to_string(),
                label: format!("Copy \"{}\"", context.header.display.text),
                disabled: false,
                checked: false,
                command: HeaderCommand::Extension {
                    key: "copy-column-name".to_string(),
                    col: context.header.index(),
                },
            }]
        }
    }

    struct Badge;

    impl ContextMenuProvider for Badge {
        fn header_menu(&self, context: &HeaderContext<'_>) -> Vec<MenuItem> {
            vec![MenuItem::Custom {
                key: "badge".to_string(),
                payload: serde_json::json!({ "sticky": context.sticky }),
            }]
        }
    }

    fn grid() -> GridState {
        GridState::new(
            ResultSet::new(
                vec![
                    ColumnDefinition::new("id", ColumnType::Integer),
                    ColumnDefinition::new("email", ColumnType::Text),
                ],
                vec![vec![CellValue::Integer(1), CellValue::Null]],
            ),
            ViewportConfig::default(),
        )
    }

    #[test]
    fn extension_items_come_before_builtins() {
        let state = grid();
        let mut registry = ExtensionRegistry::new();
        registry.register(CopyColumnName);
        registry.register(Badge);

        let items = registry
            .header_menu(&state, 1, Some("users"))
            .expect("menu should build");
        let keys = items.iter().map(MenuItem::key).collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![
                Some("copy-column-name"),
                Some("badge"),
                Some(PIN_HEADER_KEY),
                None,
                Some(SORT_ASC_KEY),
                Some(SORT_DESC_KEY),
            ]
        );
    }

    #[test]
    fn sort_items_are_disabled_without_a_table() {
        let state = grid();
        let items = ExtensionRegistry::new()
            .header_menu(&state, 0, None)
            .expect("menu should build");
        let disabled = items
            .iter()
            .filter_map(|item| match item {
                MenuItem::Action { key, disabled, .. } => Some((key.as_str(), *disabled)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(
            disabled,
            vec![
                (PIN_HEADER_KEY, false),
                (SORT_ASC_KEY, true),
                (SORT_DESC_KEY, true)
            ]
        );
    }

    #[test]
    fn pin_item_toggles_sticky_header() {
        let mut state = grid();
        let command = HeaderCommand::TogglePin { col: 1 };
        assert_eq!(
            apply_header_command(&mut state, &command),
            Ok(HeaderCommandOutcome::PinChanged(Some(1)))
        );

        let items = ExtensionRegistry::new()
            .header_menu(&state, 1, None)
            .expect("menu should build");
        assert!(matches!(items[0], MenuItem::Action { checked: true, .. }));

        assert_eq!(
            apply_header_command(&mut state, &command),
            Ok(HeaderCommandOutcome::PinChanged(None))
        );
    }

    #[test]
    fn sort_command_is_handed_back_to_the_host() {
        let mut state = grid();
        let option = ColumnSortOption {
            column_name: "email".to_string(),
            by: SortDirection::Desc,
        };
        assert_eq!(
            apply_header_command(&mut state, &HeaderCommand::Sort(option.clone())),
            Ok(HeaderCommandOutcome::SortRequested(vec![option.clone()]))
        );
        assert_eq!(
            serde_json::to_value(&option).expect("sort option should serialize"),
            serde_json::json!({ "columnName": "email", "by": "DESC" })
        );

        let unknown = HeaderCommand::Sort(ColumnSortOption {
            column_name: "missing".to_string(),
            by: SortDirection::Asc,
        });
        assert_eq!(
            apply_header_command(&mut state, &unknown),
            Err(GridError::UnknownColumn("missing".to_string()))
        );
    }

    #[test]
    fn menu_for_unknown_column_fails() {
        let state = grid();
        assert!(ExtensionRegistry::new().header_menu(&state, 5, None).is_err());
    }
}
