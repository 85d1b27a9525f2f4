use std::error::Error;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dbstudio_adapters::JsonPayloadSource;
use dbstudio_core::loader::{CancellationToken, ResultLoader};
use dbstudio_core::matrix::{CellValue, ColumnDefinition, ColumnType, ResultSet};
use dbstudio_core::settings::{default_config_dir, FileSettingsStore, GridSettings};
use dbstudio_tui::{GridSession, TuiError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "dbstudio.log";
const LOG_FILTER_ENV: &str = "DBSTUDIO_LOG";
const DEMO_ROWS: u32 = 250;

fn init_logging(config_dir: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(config_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config_dir.join(LOG_FILE_NAME))?;
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|error| -> Box<dyn Error> { error })
}

fn load_settings() -> GridSettings {
    match FileSettingsStore::load_default() {
        Ok(store) => store.settings().clone(),
        Err(error) => {
            warn!(%error, "falling back to default settings");
            GridSettings::default()
        }
    }
}

fn demo_result() -> ResultSet {
    let columns = vec![
        ColumnDefinition::new("id", ColumnType::Integer),
        ColumnDefinition::new("name", ColumnType::Text),
        ColumnDefinition::new("email", ColumnType::Text),
        ColumnDefinition::new("balance", ColumnType::Real),
        ColumnDefinition::new("notes", ColumnType::Any),
    ];
    let rows = (1..=DEMO_ROWS)
        .map(|id| {
            vec![
                CellValue::Integer(i64::from(id)),
                CellValue::Text(format!("customer {id}")),
                CellValue::Text(format!("customer{id}@example.com")),
                CellValue::Real(f64::from(id) * 12.5),
                if id % 4 == 0 {
                    CellValue::Text("vip".to_string())
                } else {
                    CellValue::Null
                },
            ]
        })
        .collect();
    ResultSet::new(columns, rows)
}

fn build_session(
    settings: &GridSettings,
    payload: Option<&Path>,
) -> Result<GridSession, Box<dyn Error>> {
    let bindings = settings.key_bindings()?;
    let Some(path) = payload else {
        return Ok(GridSession {
            title: "dbstudio demo".to_string(),
            result: demo_result(),
            table_name: Some("customers".to_string()),
            render_ahead: settings.render_ahead,
            bindings,
        });
    };

    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let loader = ResultLoader::new(JsonPayloadSource::new(path));
    let request = path.display().to_string();
    let page = runtime.block_on(loader.load(&request, &CancellationToken::new()))?;
    info!(
        rows = page.summary.rows_loaded,
        truncated = page.summary.truncated,
        "loaded results payload"
    );

    let table_name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned());
    let mut title = request;
    if page.summary.truncated {
        title.push_str(&format!(" (first {} rows)", page.summary.rows_loaded));
    }
    Ok(GridSession {
        title,
        result: page.result,
        table_name,
        render_ahead: settings.render_ahead,
        bindings,
    })
}

fn run_app(
    session: GridSession,
    run_tui: impl FnOnce(GridSession) -> Result<(), TuiError>,
) -> Result<(), Box<dyn Error>> {
    run_tui(session)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    match default_config_dir() {
        Ok(config_dir) => {
            if let Err(error) = init_logging(&config_dir) {
                eprintln!("logging disabled: {error}");
            }
        }
        Err(error) => eprintln!("logging disabled: {error}"),
    }

    let settings = load_settings();
    let payload = std::env::args_os().nth(1).map(PathBuf::from);
    let session = build_session(&settings, payload.as_deref())?;
    run_app(session, dbstudio_tui::run)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;

    use dbstudio_core::matrix::CellValue;
    use dbstudio_core::settings::GridSettings;
    use tempfile::TempDir;

    use super::{build_session, run_app};

    #[test]
    fn run_app_returns_ok_when_tui_runner_succeeds() {
        let session = build_session(&GridSettings::default(), None).expect("demo session");
        let result = run_app(session, |session| {
            assert_eq!(session.table_name.as_deref(), Some("customers"));
            Ok(())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn run_app_propagates_tui_errors() {
        let session = build_session(&GridSettings::default(), None).expect("demo session");
        let result = run_app(session, |_| {
            Err(dbstudio_tui::TuiError::Io(io::Error::other("boom")))
        });
        assert!(result.is_err());
    }

    #[test]
    fn payload_argument_is_loaded_into_the_session() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("orders.json");
        fs::write(
            &path,
            r#"{"result":{"columns":["id","total"],"rows":[[1,9.5],[2,null]],"meta":{"rows_read":2,"rows_written":0}}}"#,
        )
        .expect("failed to write payload");

        let session =
            build_session(&GridSettings::default(), Some(&path)).expect("payload session");
        assert_eq!(session.table_name.as_deref(), Some("orders"));
        assert_eq!(session.result.rows.len(), 2);
        assert_eq!(session.result.rows[1][1], CellValue::Null);
    }

    #[test]
    fn invalid_key_bindings_fail_session_setup() {
        let mut settings = GridSettings::default();
        settings.key_bindings.copy = vec!["Hyper+C".to_string()];
        assert!(build_session(&settings, None).is_err());
    }
}
