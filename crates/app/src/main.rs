mod command;
mod dispatch;
mod render;
mod screens;
mod state;
mod telemetry;
mod theme;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use order_desk_storage::Database;
use order_desk_util::{ignored_connection_vars, load_env_file, AppConfig};

use crate::dispatch::Dispatcher;
use crate::render::render_screen;
use crate::screens::{Desk, Reply};
use crate::state::UiState;
use crate::theme::Theme;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let ignored = ignored_connection_vars();
    if !ignored.is_empty() {
        debug!(stage = "app", vars = ?ignored, "connection variables ignored by the embedded database");
    }

    let db = Database::connect(&config.database_url, config.db_max_connections).await?;
    db.run_migrations().await?;
    info!(
        stage = "app",
        database = %config.database_url,
        env = %config.environment.as_str(),
        workers = config.dispatch_max_workers,
        "order desk ready"
    );

    let exporter = db.exporter(config.export_dir.clone());
    let (dispatcher, mut ui) =
        Dispatcher::new(config.dispatch_max_workers, config.dispatch_queue_depth);
    let desk = Desk::new(db, exporter, dispatcher, Some(metrics));
    let theme = Theme::standard();
    let mut state = UiState::default();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    desk.refresh(&state);
    show(&mut stdout, &render_screen(&state, &theme)).await?;
    prompt(&mut stdout, &theme).await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match desk.handle_line(&mut state, &line) {
                    Reply::Render => show(&mut stdout, &render_screen(&state, &theme)).await?,
                    Reply::Print(text) => show(&mut stdout, &text).await?,
                    Reply::Idle => {}
                    Reply::Quit => break,
                }
                prompt(&mut stdout, &theme).await?;
            }
            update = ui.next_update() => {
                let Some(update) = update else {
                    warn!(stage = "app", "dispatcher closed");
                    break;
                };
                if ui.apply(&mut state, update) {
                    desk.follow_up(&mut state);
                    show(&mut stdout, &render_screen(&state, &theme)).await?;
                    prompt(&mut stdout, &theme).await?;
                }
            }
        }
    }

    info!(stage = "app", "order desk closed");
    Ok(())
}

async fn show(stdout: &mut tokio::io::Stdout, text: &str) -> std::io::Result<()> {
    stdout.write_all(b"\n").await?;
    stdout.write_all(text.as_bytes()).await?;
    if !text.ends_with('\n') {
        stdout.write_all(b"\n").await?;
    }
    stdout.flush().await
}

async fn prompt(stdout: &mut tokio::io::Stdout, theme: &Theme) -> std::io::Result<()> {
    stdout.write_all(theme.prompt.as_bytes()).await?;
    stdout.flush().await
}
