use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

mod api;
mod app;
mod config;
mod db;
mod error;
mod models;
mod network;
mod sync;
mod tui;

use app::{App, Services, Startup};
use config::Config;
use error::{AppError, Result};
use tui::{draw, handle_key_event};

const USAGE: &str = "Usage: vrid-reader [--refresh [PAGE] | --show ID | --html ID | --clear-cache]";

enum Mode {
    Interactive,
    Refresh(u32),
    Show(i64),
    Html(i64),
    ClearCache,
}

fn parse_args(args: &[String]) -> Result<Mode> {
    match args.get(1).map(String::as_str) {
        None => Ok(Mode::Interactive),
        Some("--refresh") => {
            let page = match args.get(2) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| AppError::Config(format!("Invalid page {:?}. {}", raw, USAGE)))?,
                None => 1,
            };
            Ok(Mode::Refresh(page))
        }
        Some("--show") => Ok(Mode::Show(parse_id(args.get(2))?)),
        Some("--html") => Ok(Mode::Html(parse_id(args.get(2))?)),
        Some("--clear-cache") => Ok(Mode::ClearCache),
        Some(other) => Err(AppError::Config(format!("Unknown argument {:?}. {}", other, USAGE))),
    }
}

fn parse_id(raw: Option<&String>) -> Result<i64> {
    let raw = raw.ok_or_else(|| AppError::Config(USAGE.to_string()))?;
    raw.parse()
        .map_err(|_| AppError::Config(format!("Invalid post id {:?}. {}", raw, USAGE)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mode = parse_args(&args)?;

    // Load configuration
    let config = Config::load()?;
    // Only a headless refresh needs to know reachability before it starts
    let startup = match mode {
        Mode::Refresh(_) => Startup::Probe,
        _ => Startup::Deferred,
    };
    let services = Services::build(&config, startup).await?;

    match mode {
        Mode::Refresh(page) => {
            // Headless refresh: one policy decision, then exit
            let posts = services.repository.refresh(page).await?;
            println!("Page {}: {} posts", page, posts.len());
            return Ok(());
        }
        Mode::Show(id) => {
            match services.repository.get_by_id(id).await? {
                Some(post) => {
                    println!("{}", post.title_text());
                    println!("{}", post.published_display());
                    if post.has_featured_media() {
                        println!("Featured media #{}", post.featured_media);
                    }
                    println!();
                    println!("{}", post.content_text(80));
                }
                None => println!("Post not found"),
            }
            return Ok(());
        }
        Mode::Html(id) => {
            // Full document for an external HTML renderer
            match services.repository.get_by_id(id).await? {
                Some(post) => println!("{}", post.content_document()),
                None => println!("Post not found"),
            }
            return Ok(());
        }
        Mode::ClearCache => {
            services.repository.clear_cache().await?;
            println!("Cleared cached posts");
            return Ok(());
        }
        Mode::Interactive => {}
    }

    let mut app = App::new(&services);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &mut app).await;

    // Cancel anything still in flight before the runtime goes away
    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        // Pick up new posts, loading state and connectivity changes
        app.poll_updates();

        terminal.draw(|frame| draw(frame, app))?;

        // Poll for events with timeout to allow async operations
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = handle_key_event(key, app.view, app.show_help) {
                        let should_quit = app.handle_action(action).await?;
                        if should_quit {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
