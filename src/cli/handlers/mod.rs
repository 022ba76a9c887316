mod init;
pub use init::cmd_init;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use regex::Regex;

/// Global override for the vault directory (set by -C flag)
static VAULT_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::{ExternalIndex, FsStore, LocalIndex, NoteStore};
use crate::model::config::{Settings, SettingsPatch};
use crate::ops::board_ops::{self, ColumnUpdate};
use crate::ops::rewrite::{self, MoveOutcome};
use crate::ops::index_adapter::IndexAdapter;
use crate::ops::{scan, search};
use crate::parse::tags::{format_tag, normalize_tag};
use crate::session::BoardSession;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;

    // Store -C override for load_vault_cwd()
    if let Some(ref dir) = cli.vault {
        let abs = std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?;
        VAULT_DIR_OVERRIDE
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(abs);
    }

    match cli.command {
        Commands::Init(args) => cmd_init(args),

        // Board and column management (settings only, synchronous)
        Commands::Boards => cmd_boards(json),
        Commands::Board(args) => cmd_board(args, json),
        Commands::Column(args) => cmd_column(args, json),
        Commands::Settings(args) => cmd_settings(args, json),

        // Commands that touch notes
        Commands::Show(args) => block_on(cmd_show(args, json)),
        Commands::Notes(args) => block_on(cmd_notes(args, json)),
        Commands::Mv(args) => block_on(cmd_mv(args, json)),
        Commands::Search(args) => block_on(cmd_search(args, json)),
        Commands::Index(args) => block_on(cmd_index(args, json)),
        Commands::Watch(args) => block_on(cmd_watch(args, json)),
    }
}

fn block_on<F>(fut: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = Result<(), Box<dyn std::error::Error>>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(fut)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Directory commands start from: the -C override or the cwd
fn start_dir() -> Result<PathBuf, std::io::Error> {
    match VAULT_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir(),
    }
}

fn load_vault_cwd() -> Result<(PathBuf, Settings), Box<dyn std::error::Error>> {
    let root = config_io::discover_vault(&start_dir()?)?;
    let (settings, _) = config_io::read_settings(&root)?;
    tracing::debug!(vault = %root.display(), boards = settings.boards.len(), "loaded vault");
    Ok((root, settings))
}

/// Load the local index only when settings ask for indexed queries.
async fn load_index(root: &Path, settings: &Settings) -> LocalIndex {
    if settings.use_dataview_queries {
        LocalIndex::load(root).await
    } else {
        LocalIndex::unavailable()
    }
}

async fn open_session(root: &Path, settings: Settings) -> BoardSession<FsStore, LocalIndex> {
    let index = load_index(root, &settings).await;
    BoardSession::new(Arc::new(FsStore::new(root)), Arc::new(index), settings)
}

/// The board a read command should show: the one named, else the default
/// board, else the only board.
fn pick_board(settings: &Settings, key: Option<&str>) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(key) = key {
        return settings
            .find_board(key)
            .map(|b| b.id.clone())
            .ok_or_else(|| format!("board not found: {}", key).into());
    }
    if let Some(id) = &settings.default_board
        && settings.board(id).is_some()
    {
        return Ok(id.clone());
    }
    match settings.boards.as_slice() {
        [only] => Ok(only.id.clone()),
        [] => Err("no boards yet (create one with `kanline board create <NAME>`)".into()),
        _ => Err("several boards and no default (name one, or run `kanline board default <BOARD>`)".into()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse --column pairs from the flat Vec<String> produced by clap.
fn parse_column_pairs(args: &[String]) -> Vec<(String, String)> {
    args.chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

async fn print_board<S: NoteStore, I: ExternalIndex>(
    session: &BoardSession<S, I>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let board = session.active_board().await.ok_or("no active board")?;
    let state = session.state().await;
    if json {
        return print_json(&board_view_to_json(
            &board,
            &state.columns,
            state.error.as_deref(),
        ));
    }
    let settings = session.settings().await;
    for line in format_board(&board, &state.columns, &settings) {
        println!("{}", line);
    }
    if let Some(e) = &state.error {
        eprintln!("warning: {}", e);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Board commands
// ---------------------------------------------------------------------------

fn cmd_boards(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (_, settings) = load_vault_cwd()?;
    if json {
        let boards: Vec<BoardInfoJson> = settings
            .boards
            .iter()
            .map(|b| board_to_json(b, &settings))
            .collect();
        return print_json(&boards);
    }
    if settings.boards.is_empty() {
        println!("no boards (create one with `kanline board create <NAME>`)");
        return Ok(());
    }
    for line in format_board_listing(&settings) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_board(args: BoardCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (root, mut settings) = load_vault_cwd()?;
    let now = Utc::now();

    let touched = match args.action {
        BoardAction::Create(a) => {
            let columns = parse_column_pairs(&a.column);
            let id = board_ops::create_board(
                &mut settings,
                &a.name,
                a.filter.as_deref(),
                &columns,
                now,
            )?;
            if !json {
                println!("created board {}", id);
            }
            Some(id)
        }
        BoardAction::Rename(a) => {
            board_ops::rename_board(&mut settings, &a.board, &a.name, now)?;
            if !json {
                println!("renamed board to {}", a.name.trim());
            }
            settings.find_board(a.name.trim()).map(|b| b.id.clone())
        }
        BoardAction::Filter(a) => {
            board_ops::set_board_filter(&mut settings, &a.board, a.query.as_deref(), now)?;
            let board = settings
                .find_board(&a.board)
                .ok_or_else(|| format!("board not found: {}", a.board))?;
            if !json {
                match board.filter_query() {
                    Some(q) => println!("{}: filter set to {}", board.id, q),
                    None => println!("{}: filter cleared", board.id),
                }
            }
            Some(board.id.clone())
        }
        BoardAction::Delete(a) => {
            let removed = board_ops::delete_board(&mut settings, &a.board)?;
            if !json {
                println!("deleted board {}", removed.id);
            }
            None
        }
        BoardAction::Default(a) => {
            board_ops::set_default_board(&mut settings, a.board.as_deref())?;
            if !json {
                match &settings.default_board {
                    Some(id) => println!("default board: {}", id),
                    None => println!("default board cleared"),
                }
            }
            settings.default_board.clone()
        }
    };

    config_io::save_settings(&root, &settings)?;

    if json {
        let board = touched.as_deref().and_then(|id| settings.board(id));
        return print_json(&board.map(|b| board_to_json(b, &settings)));
    }
    Ok(())
}

fn cmd_column(args: ColumnCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (root, mut settings) = load_vault_cwd()?;
    let now = Utc::now();

    let board_key = match &args.action {
        ColumnAction::Add(a) => a.board.clone(),
        ColumnAction::Edit(a) => a.board.clone(),
        ColumnAction::Rm(a) => a.board.clone(),
    };

    match args.action {
        ColumnAction::Add(a) => {
            let id = board_ops::add_column(
                &mut settings,
                &a.board,
                &a.name,
                &a.tag,
                a.color.as_deref(),
                now,
            )?;
            if !json {
                println!("added column {} ({})", id, format_tag(normalize_tag(a.tag.trim())));
            }
        }
        ColumnAction::Edit(a) => {
            let color = if a.clear_color {
                Some(None)
            } else {
                a.color.map(Some)
            };
            let update = ColumnUpdate {
                name: a.name,
                tag: a.tag,
                color,
            };
            board_ops::update_column(&mut settings, &a.board, &a.column, &update, now)?;
            if !json {
                println!("updated column {}", a.column);
            }
        }
        ColumnAction::Rm(a) => {
            let removed = board_ops::remove_column(&mut settings, &a.board, &a.column, now)?;
            if !json {
                println!("removed column {} ({})", removed.id, format_tag(&removed.tag));
            }
        }
    }

    config_io::save_settings(&root, &settings)?;

    if json {
        let board = settings
            .find_board(&board_key)
            .ok_or_else(|| format!("board not found: {}", board_key))?;
        return print_json(&board_to_json(board, &settings));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

async fn cmd_show(args: ShowArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (root, settings) = load_vault_cwd()?;
    let board_id = pick_board(&settings, args.board.as_deref())?;
    let session = open_session(&root, settings).await;
    session.set_active_board(&board_id).await?;
    print_board(&session, json).await?;
    session.shutdown().await;
    Ok(())
}

async fn cmd_notes(args: NotesArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (root, settings) = load_vault_cwd()?;
    let store = Arc::new(FsStore::new(&root));
    let index = Arc::new(load_index(&root, &settings).await);
    let adapter = IndexAdapter::new(Arc::clone(&store), index);

    let notes = if settings.use_dataview_queries && adapter.is_available() {
        match adapter.query_by_multiple_tags(&args.tag).await {
            Ok(notes) => notes,
            Err(e) if settings.dataview_fallback => {
                tracing::warn!(error = %e, "falling back to vault scan");
                scan::scan_notes_by_tags(&*store, &args.tag).await?
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        scan::scan_notes_by_tags(&*store, &args.tag).await?
    };

    if json {
        let notes: Vec<NoteJson> = notes.iter().map(note_to_json).collect();
        return print_json(&notes);
    }
    for note in &notes {
        let tags = note
            .tags
            .iter()
            .map(|t| format_tag(t))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}  {}", note.path, tags);
    }
    Ok(())
}

async fn cmd_search(args: SearchArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (root, _) = load_vault_cwd()?;
    let re = Regex::new(&args.pattern)?;
    let store = FsStore::new(&root);
    let hits = search::search_notes(&store, &re, args.tag.as_deref()).await?;

    if json {
        let hits: Vec<SearchHitJson> = hits.iter().map(search_hit_to_json).collect();
        return print_json(&hits);
    }
    for hit in &hits {
        println!("{}", format_search_hit(hit));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

async fn cmd_mv(args: MvArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (root, _) = load_vault_cwd()?;
    let store = FsStore::new(&root);
    let outcome = rewrite::move_note(&store, &args.path, &args.from, &args.to).await?;

    let from = normalize_tag(args.from.trim());
    let to = normalize_tag(args.to.trim());
    if json {
        return print_json(&move_to_json(&args.path, from, to, outcome));
    }
    match outcome {
        MoveOutcome::Rewritten { .. } => {
            println!("{}: {} -> {}", args.path, format_tag(from), format_tag(to))
        }
        MoveOutcome::Unchanged => {
            println!("{}: no {} tag found, note left unchanged", args.path, format_tag(from))
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Index commands
// ---------------------------------------------------------------------------

async fn cmd_index(args: IndexCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (root, settings) = load_vault_cwd()?;
    let index = match args.action {
        IndexAction::Build => {
            let store = FsStore::new(&root);
            let index = LocalIndex::build(&store).await?;
            index.save(&root).await?;
            if !json {
                println!("indexed {} notes", index.len());
            }
            index
        }
        IndexAction::Status => LocalIndex::load(&root).await,
    };

    if json {
        return print_json(&IndexStatusJson {
            available: index.is_available(),
            notes: index.len(),
            built_at: index.built_at().map(|t| t.to_rfc3339()),
        });
    }
    match index.built_at() {
        Some(built_at) => println!(
            "index: {} notes, built {}",
            index.len(),
            built_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("no index (run `kanline index build`)"),
    }
    if !settings.use_dataview_queries {
        println!("note: use_dataview_queries is off, boards are classified by scanning");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings commands
// ---------------------------------------------------------------------------

fn cmd_settings(args: SettingsCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (root, settings) = load_vault_cwd()?;

    let settings = match args.action {
        SettingsAction::Show => settings,
        SettingsAction::Set(a) => {
            let mut patch = SettingsPatch::from_key_value(&a.key, &a.value)?;
            // default_board accepts a board name as well as an id
            if let Some(Some(key)) = &patch.default_board {
                let id = settings
                    .find_board(key)
                    .map(|b| b.id.clone())
                    .ok_or_else(|| format!("board not found: {}", key))?;
                patch.default_board = Some(Some(id));
            }
            config_io::update_settings(&root, &patch)?
        }
        SettingsAction::Import(a) => {
            let text = std::fs::read_to_string(&a.path)
                .map_err(|e| format!("could not read {}: {}", a.path, e))?;
            let imported = config_io::import_plugin_data(&text)?;
            config_io::save_settings(&root, &imported)?;
            if !json {
                println!("imported {} boards from {}", imported.boards.len(), a.path);
            }
            imported
        }
    };

    if json {
        return print_json(&settings);
    }
    println!("show_tags_on_cards = {}", settings.show_tags_on_cards);
    println!("card_height = {}", settings.card_height);
    println!("use_dataview_queries = {}", settings.use_dataview_queries);
    println!("dataview_fallback = {}", settings.dataview_fallback);
    println!("auto_refresh_enabled = {}", settings.auto_refresh_enabled);
    println!("auto_refresh_interval = {}", settings.auto_refresh_interval);
    println!(
        "default_board = {}",
        settings.default_board.as_deref().unwrap_or("(none)")
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Watch
// ---------------------------------------------------------------------------

async fn cmd_watch(args: ShowArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (root, settings) = load_vault_cwd()?;
    let board_id = pick_board(&settings, args.board.as_deref())?;
    let session = open_session(&root, settings).await;

    let mut revisions = session.subscribe();
    session.set_active_board(&board_id).await?;
    revisions.borrow_and_update();
    print_board(&session, json).await?;

    if !session.start_auto_refresh().await {
        eprintln!("auto refresh is disabled (settings set auto_refresh_enabled true)");
        session.shutdown().await;
        return Ok(());
    }

    loop {
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                revisions.borrow_and_update();
                println!();
                print_board(&session, json).await?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown().await;
    Ok(())
}
