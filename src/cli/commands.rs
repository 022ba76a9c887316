use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kanline", about = concat!("kanline v", env!("CARGO_PKG_VERSION"), " - kanban boards over tagged markdown notes"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different vault directory
    #[arg(short = 'C', long = "vault", global = true)]
    pub vault: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize kanline settings in the current directory
    Init(InitArgs),
    /// List boards
    Boards,
    /// Board management
    Board(BoardCmd),
    /// Column management
    Column(ColumnCmd),
    /// Show a board with its cards
    Show(ShowArgs),
    /// List notes carrying any of the given tags
    Notes(NotesArgs),
    /// Move a note from one column tag to another
    Mv(MvArgs),
    /// Search notes by regex
    Search(SearchArgs),
    /// Build or inspect the local note index
    Index(IndexCmd),
    /// View or change settings
    Settings(SettingsCmd),
    /// Show a board and reprint it whenever it changes
    Watch(ShowArgs),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Create a first board with the default columns
    #[arg(long)]
    pub board: Option<String>,
    /// Import settings from an editor plugin data.json
    #[arg(long, value_name = "PATH")]
    pub import: Option<String>,
    /// Reinitialize even if .kanline/ already exists
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Board args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct BoardCmd {
    #[command(subcommand)]
    pub action: BoardAction,
}

#[derive(Subcommand)]
pub enum BoardAction {
    /// Create a new board
    Create(BoardCreateArgs),
    /// Rename a board
    Rename(BoardRenameArgs),
    /// Set or clear a board's filter query
    Filter(BoardFilterArgs),
    /// Delete a board
    Delete(BoardKeyArg),
    /// Set or clear the default board
    Default(BoardDefaultArgs),
}

#[derive(Args)]
pub struct BoardCreateArgs {
    /// Board name
    pub name: String,
    /// Filter query ANDed with every column tag, e.g. '"Projects"'
    #[arg(long)]
    pub filter: Option<String>,
    /// Add a column: --column "name" <tag> (repeatable; default: To Do/In Progress/Done)
    #[arg(long, num_args = 2, value_names = ["NAME", "TAG"], action = clap::ArgAction::Append)]
    pub column: Vec<String>,
}

#[derive(Args)]
pub struct BoardKeyArg {
    /// Board id or name
    pub board: String,
}

#[derive(Args)]
pub struct BoardRenameArgs {
    /// Board id or name
    pub board: String,
    /// New name
    pub name: String,
}

#[derive(Args)]
pub struct BoardFilterArgs {
    /// Board id or name
    pub board: String,
    /// Filter query (omit to clear)
    pub query: Option<String>,
}

#[derive(Args)]
pub struct BoardDefaultArgs {
    /// Board id or name (omit to clear)
    pub board: Option<String>,
}

// ---------------------------------------------------------------------------
// Column args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ColumnCmd {
    #[command(subcommand)]
    pub action: ColumnAction,
}

#[derive(Subcommand)]
pub enum ColumnAction {
    /// Append a column to a board
    Add(ColumnAddArgs),
    /// Change a column's name, tag or color
    Edit(ColumnEditArgs),
    /// Remove a column
    Rm(ColumnRmArgs),
}

#[derive(Args)]
pub struct ColumnAddArgs {
    /// Board id or name
    pub board: String,
    /// Column name
    pub name: String,
    /// Tag that puts a note in this column
    pub tag: String,
    /// Display color, e.g. "#ff8800"
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args)]
pub struct ColumnEditArgs {
    /// Board id or name
    pub board: String,
    /// Column id
    pub column: String,
    /// New name
    #[arg(long)]
    pub name: Option<String>,
    /// New tag (existing notes are not retagged)
    #[arg(long)]
    pub tag: Option<String>,
    /// New color
    #[arg(long, conflicts_with = "clear_color")]
    pub color: Option<String>,
    /// Remove the color
    #[arg(long)]
    pub clear_color: bool,
}

#[derive(Args)]
pub struct ColumnRmArgs {
    /// Board id or name
    pub board: String,
    /// Column id
    pub column: String,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ShowArgs {
    /// Board id or name (default: the default board, or the only board)
    pub board: Option<String>,
}

#[derive(Args)]
pub struct NotesArgs {
    /// Tag to look for (repeatable)
    #[arg(long, required = true)]
    pub tag: Vec<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern to search for
    pub pattern: String,
    /// Only search notes carrying this tag
    #[arg(long)]
    pub tag: Option<String>,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct MvArgs {
    /// Note path, relative to the vault
    pub path: String,
    /// Tag of the column the note is in
    pub from: String,
    /// Tag of the destination column
    pub to: String,
}

// ---------------------------------------------------------------------------
// Index args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct IndexCmd {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand)]
pub enum IndexAction {
    /// Rebuild .kanline/index.json from the vault
    Build,
    /// Show whether the index exists and how old it is
    Status,
}

// ---------------------------------------------------------------------------
// Settings args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SettingsCmd {
    #[command(subcommand)]
    pub action: SettingsAction,
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the current settings
    Show,
    /// Change one setting, e.g. `set auto_refresh_interval 10`
    Set(SettingsSetArgs),
    /// Replace settings with an editor plugin data.json
    Import(SettingsImportArgs),
}

#[derive(Args)]
pub struct SettingsSetArgs {
    /// Setting name (snake_case or camelCase)
    pub key: String,
    /// New value
    pub value: String,
}

#[derive(Args)]
pub struct SettingsImportArgs {
    /// Path to data.json
    pub path: String,
}
