use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "td",
    about = concat!("taskdeck v", env!("CARGO_PKG_VERSION"), " - tasks, projects, and time in one grid"),
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Run against a different data directory
    #[arg(short = 'C', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and a starter config
    Init,
    /// Print query results as a plain table
    List(QueryArgs),
    /// Open the interactive grid for a query
    Grid(QueryArgs),
    /// Open the kanban board (default: task group:status)
    Board(QueryArgs),
    /// Add a task: `td add fix the login page @acme #web p1 due:+3`
    Add(AddArgs),
    /// Mark a task done
    Done(DoneArgs),
    /// Permanently delete rows by key
    Delete(DeleteArgs),
    /// Log time against a project
    Log(LogArgs),
    /// Add a project, or list all projects
    Project(ProjectArgs),
}

#[derive(Args)]
pub struct QueryArgs {
    /// Query tokens, e.g. `task due:today p<=2 sort:due+`
    #[arg(trailing_var_arg = true)]
    pub query: Vec<String>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task words plus `@project`, `#tag`, `p1`-`p3`, and `due:` tokens
    #[arg(trailing_var_arg = true, required = true)]
    pub words: Vec<String>,
}

#[derive(Args)]
pub struct DoneArgs {
    /// Task id
    pub id: u64,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Domain: task, project, or timelog
    pub domain: String,
    /// Keys (ids, or project names)
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args)]
pub struct LogArgs {
    /// Project name
    pub project: String,
    /// Minutes spent
    pub minutes: u32,
    /// What the time went into
    pub description: Vec<String>,
    /// Link the entry to a task id
    #[arg(long)]
    pub task: Option<u64>,
}

#[derive(Args)]
pub struct ProjectArgs {
    /// Project name; omit to list projects
    pub name: Option<String>,
    /// Short description
    #[arg(long)]
    pub description: Option<String>,
}
