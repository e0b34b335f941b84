use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, resolve_data_dir};
use crate::model::{Domain, SchemaRegistry};
use crate::query::{Evaluator, ParserContext, QuerySpec, parse_query, today_local};
use crate::store::{DataStore, JsonStore, state};
use crate::tui;

use super::commands::{
    AddArgs, Cli, Commands, DeleteArgs, DoneArgs, LogArgs, ProjectArgs, QueryArgs,
};
use super::output;

/// Top-level dispatch. Every handler is a thin collaborator: it builds a
/// query or a store call and hands off to the core.
pub fn dispatch(cli: Cli) -> Result<(), String> {
    let data_dir = cli.data_dir.unwrap_or_else(resolve_data_dir);
    init_logging(&data_dir);

    match cli.command {
        None => run_grid_with_last_query(&data_dir),
        Some(Commands::Init) => cmd_init(&data_dir),
        Some(Commands::List(args)) => cmd_list(&data_dir, args),
        Some(Commands::Grid(args)) => cmd_grid(&data_dir, args, None),
        Some(Commands::Board(args)) => {
            cmd_grid(&data_dir, args, Some("task group:status view:kanban"))
        }
        Some(Commands::Add(args)) => cmd_add(&data_dir, args),
        Some(Commands::Done(args)) => cmd_done(&data_dir, args),
        Some(Commands::Delete(args)) => cmd_delete(&data_dir, args),
        Some(Commands::Log(args)) => cmd_log(&data_dir, args),
        Some(Commands::Project(args)) => cmd_project(&data_dir, args),
    }
}

/// File-backed logging; the raw terminal is never written to by the
/// logger. `TASKDECK_LOG` selects the filter (default: warn).
fn init_logging(data_dir: &Path) {
    if std::fs::create_dir_all(data_dir).is_err() {
        return;
    }
    let appender = tracing_appender::rolling::never(data_dir, "taskdeck.log");
    let filter =
        EnvFilter::try_from_env("TASKDECK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(appender)
        .with_ansi(false)
        .try_init();
}

fn open_store(data_dir: &Path) -> Result<JsonStore, String> {
    JsonStore::open(data_dir).map_err(|e| e.to_string())
}

/// Parse a query string, reporting accumulated errors as one message.
fn parse_valid_query(
    input: &str,
    schema: &SchemaRegistry,
    project_names: &[String],
) -> Result<QuerySpec, String> {
    let ctx = ParserContext {
        schema,
        project_names,
    };
    let spec = parse_query(input, &ctx).map_err(|e| e.to_string())?;
    if !spec.is_valid() {
        let messages: Vec<String> = spec.errors.iter().map(|e| e.to_string()).collect();
        return Err(messages.join("\n"));
    }
    Ok(spec)
}

fn query_string(args: &QueryArgs, fallback: &str) -> String {
    if args.query.is_empty() {
        fallback.to_string()
    } else {
        args.query.join(" ")
    }
}

fn cmd_init(data_dir: &Path) -> Result<(), String> {
    open_store(data_dir)?;
    let config_path = data_dir.join("config.toml");
    if !config_path.exists() {
        let starter = "\
# taskdeck configuration

# [columns]
# task = [\"id\", \"text\", \"project\", \"priority\", \"due\", \"status\"]

# [ui.colors]
# highlight = \"#F86AB4\"
";
        std::fs::write(&config_path, starter).map_err(|e| e.to_string())?;
    }
    println!("initialized {}", data_dir.display());
    Ok(())
}

fn cmd_list(data_dir: &Path, args: QueryArgs) -> Result<(), String> {
    let store = open_store(data_dir)?;
    let config = Config::load(data_dir).map_err(|e| e.to_string())?;
    let schema = SchemaRegistry::new();
    let query = query_string(&args, "task");
    let spec = parse_valid_query(&query, &schema, &store.project_names())?;
    let domain = spec.domain;
    let evaluator = Evaluator::new(&store, &schema, today_local());
    let result = evaluator
        .evaluate(&spec, &config.default_columns(domain))
        .map_err(|e| e.to_string())?;
    output::print_table(&result, &schema, domain);
    Ok(())
}

fn run_grid_with_last_query(data_dir: &Path) -> Result<(), String> {
    let last = state::read_ui_state(data_dir)
        .and_then(|s| s.last_query)
        .unwrap_or_else(|| "task".to_string());
    cmd_grid(
        data_dir,
        QueryArgs {
            query: vec![],
        },
        Some(&last),
    )
}

fn cmd_grid(data_dir: &Path, args: QueryArgs, fallback: Option<&str>) -> Result<(), String> {
    let mut store = open_store(data_dir)?;
    let config = Config::load(data_dir).map_err(|e| e.to_string())?;
    let schema = SchemaRegistry::new();
    let theme = tui::Theme::from_config(&config.ui);
    let query = query_string(&args, fallback.unwrap_or("task"));
    let spec = parse_valid_query(&query, &schema, &store.project_names())?;
    tui::run_interactive(
        &mut store,
        &schema,
        &theme,
        &config,
        spec,
        query,
        PathBuf::from(data_dir),
        today_local(),
    )
    .map_err(|e| e.to_string())
}

fn cmd_add(data_dir: &Path, args: AddArgs) -> Result<(), String> {
    let mut store = open_store(data_dir)?;
    let schema = SchemaRegistry::new();
    let today = today_local();
    let quick = parse_quick_add(&args.words, &schema, today)?;
    if quick.text.is_empty() {
        return Err("task text required".to_string());
    }
    let id = store
        .add_task(
            quick.text,
            quick.project,
            quick.priority,
            quick.due,
            quick.tags,
            today,
        )
        .map_err(|e| e.to_string())?;
    println!("added task {id}");
    Ok(())
}

struct QuickAdd {
    text: String,
    project: Option<String>,
    priority: Option<u8>,
    due: Option<NaiveDate>,
    tags: Vec<String>,
}

/// Quick-add token sweep: `@project`, `#tag`, `p1`-`p3`, `due:<date>`;
/// everything else becomes the task text.
fn parse_quick_add(
    words: &[String],
    schema: &SchemaRegistry,
    today: NaiveDate,
) -> Result<QuickAdd, String> {
    let mut quick = QuickAdd {
        text: String::new(),
        project: None,
        priority: None,
        due: None,
        tags: Vec::new(),
    };
    let mut text_words: Vec<&str> = Vec::new();
    for word in words {
        if let Some(project) = word.strip_prefix('@') {
            quick.project = Some(project.to_string());
        } else if let Some(tag) = word.strip_prefix('#') {
            quick.tags.push(tag.to_ascii_lowercase());
        } else if let Some(canon) = priority_token(word, schema, today) {
            quick.priority = Some(canon);
        } else if let Some(raw) = word.strip_prefix("due:") {
            let canon = schema
                .normalize(Domain::Task, "due", raw, today)
                .map_err(|e| e.to_string())?;
            quick.due = NaiveDate::parse_from_str(&canon, "%Y-%m-%d").ok();
        } else {
            text_words.push(word);
        }
    }
    quick.text = text_words.join(" ");
    Ok(quick)
}

fn priority_token(word: &str, schema: &SchemaRegistry, today: NaiveDate) -> Option<u8> {
    let rest = word.strip_prefix(['p', 'P'])?;
    if rest.len() != 1 || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    schema
        .normalize(Domain::Task, "priority", rest, today)
        .ok()?
        .parse()
        .ok()
}

fn cmd_done(data_dir: &Path, args: DoneArgs) -> Result<(), String> {
    let mut store = open_store(data_dir)?;
    store
        .mark_done(args.id, today_local())
        .map_err(|e| e.to_string())?;
    println!("task {} done", args.id);
    Ok(())
}

fn cmd_delete(data_dir: &Path, args: DeleteArgs) -> Result<(), String> {
    let domain = Domain::parse(&args.domain)
        .ok_or_else(|| format!("unknown domain '{}'", args.domain))?;
    let mut store = open_store(data_dir)?;
    store
        .delete_entities(domain, &args.keys)
        .map_err(|e| e.to_string())?;
    println!("deleted {} {}(s)", args.keys.len(), domain);
    Ok(())
}

fn cmd_log(data_dir: &Path, args: LogArgs) -> Result<(), String> {
    let mut store = open_store(data_dir)?;
    let description = if args.description.is_empty() {
        None
    } else {
        Some(args.description.join(" "))
    };
    let id = store
        .add_log(
            Some(args.project),
            args.minutes,
            description,
            args.task,
            today_local(),
        )
        .map_err(|e| e.to_string())?;
    println!("logged entry {id}");
    Ok(())
}

fn cmd_project(data_dir: &Path, args: ProjectArgs) -> Result<(), String> {
    let mut store = open_store(data_dir)?;
    match args.name {
        Some(name) => {
            store
                .add_project(name.clone(), args.description, today_local())
                .map_err(|e| e.to_string())?;
            println!("added project {name}");
            Ok(())
        }
        None => {
            let config = Config::load(data_dir).map_err(|e| e.to_string())?;
            let schema = SchemaRegistry::new();
            let ctx = ParserContext {
                schema: &schema,
                project_names: &[],
            };
            let spec = parse_query("project", &ctx).map_err(|e| e.to_string())?;
            let evaluator = Evaluator::new(&store, &schema, today_local());
            let result = evaluator
                .evaluate(&spec, &config.default_columns(Domain::Project))
                .map_err(|e| e.to_string())?;
            output::print_table(&result, &schema, Domain::Project);
            Ok(())
        }
    }
}
