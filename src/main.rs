//! Spendbook main entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use spendbook_config::{Config, ConfigError};
use spendbook_core::{
    CategoryListScreen, Completion, ExpenseListScreen, ListController, MemoryBackend,
    RecordingNotifier, SortOrder,
};
use tokio::runtime::Runtime;
use tokio::sync::{oneshot, watch};

#[derive(Parser, Debug)]
#[command(name = "spendbook")]
#[command(version)]
#[command(
    about = "Browse expenses and categories through paged, searchable lists",
    long_about = None
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "spendbook.yaml")]
    config: PathBuf,

    /// Seed file for the in-memory backend, overrides data.seed_file
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Print the list snapshot as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List categories
    Categories(ListArgs),
    /// List expenses grouped by day
    Expenses {
        #[command(flatten)]
        list: ListArgs,

        /// Only expenses of this category id
        #[arg(long)]
        category: Option<String>,
    },
    /// Print the default configuration
    DefaultConfig,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Name search text
    #[arg(long)]
    name: Option<String>,

    /// Sort as field,direction (e.g. date,desc)
    #[arg(long)]
    sort: Option<SortOrder>,

    /// Pages to load
    #[arg(long, default_value_t = 1)]
    pages: usize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::DefaultConfig = cli.command {
        print!("{}", Config::generate_default());
        return Ok(());
    }

    let (config, missing) = match Config::load(&cli.config) {
        Ok(config) => (config, None),
        Err(err @ ConfigError::FileNotFound { .. }) => (Config::default(), Some(err)),
        Err(err) => return Err(err).context("Failed to load configuration"),
    };

    // `Config::load` has already validated the file
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();
    if let Some(err) = missing {
        log::warn!("{}, using default configuration", err);
    }

    let backend = match cli.seed.as_ref().or(config.data.seed_file.as_ref()) {
        Some(path) => MemoryBackend::from_seed_file(path)
            .with_context(|| format!("Failed to seed backend from {}", path.display()))?,
        None => {
            log::info!("No seed file configured, starting with an empty backend");
            MemoryBackend::new()
        }
    };
    let backend = Arc::new(backend);
    let notifier = Arc::new(RecordingNotifier::new());

    let rt = Runtime::new()?;
    rt.block_on(async {
        match cli.command {
            Command::Categories(list) => {
                let screen = CategoryListScreen::new(backend, notifier.clone(), &config);
                run_categories(&screen, &list, &config, cli.json).await
            }
            Command::Expenses { list, category } => {
                let screen =
                    ExpenseListScreen::new(backend.clone(), backend, notifier.clone(), &config);
                run_expenses(&screen, &list, category.as_deref(), &config, cli.json).await
            }
            Command::DefaultConfig => Ok(()),
        }
    })?;

    let failures = notifier.failures();
    if !failures.is_empty() {
        anyhow::bail!("{} operation(s) failed, see log output", failures.len());
    }
    Ok(())
}

async fn run_categories(
    screen: &CategoryListScreen,
    list: &ListArgs,
    config: &Config,
    json: bool,
) -> anyhow::Result<()> {
    screen.enter();
    wait_for_fetch(screen.controller()).await?;

    if list.name.is_some() || list.sort.is_some() {
        let revisions = screen.controller().subscribe();
        if let Some(name) = &list.name {
            screen.set_name(name.as_str());
        }
        if let Some(sort) = &list.sort {
            screen.set_sort(sort.clone());
        }
        wait_for_search(screen.controller(), revisions, config).await?;
    }
    load_pages(list.pages, |done| screen.load_more(Some(done))).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&screen.snapshot())?);
    } else {
        for category in screen.controller().items() {
            println!("{}  ({})", category.name, category.id);
        }
        print_footer(screen.controller());
    }
    screen.leave();
    Ok(())
}

async fn run_expenses(
    screen: &ExpenseListScreen,
    list: &ListArgs,
    category: Option<&str>,
    config: &Config,
    json: bool,
) -> anyhow::Result<()> {
    screen.enter().await;
    wait_for_fetch(screen.controller()).await?;

    if list.name.is_some() || list.sort.is_some() || category.is_some() {
        let revisions = screen.controller().subscribe();
        if let Some(name) = &list.name {
            screen.set_name(name.as_str());
        }
        if let Some(sort) = &list.sort {
            screen.set_sort(sort.clone());
        }
        if category.is_some() {
            screen.set_category(category);
        }
        wait_for_search(screen.controller(), revisions, config).await?;
    }
    load_pages(list.pages, |done| screen.load_more(Some(done))).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&screen.snapshot())?);
    } else {
        for group in screen.groups() {
            println!("{}", group.key.format("%a %d %b %Y"));
            for expense in &group.items {
                let category = expense
                    .category
                    .as_ref()
                    .map(|c| c.name.as_str())
                    .unwrap_or("-");
                println!("  {:<32} {:>10}  {}", expense.name, expense.amount, category);
            }
        }
        print_footer(screen.controller());
    }
    screen.leave();
    Ok(())
}

/// Load up to `pages` pages in total, the first one already present
async fn load_pages<F>(pages: usize, load_more: F) -> anyhow::Result<()>
where
    F: Fn(Completion) -> bool,
{
    for _ in 1..pages {
        let (tx, rx) = oneshot::channel();
        let issued = load_more(Box::new(move || {
            let _ = tx.send(());
        }));
        rx.await.context("Page load was abandoned")?;
        if !issued {
            break;
        }
    }
    Ok(())
}

/// Wait until the outstanding fetch settles
async fn wait_for_fetch<T, V>(controller: &ListController<T, V>) -> anyhow::Result<()>
where
    T: Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    let mut revisions = controller.subscribe();
    while controller.is_loading() {
        revisions.changed().await.context("List controller went away")?;
    }
    Ok(())
}

/// Let a search edit pass the debounce window, then wait for its fetch.
/// `revisions` must be subscribed before the edit is made.
async fn wait_for_search<T, V>(
    controller: &ListController<T, V>,
    mut revisions: watch::Receiver<u64>,
    config: &Config,
) -> anyhow::Result<()>
where
    T: Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    tokio::time::timeout(
        std::time::Duration::from_millis(config.lists.debounce_ms + 1_000),
        revisions.changed(),
    )
    .await
    .context("Search edit was not applied")??;
    wait_for_fetch(controller).await
}

fn print_footer<T, V>(controller: &ListController<T, V>)
where
    T: Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    let criteria = controller.criteria();
    let more = if controller.last_page_reached() {
        "end of list"
    } else {
        "more available"
    };
    println!(
        "-- {} {} loaded ({}; {})",
        controller.items().len(),
        controller.name(),
        criteria.query_string(),
        more
    );
}
