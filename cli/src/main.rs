use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use kbconsole::config::{ConfigError, ConsoleConfig, DevServerConfig, normalize_base_url, parse_addr};
use kbconsole::devserver::{self, DevServerError};
use kbconsole::net::api::{ApiClient, ApiError};
use kbconsole::net::types::{
    DepartmentCreate, DepartmentUpdate, Envelope, FileSearchRequest, SortField, SortOrder,
};
use kbconsole::router::RouterError;
use kbconsole::router::guard::{GuardConfig, NavigationGuard};
use kbconsole::router::navigator::{Navigation, Navigator};
use kbconsole::router::routes::app_routes;
use kbconsole::state::session::{FileStorage, SessionAccessor, SessionError, SessionStorage, SessionStore};
use serde::Serialize;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not logged in; run `kbconsole login <username>` first")]
    NotLoggedIn,
    #[error("nothing to update; pass at least one of --name, --description, --sort-order, --active")]
    EmptyUpdate,
    #[error("backend rejected the request: {0}")]
    Rejected(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("navigation failed: {0}")]
    Router(#[from] RouterError),
    #[error("dev server error: {0}")]
    DevServer(#[from] DevServerError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "kbconsole", about = "Knowledge-base admin console")]
struct Cli {
    /// Backend origin; overrides `KB_API_URL`.
    #[arg(long, env = "KB_API_URL")]
    api_url: Option<String>,

    /// Session storage file; overrides `KB_SESSION_FILE`.
    #[arg(long, env = "KB_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange credentials for a token and land on the remembered page.
    Login {
        username: String,
        #[arg(long, env = "KB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Run a navigation through the route guard and print where it settles.
    Navigate { path: String },
    Departments(DepartmentsCommand),
    Files(FilesCommand),
    /// Serve the built front-end and proxy API calls to the backend.
    Serve {
        #[arg(long)]
        addr: Option<String>,
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct DepartmentsCommand {
    #[command(subcommand)]
    command: DepartmentsSubcommand,
}

#[derive(Subcommand, Debug)]
enum DepartmentsSubcommand {
    List,
    Get {
        id: i64,
    },
    Create {
        name: String,
        #[arg(long)]
        parent_id: Option<i64>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value_t = 0)]
        sort_order: i32,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        sort_order: Option<i32>,
        #[arg(long)]
        active: Option<bool>,
    },
    Delete {
        id: i64,
        /// Also delete sub-departments and detach their users.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct FilesCommand {
    #[command(subcommand)]
    command: FilesSubcommand,
}

#[derive(Subcommand, Debug)]
enum FilesSubcommand {
    /// Search with a JSON body.
    Search(SearchArgs),
    /// Search with query parameters.
    SearchGet(SearchArgs),
    Stats {
        #[arg(long, value_delimiter = ',')]
        department_ids: Vec<i64>,
    },
    /// Departments the signed-in user may search.
    MyDepartments,
}

#[derive(Args, Debug, Clone)]
struct SearchArgs {
    #[arg(long, value_delimiter = ',')]
    department_ids: Vec<i64>,

    /// Search only the listed departments, not their sub-departments.
    #[arg(long, default_value_t = false)]
    no_subdepts: bool,

    #[arg(long)]
    keyword: Option<String>,

    #[arg(long, value_delimiter = ',')]
    file_types: Vec<String>,

    #[arg(long)]
    date_from: Option<String>,

    #[arg(long)]
    date_to: Option<String>,

    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long, default_value_t = 20)]
    page_size: u32,

    #[arg(long, default_value = "created_at", value_parser = parse_sort_field)]
    sort_by: SortField,

    #[arg(long, default_value = "desc", value_parser = parse_sort_order)]
    order: SortOrder,
}

impl SearchArgs {
    fn into_request(self) -> FileSearchRequest {
        FileSearchRequest {
            department_ids: non_empty(self.department_ids),
            include_subdepts: !self.no_subdepts,
            keyword: self.keyword,
            file_types: non_empty(self.file_types),
            date_from: self.date_from,
            date_to: self.date_to,
            page: self.page,
            page_size: self.page_size,
            sort_by: self.sort_by,
            order: self.order,
        }
    }
}

type Store = SessionStore<ApiClient, Arc<FileStorage>>;

struct CliContext {
    client: ApiClient,
    storage: Arc<FileStorage>,
    store: Arc<Store>,
    guard: GuardConfig,
}

impl CliContext {
    fn new(api_url: Option<&str>, session_file: Option<PathBuf>) -> Result<Self, CliError> {
        let mut config = ConsoleConfig::from_env();
        if let Some(url) = api_url {
            config.api_url = normalize_base_url(url);
        }
        if let Some(path) = session_file {
            config.session_file = path;
        }

        let client = ApiClient::from_config(&config)?;
        let storage = Arc::new(FileStorage::new(config.session_file.clone()));
        let store = Arc::new(SessionStore::open(client.clone(), Arc::clone(&storage)));
        Ok(Self { client, storage, store, guard: GuardConfig::from_console(&config) })
    }

    /// A client carrying the stored credential.
    fn authed(&self) -> Result<ApiClient, CliError> {
        let token = self.store.snapshot().token.ok_or(CliError::NotLoggedIn)?;
        Ok(self.client.clone().with_token(Some(token)))
    }

    fn navigator(&self) -> Navigator<Arc<Store>, Arc<FileStorage>> {
        let guard = NavigationGuard::new(Arc::clone(&self.store), Arc::clone(&self.storage), self.guard.clone());
        Navigator::new(app_routes(), guard)
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let Cli { api_url, session_file, command } = Cli::parse();
    let context = || CliContext::new(api_url.as_deref(), session_file.clone());

    match command {
        Command::Serve { addr, static_dir } => {
            let config = serve_config(addr.as_deref(), static_dir, api_url.as_deref())?;
            devserver::serve(&config).await?;
            Ok(())
        }
        Command::Login { username, password } => run_login(&context()?, &username, &password).await,
        Command::Logout => run_logout(&context()?),
        Command::Whoami => run_whoami(&context()?).await,
        Command::Navigate { path } => {
            let navigation = context()?.navigator().push(&path).await?;
            print_json(&navigation_json(&navigation))
        }
        Command::Departments(cmd) => run_departments(&context()?, cmd.command).await,
        Command::Files(cmd) => run_files(&context()?, cmd.command).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run_login(ctx: &CliContext, username: &str, password: &str) -> Result<(), CliError> {
    let issued = ctx.client.login(username, password).await?;
    ctx.store.login(issued.access_token, None)?;
    if let Err(e) = ctx.store.hydrate().await {
        tracing::warn!(error = %e, "signed in but could not load profile");
    }

    let remembered = ctx.storage.take_redirect()?;
    let target = remembered.as_deref().unwrap_or("/");
    let navigation = ctx.navigator().push(target).await?;

    let session = ctx.store.snapshot();
    print_json(&json!({
        "user": session.user,
        "remembered": remembered,
        "location": navigation.location.full_path,
    }))
}

fn run_logout(ctx: &CliContext) -> Result<(), CliError> {
    ctx.store.logout();
    println!("logged out");
    Ok(())
}

async fn run_whoami(ctx: &CliContext) -> Result<(), CliError> {
    let session = ctx.store.snapshot();
    if session.token.is_none() {
        return Err(CliError::NotLoggedIn);
    }
    if session.needs_hydration() {
        if let Err(e) = ctx.store.hydrate().await {
            if matches!(&e, SessionError::Fetch(api) if api.is_unauthorized()) {
                ctx.store.logout();
            }
            return Err(e.into());
        }
    }
    print_json(&json!(ctx.store.snapshot().user))
}

async fn run_departments(ctx: &CliContext, command: DepartmentsSubcommand) -> Result<(), CliError> {
    let client = ctx.authed()?;
    match command {
        DepartmentsSubcommand::List => print_json(&serde_json::to_value(client.get_departments().await?)?),
        DepartmentsSubcommand::Get { id } => print_envelope(client.get_department(id).await?),
        DepartmentsSubcommand::Create { name, parent_id, description, sort_order } => {
            let body = DepartmentCreate { parent_id, description, sort_order, ..DepartmentCreate::named(name) };
            print_envelope(client.create_department(&body).await?)
        }
        DepartmentsSubcommand::Update { id, name, description, sort_order, active } => {
            let body = DepartmentUpdate { name, description, sort_order, is_active: active };
            if body.is_empty() {
                return Err(CliError::EmptyUpdate);
            }
            print_envelope(client.update_department(id, &body).await?)
        }
        DepartmentsSubcommand::Delete { id, force } => print_envelope(client.delete_department(id, force).await?),
    }
}

async fn run_files(ctx: &CliContext, command: FilesSubcommand) -> Result<(), CliError> {
    let client = ctx.authed()?;
    match command {
        FilesSubcommand::Search(args) => print_envelope(client.search_files(&args.into_request()).await?),
        FilesSubcommand::SearchGet(args) => print_envelope(client.search_files_get(&args.into_request()).await?),
        FilesSubcommand::Stats { department_ids } => print_envelope(client.get_file_stats(&department_ids).await?),
        FilesSubcommand::MyDepartments => print_envelope(client.get_my_departments().await?),
    }
}

/// Env config with CLI overrides; `--api-url` also picks the proxy upstream.
fn serve_config(addr: Option<&str>, static_dir: Option<PathBuf>, api_url: Option<&str>) -> Result<DevServerConfig, CliError> {
    let mut config = DevServerConfig::from_env()?;
    if let Some(raw) = addr {
        config.addr = parse_addr(raw)?;
    }
    if let Some(dir) = static_dir {
        config.static_dir = dir;
    }
    if let Some(url) = api_url {
        config.upstream = normalize_base_url(url);
    }
    Ok(config)
}

fn navigation_json(navigation: &Navigation) -> Value {
    let location = &navigation.location;
    json!({
        "location": location.full_path,
        "name": location.name(),
        "params": location.params,
        "keep_alive": location.keep_alive(),
        "redirected": navigation.was_redirected(),
        "redirected_from": navigation.redirected_from,
        "hops": navigation.outcomes.len() - 1,
    })
}

fn print_envelope<T: Serialize>(envelope: Envelope<T>) -> Result<(), CliError> {
    if !envelope.success {
        return Err(CliError::Rejected(envelope.message.unwrap_or_else(|| "no message".to_owned())));
    }
    print_json(&serde_json::to_value(envelope.data)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

fn parse_sort_field(raw: &str) -> Result<SortField, String> {
    [SortField::CreatedAt, SortField::UpdatedAt, SortField::Filename, SortField::FileSize]
        .into_iter()
        .find(|f| f.as_str() == raw)
        .ok_or_else(|| format!("expected created_at, updated_at, filename or file_size, got '{raw}'"))
}

fn parse_sort_order(raw: &str) -> Result<SortOrder, String> {
    match raw.to_ascii_lowercase().as_str() {
        "asc" => Ok(SortOrder::Asc),
        "desc" => Ok(SortOrder::Desc),
        _ => Err(format!("expected asc or desc, got '{raw}'")),
    }
}
