use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use folio_auth::LocalAuth;
use folio_core::{
    errors::CoreError,
    model::{ConfirmPrompt, NewFile, SignUp},
    traits::Confirm,
    validate::validate_edit,
};
use folio_manager::{ProjectDraft, ProjectManager, SessionGate};
use folio_storage_local::{LocalAssetStore, LocalRecordStore};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod console;

use crate::console::{ConsoleNotifier, StdinConfirm};

const DEFAULT_ROOT: &str = "./data";

type Manager = ProjectManager<LocalAssetStore, LocalRecordStore>;

#[derive(Parser, Debug)]
#[command(name = "folio", version, about = "Portfolio project and asset manager")]
struct Cli {
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[arg(long, global = true)]
    config: Option<String>,
    /// Data directory holding assets, records and auth state.
    #[arg(long, global = true)]
    root: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Signup(SignupArgs),
    Login(LoginArgs),
    Logout(YesArgs),
    Whoami,
    List(ListArgs),
    Create(CreateArgs),
    Edit(EditArgs),
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
struct SignupArgs {
    #[arg(long)]
    email: String,
    #[arg(long, env = "FOLIO_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    name: Option<String>,
}

#[derive(Args, Debug)]
struct LoginArgs {
    #[arg(long)]
    email: String,
    #[arg(long, env = "FOLIO_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct YesArgs {
    /// Skip the confirmation prompt.
    #[arg(long)]
    yes: bool,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: String,
    #[arg(long = "file", action = ArgAction::Append, value_name = "PATH")]
    files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct EditArgs {
    id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Zero-based position in the project's file list; repeatable.
    #[arg(long = "remove", action = ArgAction::Append, value_name = "INDEX")]
    remove: Vec<usize>,
    #[arg(long = "add", action = ArgAction::Append, value_name = "PATH")]
    add: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    id: String,
    #[arg(long)]
    yes: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StorageSection {
    root: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct AppConfig {
    #[serde(default)]
    storage: Option<StorageSection>,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let cfg = load_config(cli.config.as_deref())?;
    let root = resolve_root(cli.root.as_deref(), cfg.as_ref());
    debug!(root = %root.display(), "data root");
    let app = App::open(&root)?;
    match cli.command {
        Commands::Signup(args) => app.signup(args)?,
        Commands::Login(args) => app.login(args)?,
        Commands::Logout(args) => app.logout(args)?,
        Commands::Whoami => app.whoami()?,
        Commands::List(args) => app.list(args).await?,
        Commands::Create(args) => app.create(args).await?,
        Commands::Edit(args) => app.edit(args).await?,
        Commands::Delete(args) => app.delete(args).await?,
    }
    Ok(())
}

struct App {
    gate: SessionGate<LocalAuth>,
    manager: Arc<Manager>,
}

impl App {
    fn open(root: &Path) -> Result<Self> {
        let notifier = Arc::new(ConsoleNotifier::default());
        let auth = LocalAuth::open(root.join("auth")).map_err(|e| eyre!("auth state: {}", e))?;
        let (assets, records) =
            folio_storage_local::open_stores(root).map_err(|e| eyre!("storage: {}", e))?;
        let manager = ProjectManager::new(assets, records)
            .with_notifier(notifier.clone())
            .with_confirm(Arc::new(StdinConfirm));
        Ok(Self {
            gate: SessionGate::new(auth).with_notifier(notifier),
            manager: Arc::new(manager),
        })
    }

    fn signup(&self, args: SignupArgs) -> Result<()> {
        let session = self
            .gate
            .sign_up(&SignUp {
                email: args.email,
                password: SecretString::from(args.password),
                display_name: args.name,
            })
            .map_err(report)?;
        println!("{}", session.uid);
        Ok(())
    }

    fn login(&self, args: LoginArgs) -> Result<()> {
        let session = self
            .gate
            .sign_in(&args.email, &SecretString::from(args.password))
            .map_err(report)?;
        println!("{}", session.uid);
        Ok(())
    }

    fn logout(&self, args: YesArgs) -> Result<()> {
        if self.gate.current().is_none() {
            info!("no active session");
            return Ok(());
        }
        let prompt = ConfirmPrompt {
            title: "Sign out?".to_owned(),
            message: "You will need your password to sign back in.".to_owned(),
        };
        if !args.yes && !StdinConfirm.confirm(&prompt) {
            info!("sign-out cancelled");
            return Ok(());
        }
        self.gate.sign_out().map_err(report)
    }

    fn whoami(&self) -> Result<()> {
        let session = self.gate.require_session().map_err(report)?;
        let name = self
            .gate
            .provider()
            .profile(&session.uid)
            .and_then(|p| p.display_name);
        match name {
            Some(name) => println!("{} <{}> {}", name, session.email, session.uid),
            None => println!("{} {}", session.email, session.uid),
        }
        Ok(())
    }

    async fn list(&self, args: ListArgs) -> Result<()> {
        self.gate.require_session().map_err(report)?;
        let projects = self.run(|m| m.list_projects()).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&projects)?);
            return Ok(());
        }
        for p in &projects {
            println!("{}\t{}\t{} file(s)", p.id, p.title, p.assets.len());
        }
        Ok(())
    }

    async fn create(&self, args: CreateArgs) -> Result<()> {
        self.gate.require_session().map_err(report)?;
        let files = read_files(&args.files)?;
        let project = self
            .run(move |m| m.create_project(&args.title, &args.description, files))
            .await?;
        println!("{}", project.id);
        Ok(())
    }

    async fn edit(&self, args: EditArgs) -> Result<()> {
        self.gate.require_session().map_err(report)?;
        let added = read_files(&args.add)?;
        let mut removals = args.remove;
        // highest first so earlier indices stay valid
        removals.sort_unstable_by(|a, b| b.cmp(a));
        removals.dedup();
        let project = self
            .run(move |m| {
                let stored = m.get_project(&args.id)?;
                let mut draft = ProjectDraft::from_project(&stored);
                if let Some(title) = args.title {
                    draft.title = title;
                }
                if let Some(description) = args.description {
                    draft.description = description;
                }
                // removals delete from the store immediately
                validate_edit(&draft.title, &added)?;
                for index in removals {
                    m.remove_asset(&mut draft, index)?;
                }
                for file in added {
                    draft.add_file(file);
                }
                m.save_draft(draft)
            })
            .await?;
        println!("{}", project.id);
        Ok(())
    }

    async fn delete(&self, args: DeleteArgs) -> Result<()> {
        self.gate.require_session().map_err(report)?;
        let yes = args.yes;
        let outcome = self
            .run(move |m| {
                let project = m.get_project(&args.id)?;
                if yes {
                    m.delete_project(&project.id, &project.title).map(Some)
                } else {
                    m.confirm_and_delete(&project)
                }
            })
            .await?;
        match outcome {
            Some(report) => {
                for (path, error) in &report.failed {
                    eprintln!("warning: {path} not removed: {error}");
                }
                if let Some(error) = &report.listing_error {
                    eprintln!("warning: could not list project files: {error}");
                }
                println!("removed {} file(s)", report.removed.len());
            }
            None => eprintln!("delete cancelled"),
        }
        Ok(())
    }

    /// Runs a lifecycle call on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Manager) -> Result<T, CoreError> + Send + 'static,
        T: Send + 'static,
    {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || f(&manager))
            .await
            .map_err(|e| eyre!("task join error: {}", e))?
            .map_err(report)
    }
}

fn report(err: CoreError) -> color_eyre::eyre::Report {
    eyre!("{} ({})", err, err.kind())
}

fn read_files(paths: &[PathBuf]) -> Result<Vec<NewFile>> {
    paths
        .iter()
        .map(|p| NewFile::from_path(p).map_err(|e| eyre!("read {}: {}", p.display(), e)))
        .collect()
}

fn resolve_root(flag: Option<&str>, cfg: Option<&AppConfig>) -> PathBuf {
    let configured = cfg
        .and_then(|c| c.storage.as_ref())
        .and_then(|s| s.root.as_deref());
    expand_path(flag.or(configured).unwrap_or(DEFAULT_ROOT))
}

fn load_config(path: Option<&str>) -> Result<Option<AppConfig>> {
    let mut builder = config::Config::builder().add_source(
        config::Environment::with_prefix("FOLIO")
            .prefix_separator("_")
            .separator("__"),
    );

    let mut has_sources = false;
    if let Some(raw) = path {
        let expanded = expand_path(raw);
        has_sources = true;
        if !expanded.exists() {
            tracing::warn!(
                path = expanded.display().to_string(),
                "config file not found; continuing with defaults and env overrides"
            );
        }
        builder = builder.add_source(config::File::from(expanded).required(false));
    }

    let cfg = builder
        .build()
        .map_err(|e| eyre!("config load error: {}", e))?;
    let parsed: AppConfig = cfg
        .try_deserialize()
        .map_err(|e| eyre!("config parse error: {}", e))?;
    if has_sources || parsed.storage.is_some() {
        return Ok(Some(parsed));
    }
    Ok(None)
}

fn expand_path(input: &str) -> PathBuf {
    if input == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from(input));
    }
    if let Some(rest) = input.strip_prefix("~/") {
        return home_dir()
            .map(|mut base| {
                base.push(rest);
                base
            })
            .unwrap_or_else(|| PathBuf::from(rest));
    }
    PathBuf::from(input)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("USERPROFILE").map(PathBuf::from))
}
