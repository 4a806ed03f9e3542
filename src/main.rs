use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::de::DeserializeOwned;

use testrunner_client::cli::{Cli, Command, GlobalArgs, StoreBackend, TabsCommand, render_result, render_tabs};
use testrunner_client::config::{ClientConfig, SessionConfig, default_data_dir};
use testrunner_client::storage::{JsonFileStorage, SqliteStorage};
use testrunner_client::tabs::{TabId, TabSeed, TabStore};
use testrunner_client::{DebugClient, RequestDefinition, RequestPatch, logging};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    logging::init(logging::DEFAULT_FILTER);
    let cli = Cli::parse();
    let mut store = open_store(&cli.global)?;

    match cli.command {
        Command::Quick { file, project, env } => {
            let request: RequestDefinition = read_json(&file)?;
            let client = client(&cli.global)?;
            let name = file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let tab_id = store.create_tab(TabSeed::named(name).with_patch(request.into()));
            run(&mut store, &client, &tab_id, Some(project), env, &cli.global).await
        }
        Command::Debug {
            interface_id,
            overrides,
            env,
        } => {
            let client = client(&cli.global)?;
            let tab_id = match store.find_by_interface(interface_id) {
                Some(tab) => tab.id.clone(),
                None => {
                    let interface = client.get_interface(interface_id).await?;
                    store.open_or_activate(interface_id, TabSeed::from(&interface))
                }
            };
            store.activate(&tab_id);
            if let Some(path) = overrides {
                let patch: RequestPatch = read_json(&path)?;
                store.update_request(&tab_id, patch);
            }
            run(&mut store, &client, &tab_id, None, env, &cli.global).await
        }
        Command::Tabs(command) => {
            match command {
                TabsCommand::List => {}
                TabsCommand::Open { interface_id } => {
                    if store.find_by_interface(interface_id).is_none() {
                        let interface = client(&cli.global)?.get_interface(interface_id).await?;
                        store.open_or_activate(interface_id, TabSeed::from(&interface));
                    } else {
                        store.open_or_activate(interface_id, TabSeed::default());
                    }
                }
                TabsCommand::Close { tab_id } => {
                    if store.close(&TabId::from(tab_id.clone())).is_none() {
                        bail!("no open tab `{tab_id}`");
                    }
                }
                TabsCommand::Clear => store.clear_all(),
            }
            print!("{}", render_tabs(&store, cli.global.format)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(
    store: &mut TabStore,
    client: &DebugClient,
    tab_id: &TabId,
    project_id: Option<i64>,
    environment_id: Option<i64>,
    global: &GlobalArgs,
) -> Result<ExitCode> {
    let ticket = store
        .ticket(tab_id, project_id, environment_id)
        .with_context(|| format!("tab `{tab_id}` is not open"))?;

    let outcome = client.execute(&ticket).await;
    store.record(&ticket, outcome)?;

    let result = store
        .tab(tab_id)
        .and_then(|tab| tab.result.as_ref())
        .with_context(|| format!("tab `{tab_id}` has no result"))?;
    print!("{}", render_result(result, global.format)?);

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn client(global: &GlobalArgs) -> Result<DebugClient> {
    let mut config = ClientConfig::new(&global.api_url)
        .with_timeout(Duration::from_secs(global.timeout))
        .with_retries(global.retries, Duration::from_secs(1));
    if let Some(token) = &global.token {
        config = config.with_token(token);
    }
    Ok(DebugClient::new(config)?)
}

fn open_store(global: &GlobalArgs) -> Result<TabStore> {
    let dir = global.data_dir.clone().unwrap_or_else(default_data_dir);
    let session = SessionConfig::default().with_max_tabs(global.max_tabs);
    let store = match global.store {
        StoreBackend::Json => TabStore::open(JsonFileStorage::new(dir), session),
        StoreBackend::Sqlite => {
            let storage = SqliteStorage::open(dir.join("state.db"))
                .with_context(|| format!("failed to open session database in {}", dir.display()))?;
            TabStore::open(storage, session)
        }
    };
    Ok(store)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}
