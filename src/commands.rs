//! Maps parsed CLI commands onto reconciler calls and renders the outcome.

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;

use crate::api::{Dps, Dwsu, IdRef, PrivateLinkService, Region, RelytApi, RelytClient, Spec};
use crate::cli::{
    AccountAction, AccountArgs, Cli, Command, DpsAction, DwsuAction, DwsuCreateArgs,
    IntegrationAction, PrivateLinkAction,
};
use crate::config::RelytConfig;
use crate::convergence::{CancellationToken, PartialListing};
use crate::error::{RelytError, Result};
use crate::reconcile::{AccountRequest, Applied, Reconciler};
use crate::state::{FileStateStore, StateStore};
use crate::ui::Progress;

/// Build a reconciler from the config file, environment and CLI flags.
pub fn connect(
    cli: &Cli,
    cancel: CancellationToken,
) -> anyhow::Result<Reconciler<RelytClient, FileStateStore>> {
    let config = RelytConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let client_settings = config.client_settings().context("configuring the API client")?;
    let client = RelytClient::new(client_settings).context("building the HTTP client")?;
    let state_path = cli.state.clone().unwrap_or_else(|| config.state_file.clone());
    let store = FileStateStore::new(state_path);
    Ok(Reconciler::new(client, store, config.reconcile_settings()?, cancel))
}

/// What a command produced: a summary line, the JSON body and any
/// secondary failures. `error` is set when only part of the body could be
/// gathered.
struct Report {
    summary: String,
    body: Value,
    failures: Vec<String>,
    error: Option<RelytError>,
}

impl Report {
    fn new(summary: impl Into<String>, body: &impl Serialize) -> Result<Self> {
        Ok(Self {
            summary: summary.into(),
            body: serde_json::to_value(body)?,
            failures: Vec::new(),
            error: None,
        })
    }

    fn applied<T: Serialize>(summary: impl Into<String>, applied: Applied<T>) -> Result<Self> {
        let mut report = Self::new(summary, &applied.resource)?;
        report.failures = applied.secondary_failures;
        Ok(report)
    }

    fn listing<T: Serialize>(
        kind: &str,
        listing: std::result::Result<Vec<T>, PartialListing<T, RelytError>>,
    ) -> Result<Self> {
        match listing {
            Ok(records) => Self::new(format!("{} {kind}", records.len()), &records),
            Err(partial) => {
                let mut report = Self::new(
                    format!("{} {kind} before the listing failed", partial.records.len()),
                    &partial.records,
                )?;
                report.error = Some(partial.error);
                Ok(report)
            }
        }
    }
}

/// Run one command to completion, showing a spinner while it waits.
pub async fn execute<C: RelytApi, S: StateStore>(
    reconciler: &Reconciler<C, S>,
    command: Command,
) -> Result<()> {
    let progress = Progress::start(&describe(&command));
    match dispatch(reconciler, command).await {
        Ok(report) => {
            progress.succeed(&report.summary, &report.body);
            progress.partial(&report.failures);
            match report.error {
                Some(err) => {
                    progress.fail(&err);
                    Err(err)
                }
                None => Ok(()),
            }
        }
        Err(err) => {
            progress.fail(&err);
            Err(err)
        }
    }
}

fn describe(command: &Command) -> String {
    match command {
        Command::Dwsu { .. } => "dwsu".to_string(),
        Command::Dps { .. } => "dps".to_string(),
        Command::Account { .. } => "account".to_string(),
        Command::PrivateLink { .. } => "private link".to_string(),
        Command::Integration { .. } => "integration".to_string(),
        Command::Endpoint { dwsu_id } => format!("resolving endpoint of {dwsu_id}"),
    }
}

async fn dispatch<C: RelytApi, S: StateStore>(
    rec: &Reconciler<C, S>,
    command: Command,
) -> Result<Report> {
    match command {
        Command::Dwsu { action } => dwsu(rec, action).await,
        Command::Dps { action } => dps(rec, action).await,
        Command::Account { action } => account(rec, action).await,
        Command::PrivateLink { action } => private_link(rec, action).await,
        Command::Integration { action } => integration(rec, action).await,
        Command::Endpoint { dwsu_id } => {
            let endpoint = rec.resolve_endpoint(&dwsu_id).await?;
            Report::new(format!("{dwsu_id} is served by {}", endpoint.uri), &endpoint)
        }
    }
}

fn absent(kind: &'static str, id: String) -> RelytError {
    RelytError::NotFound { kind, id }
}

fn size_spec(size: String) -> Spec {
    Spec { id: None, name: size }
}

fn dwsu_request(args: DwsuCreateArgs) -> Dwsu {
    Dwsu {
        domain: args.domain,
        alias: args.alias,
        region: Some(Region {
            id: args.region,
            name: None,
            cloud: Some(crate::api::Cloud {
                id: args.cloud,
                name: None,
            }),
        }),
        edition: Some(IdRef::new(args.edition)),
        variant: args.variant.map(IdRef::new),
        default_dps: Some(Dps {
            engine: args.engine,
            spec: Some(size_spec(args.size)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

async fn dwsu<C: RelytApi, S: StateStore>(
    rec: &Reconciler<C, S>,
    action: DwsuAction,
) -> Result<Report> {
    match action {
        DwsuAction::Create(args) => {
            let applied = rec.create_dwsu(&dwsu_request(args)).await?;
            Report::applied("dwsu is READY", applied)
        }
        DwsuAction::Get { id } => {
            let dwsu = rec.read_dwsu(&id).await?.ok_or_else(|| absent("dwsu", id))?;
            Report::new(format!("dwsu is {}", status_text(dwsu.status.as_ref())), &dwsu)
        }
        DwsuAction::Update { id, size } => {
            let desired = Dwsu {
                default_dps: Some(Dps {
                    spec: Some(size_spec(size)),
                    ..Default::default()
                }),
                ..Default::default()
            };
            let dwsu = rec.update_dwsu(&id, &desired).await?;
            Report::new("dwsu updated", &dwsu)
        }
        DwsuAction::Delete { id } => {
            let outcome = rec.delete_dwsu(&id).await?;
            Report::new(format!("dwsu {id} removed"), &outcome)
        }
        DwsuAction::List => Report::listing("dwsu", rec.list_dwsu().await),
    }
}

async fn dps<C: RelytApi, S: StateStore>(
    rec: &Reconciler<C, S>,
    action: DpsAction,
) -> Result<Report> {
    match action {
        DpsAction::Create {
            dwsu,
            name,
            engine,
            size,
            description,
        } => {
            let desired = Dps {
                name,
                engine,
                description,
                spec: Some(size_spec(size)),
                ..Default::default()
            };
            let created = rec.create_dps(&dwsu, &desired).await?;
            Report::new("dps is READY", &created)
        }
        DpsAction::Get { dwsu, id } => {
            let found = rec.read_dps(&dwsu, &id).await?.ok_or_else(|| absent("dps", id))?;
            Report::new(format!("dps is {}", status_text(found.status.as_ref())), &found)
        }
        DpsAction::Update {
            dwsu,
            id,
            size,
            description,
        } => {
            let desired = Dps {
                description,
                spec: size.map(size_spec),
                ..Default::default()
            };
            let updated = rec.update_dps(&dwsu, &id, &desired).await?;
            Report::new("dps updated", &updated)
        }
        DpsAction::Delete { dwsu, id } => {
            let outcome = rec.delete_dps(&dwsu, &id).await?;
            Report::new(format!("dps {id} removed"), &outcome)
        }
        DpsAction::List { dwsu } => Report::listing("dps", rec.list_dps(&dwsu).await),
    }
}

fn account_request(args: &AccountArgs) -> AccountRequest {
    AccountRequest {
        name: args.name.clone(),
        password: args.password.clone(),
        async_result_arn: args.async_result_arn.clone(),
        async_result_prefix: args.async_result_prefix.clone(),
        lake_formation_role: args.lake_formation_role.clone(),
    }
}

async fn account<C: RelytApi, S: StateStore>(
    rec: &Reconciler<C, S>,
    action: AccountAction,
) -> Result<Report> {
    match action {
        AccountAction::Create(args) => {
            let applied = rec.create_account(&args.dwsu, &account_request(&args)).await?;
            Report::applied("account created", applied)
        }
        AccountAction::Get { dwsu, name } => {
            let state = rec
                .read_account(&dwsu, &name)
                .await?
                .ok_or_else(|| absent("account", name))?;
            Report::new("account found", &state)
        }
        AccountAction::Update(args) => {
            let applied = rec
                .update_account(&args.dwsu, &args.name, &account_request(&args))
                .await?;
            Report::applied("account updated", applied)
        }
        AccountAction::Delete { dwsu, name } => {
            let outcome = rec.delete_account(&dwsu, &name).await?;
            Report::new(format!("account {name} removed"), &outcome)
        }
        AccountAction::AccessKeys { dwsu, name } => {
            let keys = rec.boto3_access_info(&dwsu, &name).await?;
            Report::new(format!("{} access keys for {name}", keys.len()), &keys)
        }
    }
}

async fn integration<C: RelytApi, S: StateStore>(
    rec: &Reconciler<C, S>,
    action: IntegrationAction,
) -> Result<Report> {
    match action {
        IntegrationAction::Get { dwsu_id } => {
            let info = rec
                .read_integration(&dwsu_id)
                .await?
                .ok_or_else(|| absent("integration", dwsu_id))?;
            Report::new("integration found", &info)
        }
        IntegrationAction::Set {
            dwsu_id,
            external_id,
        } => {
            let info = rec.apply_integration(&dwsu_id, &external_id).await?;
            Report::new("integration updated", &info)
        }
    }
}

async fn private_link<C: RelytApi, S: StateStore>(
    rec: &Reconciler<C, S>,
    action: PrivateLinkAction,
) -> Result<Report> {
    let link = |service_type: &str, principals: Vec<String>| PrivateLinkService {
        service_type: Some(service_type.to_string()),
        allowed_principals: Some(principals),
        ..Default::default()
    };
    match action {
        PrivateLinkAction::Create {
            dwsu,
            service_type,
            principals,
        } => {
            let created = rec
                .create_private_link(&dwsu, &link(&service_type, principals))
                .await?;
            Report::new("private link is READY", &created)
        }
        PrivateLinkAction::Get { dwsu, service_type } => {
            let found = rec
                .read_private_link(&dwsu, &service_type)
                .await?
                .ok_or_else(|| absent("private link", service_type))?;
            Report::new(format!("private link is {}", status_text(found.status.as_ref())), &found)
        }
        PrivateLinkAction::Update {
            dwsu,
            service_type,
            principals,
        } => {
            let updated = rec
                .update_private_link(&dwsu, &service_type, &link(&service_type, principals))
                .await?;
            Report::new("private link updated", &updated)
        }
        PrivateLinkAction::Delete { dwsu, service_type } => {
            let outcome = rec.delete_private_link(&dwsu, &service_type).await?;
            Report::new(format!("private link {service_type} removed"), &outcome)
        }
    }
}

fn status_text(status: Option<&crate::api::Status>) -> &str {
    status.map_or("in an unreported state", |s| s.as_str())
}
