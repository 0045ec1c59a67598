//! Command-line interface built on clap.
//!
//! One subcommand per resource kind, each with its own lifecycle actions,
//! plus `endpoint` to inspect where a DWSU is served from.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Drive Relyt data-warehouse resources to their desired state.
#[derive(Debug, Parser)]
#[command(name = "relyt", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: ./relyt.toml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Local state file recording created resource ids.
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Log requests and poll iterations.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Data-warehouse service units.
    Dwsu {
        #[command(subcommand)]
        action: DwsuAction,
    },

    /// Data processing services inside a DWSU.
    Dps {
        #[command(subcommand)]
        action: DpsAction,
    },

    /// Database accounts inside a DWSU.
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// Private link services of a DWSU.
    PrivateLink {
        #[command(subcommand)]
        action: PrivateLinkAction,
    },

    /// Cross-account integration settings of a DWSU.
    Integration {
        #[command(subcommand)]
        action: IntegrationAction,
    },

    /// Resolve the regional API endpoint serving a DWSU.
    Endpoint { dwsu_id: String },
}

#[derive(Debug, Subcommand)]
pub enum DwsuAction {
    Create(DwsuCreateArgs),
    Get {
        id: String,
    },
    /// Resize the default DPS.
    Update {
        id: String,
        #[arg(long)]
        size: String,
    },
    Delete {
        id: String,
    },
    List,
}

#[derive(Debug, Args)]
pub struct DwsuCreateArgs {
    pub domain: String,
    #[arg(long)]
    pub alias: Option<String>,
    #[arg(long)]
    pub cloud: String,
    #[arg(long)]
    pub region: String,
    #[arg(long)]
    pub edition: String,
    #[arg(long)]
    pub variant: Option<String>,
    /// Engine of the default DPS.
    #[arg(long)]
    pub engine: String,
    /// Size of the default DPS.
    #[arg(long)]
    pub size: String,
}

#[derive(Debug, Subcommand)]
pub enum DpsAction {
    Create {
        #[arg(long)]
        dwsu: String,
        name: String,
        #[arg(long)]
        engine: String,
        #[arg(long)]
        size: String,
        #[arg(long)]
        description: Option<String>,
    },
    Get {
        #[arg(long)]
        dwsu: String,
        id: String,
    },
    Update {
        #[arg(long)]
        dwsu: String,
        id: String,
        #[arg(long)]
        size: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        #[arg(long)]
        dwsu: String,
        id: String,
    },
    List {
        #[arg(long)]
        dwsu: String,
    },
}

#[derive(Debug, Args)]
pub struct AccountArgs {
    #[arg(long)]
    pub dwsu: String,
    pub name: String,
    #[arg(long)]
    pub password: Option<String>,
    /// IAM role the backend assumes to write async query results.
    #[arg(long, requires = "async_result_prefix")]
    pub async_result_arn: Option<String>,
    /// S3 prefix receiving async query results.
    #[arg(long, requires = "async_result_arn")]
    pub async_result_prefix: Option<String>,
    #[arg(long)]
    pub lake_formation_role: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum AccountAction {
    Create(AccountArgs),
    Get {
        #[arg(long)]
        dwsu: String,
        name: String,
    },
    Update(AccountArgs),
    Delete {
        #[arg(long)]
        dwsu: String,
        name: String,
    },
    /// Show the boto3 access keys of an account.
    AccessKeys {
        #[arg(long)]
        dwsu: String,
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum PrivateLinkAction {
    Create {
        #[arg(long)]
        dwsu: String,
        service_type: String,
        /// Allowed principal; repeat for several.
        #[arg(long = "principal")]
        principals: Vec<String>,
    },
    Get {
        #[arg(long)]
        dwsu: String,
        service_type: String,
    },
    Update {
        #[arg(long)]
        dwsu: String,
        service_type: String,
        #[arg(long = "principal")]
        principals: Vec<String>,
    },
    Delete {
        #[arg(long)]
        dwsu: String,
        service_type: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum IntegrationAction {
    Get {
        dwsu_id: String,
    },
    /// Set the external id used when assuming roles in your account.
    Set {
        dwsu_id: String,
        #[arg(long)]
        external_id: String,
    },
}
