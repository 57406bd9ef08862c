//! JianDaoYun Form Bridge CLI
//!
//! Command-line interface for form data operations with loose form
//! identifiers and label-based field names.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use jdy_bridge::{
    BridgeError, CallContext, ClientConfig, DataIds, FormBridge, HttpClient,
    MetadataFailurePolicy, QueryOptions, ResolverOptions, SubmitOptions, UpdateOptions,
    DEFAULT_BASE_URL,
};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jdy-bridge")]
#[command(about = "Submit and query JianDaoYun form data by form or application id")]
#[command(version)]
struct Cli {
    /// API key used as the bearer credential
    #[arg(long, env = "JIANDAOYUN_APP_KEY", global = true, hide_env_values = true)]
    app_key: Option<String>,

    /// Application id for data operations when the form id doesn't name one
    #[arg(long, env = "JIANDAOYUN_APP_ID", global = true)]
    app_id: Option<String>,

    /// API base URL
    #[arg(long, env = "JIANDAOYUN_BASE_URL", global = true, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,

    /// Fail when application or field metadata can't be fetched, instead of
    /// continuing with the identifiers as given
    #[arg(long, global = true)]
    strict_metadata: bool,

    /// Look up 24-character hex identifiers instead of using them as form ids
    #[arg(long, global = true)]
    no_handle_fast_path: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List applications, or the forms of one application
    Apps {
        /// Application whose forms to list
        app: Option<String>,
    },

    /// Show the fields of a form
    Fields {
        /// Form id or application id
        form: String,
    },

    /// Submit one record or a batch of up to 100
    Submit {
        /// Form id or application id
        form: String,

        #[command(flatten)]
        data: DataArgs,

        /// Send field names as given instead of matching them to form fields
        #[arg(long)]
        no_auto_match: bool,

        #[arg(long)]
        transaction_id: Option<String>,

        /// Member id recorded as the submitter
        #[arg(long)]
        data_creator: Option<String>,

        /// Start the form's workflow after creation
        #[arg(long)]
        start_workflow: bool,

        /// Fire data triggers after creation
        #[arg(long)]
        start_trigger: bool,
    },

    /// Fetch one record
    Get {
        /// Form id or application id
        form: String,
        data_id: String,
    },

    /// Query records
    Query {
        /// Form id or application id
        form: String,

        /// Number of records to return (1-100, default 10)
        #[arg(long)]
        limit: Option<u32>,

        /// Return records after this record id
        #[arg(long)]
        data_id: Option<String>,

        /// Field keys to return (all when omitted)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Filter as JSON: {"rel": "and", "cond": [...]}
        #[arg(long, conflicts_with = "filter_file")]
        filter: Option<String>,

        /// File containing the filter JSON
        #[arg(long)]
        filter_file: Option<PathBuf>,
    },

    /// Update one record
    Update {
        /// Form id or application id
        form: String,
        data_id: String,

        #[command(flatten)]
        data: DataArgs,

        /// Send field names as given instead of matching them to form fields
        #[arg(long)]
        no_auto_match: bool,

        #[arg(long)]
        transaction_id: Option<String>,

        /// Fire data triggers after the update
        #[arg(long)]
        start_trigger: bool,
    },

    /// Delete one or more records
    Delete {
        /// Form id or application id
        form: String,

        #[arg(required = true)]
        data_ids: Vec<String>,

        /// Fire data triggers after deletion
        #[arg(long)]
        start_trigger: bool,
    },

    /// Get file upload tokens for a transaction
    UploadToken {
        /// Form id or application id
        form: String,
        transaction_id: String,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct DataArgs {
    /// Record data as JSON: an object, or an array of objects
    #[arg(long)]
    data: Option<String>,

    /// File containing the record JSON
    #[arg(long)]
    data_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run(cli: Cli) -> Result<(), u8> {
    let Some(app_key) = cli.app_key.clone().filter(|k| !k.is_empty()) else {
        eprintln!("Error: no API key given; use --app-key or set JIANDAOYUN_APP_KEY");
        return Err(1);
    };

    let config = ClientConfig::default()
        .base_url(cli.base_url.clone())
        .timeout(Duration::from_secs(cli.timeout_secs));
    let client = HttpClient::new(config).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let policy = if cli.strict_metadata {
        MetadataFailurePolicy::Fail
    } else {
        MetadataFailurePolicy::Passthrough
    };
    let bridge = FormBridge::new(client).with_options(
        ResolverOptions::new()
            .metadata_failure(policy)
            .handle_fast_path(!cli.no_handle_fast_path),
    );

    let mut ctx = CallContext::new(app_key);
    ctx.app_id = cli.app_id.clone();
    let pretty = cli.pretty;

    match cli.command {
        Commands::Apps { app } => {
            let listing = bridge
                .list_apps_and_forms(&ctx.credential, app.as_deref())
                .map_err(report_error)?;
            print_json(&listing, pretty)
        }

        Commands::Fields { form } => {
            let report = bridge.form_fields(&ctx, &form).map_err(report_error)?;
            print_json(&report, pretty)
        }

        Commands::Submit {
            form,
            data,
            no_auto_match,
            transaction_id,
            data_creator,
            start_workflow,
            start_trigger,
        } => {
            let data = read_json(data.data, data.data_file, "data")?;
            let options = SubmitOptions {
                auto_match: !no_auto_match,
                transaction_id,
                data_creator,
                is_start_workflow: start_workflow.then_some(true),
                is_start_trigger: start_trigger.then_some(true),
            };
            let report = bridge
                .submit(&ctx, &form, data, &options)
                .map_err(report_error)?;
            print_json(&report, pretty)
        }

        Commands::Get { form, data_id } => {
            let report = bridge
                .get_record(&ctx, &form, &data_id)
                .map_err(report_error)?;
            print_json(&report, pretty)
        }

        Commands::Query {
            form,
            limit,
            data_id,
            fields,
            filter,
            filter_file,
        } => {
            let filter = if filter.is_some() || filter_file.is_some() {
                Some(read_json(filter, filter_file, "filter")?)
            } else {
                None
            };
            let options = QueryOptions {
                data_id,
                fields,
                filter,
                limit,
            };
            let report = bridge.query(&ctx, &form, &options).map_err(report_error)?;
            print_json(&report, pretty)
        }

        Commands::Update {
            form,
            data_id,
            data,
            no_auto_match,
            transaction_id,
            start_trigger,
        } => {
            let data = read_json(data.data, data.data_file, "data")?;
            let options = UpdateOptions {
                auto_match: !no_auto_match,
                transaction_id,
                is_start_trigger: start_trigger.then_some(true),
            };
            let report = bridge
                .update(&ctx, &form, &data_id, &data, &options)
                .map_err(report_error)?;
            print_json(&report, pretty)
        }

        Commands::Delete {
            form,
            data_ids,
            start_trigger,
        } => {
            let ids = DataIds::from(data_ids);
            let report = bridge
                .delete(&ctx, &form, &ids, start_trigger.then_some(true))
                .map_err(report_error)?;
            print_json(&report, pretty)
        }

        Commands::UploadToken {
            form,
            transaction_id,
        } => {
            let report = bridge
                .upload_token(&ctx, &form, &transaction_id)
                .map_err(report_error)?;
            print_json(&report, pretty)
        }
    }
}

/// Parse JSON given inline or read from a file.
fn read_json(inline: Option<String>, file: Option<PathBuf>, what: &str) -> Result<Value, u8> {
    let text = match (inline, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path).map_err(|e| {
            eprintln!("Error reading {}: {}", path.display(), e);
            3u8
        })?,
        (None, None) => {
            eprintln!("Error: no {what} given");
            return Err(1);
        }
    };

    serde_json::from_str(&text).map_err(|e| {
        eprintln!("Error: {what} is not valid JSON: {}", e);
        1u8
    })
}

fn report_error(err: BridgeError) -> u8 {
    eprintln!("Error: {}", err);
    if let Some(suggestion) = err.suggestion() {
        eprintln!("Suggestion: {}", suggestion);
    }
    err.exit_code() as u8
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), u8> {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    println!("{}", output);
    Ok(())
}
