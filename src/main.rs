//! Command-line interface for the targeting-reach binary.
//!
//! The CLI validates targeting specifications offline, checks interest
//! keywords against the search endpoint and fetches single or batched reach
//! estimates, printing JSON to stdout.

use std::{
    io,
    path::{Path, PathBuf},
    process,
    sync::Arc,
};

use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use targeting_reach::{
    Error, GraphClient, GraphConfig, HttpGraphClient, InterestResolver, ReachOptions,
    SpecValidator, batch_reaches, fetch_reach, load_config, load_document,
};
use tracing_subscriber::EnvFilter;

/// Command line interface for audience reach estimation.
#[derive(Debug, Parser,)]
#[command(name = "targeting-reach", version, about = "Validate targeting specs and estimate their reach")]
struct Cli
{
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand,)]
/// Supported commands exposed by the CLI.
enum Command
{
    /// Check a targeting spec without contacting the API.
    Validate(ValidateArgs,),
    /// Report whether an interest keyword is accepted by the platform.
    Interest(InterestArgs,),
    /// Fetch the reach estimate of one targeting spec.
    Reach(ReachArgs,),
    /// Fetch reach estimates for a list of targeting specs in batches.
    Batch(BatchArgs,),
}

#[derive(Debug, Args,)]
struct ValidateArgs
{
    /// Path to the YAML or JSON targeting spec.
    #[arg(long = "spec", value_name = "PATH")]
    spec: PathBuf,
}

/// Options shared by every command that talks to the API.
#[derive(Debug, Args,)]
struct ConnectionArgs
{
    /// Path to the YAML configuration file describing the API endpoint.
    #[arg(long = "config", value_name = "PATH")]
    config: PathBuf,

    /// Access token overriding the one from the configuration file.
    #[arg(long = "access-token", env = "GRAPH_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String,>,
}

#[derive(Debug, Args,)]
struct InterestArgs
{
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Keyword to look up.
    #[arg(value_name = "TERM")]
    term: String,
}

#[derive(Debug, Args,)]
struct ReachArgs
{
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Path to the YAML or JSON targeting spec.
    #[arg(long = "spec", value_name = "PATH")]
    spec: PathBuf,

    /// Ad account overriding the one from the configuration file.
    #[arg(long = "account", value_name = "ID")]
    account: Option<String,>,
}

#[derive(Debug, Args,)]
struct BatchArgs
{
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Path to a YAML or JSON list of targeting specs.
    #[arg(long = "requests", value_name = "PATH")]
    requests: PathBuf,

    /// Ad account overriding the one from the configuration file.
    #[arg(long = "account", value_name = "ID")]
    account: Option<String,>,

    /// Output formatted JSON for easier inspection.
    #[arg(long = "pretty", action = ArgAction::SetTrue)]
    pretty: bool,
}

/// Outcome of the `validate` and `interest` commands.
#[derive(Debug, Serialize,)]
struct Verdict<'a,>
{
    #[serde(skip_serializing_if = "Option::is_none")]
    term:  Option<&'a str,>,
    valid: bool,
}

/// Entry point that reports errors and sets the appropriate exit status.
#[tokio::main]
async fn main()
{
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn",),),)
        .with_writer(io::stderr,)
        .init();

    if let Err(error,) = run(Cli::parse(),).await {
        eprintln!("{}", error.to_display_string());
        process::exit(1,);
    }
}

/// Executes the CLI using parsed arguments.
///
/// # Errors
///
/// Propagates configuration, validation and API errors.
async fn run(cli: Cli,) -> Result<(), Error,>
{
    match cli.command {
        Command::Validate(args,) => run_validate(&args.spec,),
        Command::Interest(args,) => run_interest(args,).await,
        Command::Reach(args,) => run_reach(args,).await,
        Command::Batch(args,) => run_batch(args,).await,
    }
}

fn run_validate(path: &Path,) -> Result<(), Error,>
{
    let options: ReachOptions = load_document(path,)?;
    SpecValidator::default().validate(&options.fields(),)?;

    write_json(
        &mut io::stdout().lock(),
        &Verdict {
            term: None, valid: true,
        },
        false,
    )
}

async fn run_interest(args: InterestArgs,) -> Result<(), Error,>
{
    let (_, graph,) = connect(&args.connection,)?;
    let valid = InterestResolver::new(graph,).validate_interest(&args.term,).await?;

    write_json(
        &mut io::stdout().lock(),
        &Verdict {
            term: Some(args.term.as_str(),), valid,
        },
        false,
    )
}

async fn run_reach(args: ReachArgs,) -> Result<(), Error,>
{
    let (config, graph,) = connect(&args.connection,)?;
    let account = config.resolve_ad_account(args.account.as_deref(),)?;
    let options: ReachOptions = load_document(&args.spec,)?;

    let estimate = fetch_reach(graph, &account, options,).await?;
    write_json(&mut io::stdout().lock(), &estimate, false,)
}

async fn run_batch(args: BatchArgs,) -> Result<(), Error,>
{
    let (config, graph,) = connect(&args.connection,)?;
    let account = config.resolve_ad_account(args.account.as_deref(),)?;
    let requests: Vec<ReachOptions,> = load_document(&args.requests,)?;

    let items = batch_reaches(graph, &account, &requests,).await;
    write_json(&mut io::stdout().lock(), &items, args.pretty,)
}

/// Loads the configuration and builds an HTTP client from it.
fn connect(args: &ConnectionArgs,) -> Result<(GraphConfig, Arc<dyn GraphClient,>,), Error,>
{
    let config = load_config(&args.config,)?;
    let token = config.resolve_access_token(args.access_token.as_deref(),)?;
    let client = HttpGraphClient::new(&config, &token,)?;
    Ok((config, Arc::new(client,),),)
}

fn write_json<W, T,>(writer: &mut W, value: &T, pretty: bool,) -> Result<(), Error,>
where
    W: io::Write,
    T: Serialize + ?Sized,
{
    if pretty {
        serde_json::to_writer_pretty(writer, value,)?;
    } else {
        serde_json::to_writer(writer, value,)?;
    }

    Ok((),)
}

#[cfg(test)]
mod tests
{
    use std::{fs, io::Cursor, path::Path};

    use clap::Parser;
    use tempfile::tempdir;

    use super::{Cli, Command, Verdict, connect, run_validate, write_json};

    #[test]
    fn batch_subcommand_parses_all_flags()
    {
        let cli = Cli::try_parse_from([
            env!("CARGO_PKG_NAME"),
            "batch",
            "--config",
            "graph.yaml",
            "--requests",
            "requests.yaml",
            "--account",
            "123",
            "--access-token",
            "secret",
            "--pretty",
        ],)
        .expect("failed to parse CLI",);

        let args = match cli.command {
            Command::Batch(args,) => args,
            other => panic!("unexpected command variant: {other:?}"),
        };
        assert_eq!(args.connection.config, Path::new("graph.yaml"));
        assert_eq!(args.requests, Path::new("requests.yaml"));
        assert_eq!(args.account.as_deref(), Some("123"));
        assert_eq!(args.connection.access_token.as_deref(), Some("secret"));
        assert!(args.pretty);
    }

    #[test]
    fn interest_subcommand_takes_positional_term()
    {
        let cli = Cli::try_parse_from([
            env!("CARGO_PKG_NAME"),
            "interest",
            "--config",
            "graph.yaml",
            "--access-token",
            "secret",
            "Eminem",
        ],)
        .expect("failed to parse CLI",);

        match cli.command {
            Command::Interest(args,) => assert_eq!(args.term, "Eminem"),
            other => panic!("unexpected command variant: {other:?}"),
        }
    }

    #[test]
    fn reach_requires_spec_path()
    {
        let result =
            Cli::try_parse_from([env!("CARGO_PKG_NAME"), "reach", "--config", "graph.yaml",],);
        assert!(result.is_err());
    }

    #[test]
    fn validate_accepts_complete_spec()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let path = temp.path().join("spec.yaml",);
        fs::write(
            &path,
            "geo_locations:\n  countries: [US]\ninterests: [Eminem]\ngender: male\n",
        )
        .expect("failed to write spec",);

        run_validate(&path,).expect("spec should be valid",);
    }

    #[test]
    fn validate_reports_missing_audience()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let path = temp.path().join("spec.yaml",);
        fs::write(&path, "geo_locations:\n  countries: [US]\n",).expect("failed to write spec",);

        let error = run_validate(&path,).expect_err("expected validation error",);
        match error {
            targeting_reach::Error::Validation {
                message,
            } => assert_eq!(message, targeting_reach::AUDIENCE_MESSAGE),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn validate_reports_unknown_gender_before_audience()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let path = temp.path().join("spec.yaml",);
        fs::write(&path, "gender: robot\n",).expect("failed to write spec",);

        let error = run_validate(&path,).expect_err("expected validation error",);
        assert_eq!(error.to_string(), targeting_reach::GENDER_MESSAGE);
    }

    #[test]
    fn connect_requires_access_token()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let path = temp.path().join("graph.yaml",);
        fs::write(&path, "ad_account: \"123\"\n",).expect("failed to write config",);

        let cli = Cli::try_parse_from([
            env!("CARGO_PKG_NAME"),
            "interest",
            "--config",
            path.to_str().expect("utf8",),
            "Eminem",
        ],)
        .expect("failed to parse CLI",);
        let args = match cli.command {
            Command::Interest(args,) => args,
            other => panic!("unexpected command variant: {other:?}"),
        };

        if args.connection.access_token.is_some() {
            // GRAPH_ACCESS_TOKEN is set in the environment running the tests.
            return;
        }
        let error = connect(&args.connection,).err().expect("expected missing token",);
        assert!(error.to_string().starts_with("missing access token"));
    }

    #[test]
    fn write_json_honours_pretty_flag()
    {
        let verdict = Verdict {
            term: Some("foo",), valid: false,
        };

        let mut compact = Cursor::new(Vec::new(),);
        write_json(&mut compact, &verdict, false,).expect("failed to serialize",);
        let output = String::from_utf8(compact.into_inner(),).expect("invalid UTF-8",);
        assert_eq!(output, "{\"term\":\"foo\",\"valid\":false}");

        let mut pretty = Cursor::new(Vec::new(),);
        write_json(&mut pretty, &Vec::<u8,>::new(), true,).expect("failed to serialize",);
        let output = String::from_utf8(pretty.into_inner(),).expect("invalid UTF-8",);
        assert_eq!(output, "[]");
    }
}
