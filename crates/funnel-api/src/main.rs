//! `funnel-server`: serve the API, run a vehicle lookup, or print a mock PIX payment

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use funnel_api::{routes, AppContext, ServerConfig};
use funnel_client::{standard_payment_service, vehicle_lookup};
use funnel_core::{LookupError, MockPixGenerator, PaymentRequest};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("funnel-server")
        .version(funnel_api::VERSION)
        .about("Delivery-partner registration funnel API")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML config file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the API server")
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Listen address, overrides config and FUNNEL_BIND"),
                )
                .arg(
                    Arg::new("dev")
                        .long("dev")
                        .action(ArgAction::SetTrue)
                        .help("Serve placeholder vehicle data when every backend fails"),
                ),
        )
        .subcommand(
            Command::new("lookup")
                .about("Run the vehicle backend chain once and print JSON")
                .arg(Arg::new("plate").required(true).help("License plate, any formatting")),
        )
        .subcommand(
            Command::new("pix")
                .about("Print a mock PIX payment as JSON")
                .arg(Arg::new("name").long("name").required(true).help("Payer name"))
                .arg(Arg::new("cpf").long("cpf").required(true).help("Payer CPF"))
                .arg(
                    Arg::new("amount")
                        .long("amount")
                        .value_parser(value_parser!(f64))
                        .help("Amount in BRL, defaults to the configured kit amount"),
                )
                .arg(Arg::new("email").long("email").help("Payer email"))
                .arg(Arg::new("phone").long("phone").help("Payer phone")),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config = ServerConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("loading configuration")?;

    match matches.subcommand() {
        Some(("serve", args)) => serve(config, args).await,
        Some(("lookup", args)) => lookup(&config, args).await,
        Some(("pix", args)) => pix(&config, args).await,
        _ => Ok(()),
    }
}

async fn serve(mut config: ServerConfig, args: &ArgMatches) -> anyhow::Result<()> {
    if let Some(bind) = args.get_one::<SocketAddr>("bind") {
        config = config.with_bind(*bind);
    }
    if args.get_flag("dev") {
        config = config.with_dev(true);
    }

    let bind = config.bind;
    let ctx = AppContext::from_config(config).context("building services")?;
    let (addr, server) = warp::serve(routes(ctx))
        .try_bind_with_graceful_shutdown(bind, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for shutdown signal: {}", e);
            }
        })
        .with_context(|| format!("binding {bind}"))?;

    info!("Listening on http://{}", addr);
    server.await;
    info!("Shut down");
    Ok(())
}

async fn lookup(config: &ServerConfig, args: &ArgMatches) -> anyhow::Result<()> {
    let plate = args
        .get_one::<String>("plate")
        .context("plate is required")?;
    let lookup = vehicle_lookup(&config.upstream_backends(), config.lookup_config(), &config.http)?;

    match lookup.lookup(plate).await {
        Ok(resolved) => {
            println!("{}", serde_json::to_string_pretty(&resolved)?);
            Ok(())
        }
        Err(LookupError::Unavailable { attempts }) => {
            for attempt in &attempts {
                eprintln!("  {attempt}");
            }
            anyhow::bail!("{}", LookupError::Unavailable { attempts }.user_message())
        }
        Err(e) => Err(anyhow::anyhow!("{}", e.user_message())),
    }
}

async fn pix(config: &ServerConfig, args: &ArgMatches) -> anyhow::Result<()> {
    let name = args.get_one::<String>("name").context("name is required")?;
    let cpf = args.get_one::<String>("cpf").context("cpf is required")?;

    let mut request = PaymentRequest::new(name.as_str(), cpf.as_str())
        .with_amount(args.get_one::<f64>("amount").copied().unwrap_or(config.payment_amount));
    if let Some(email) = args.get_one::<String>("email") {
        request = request.with_email(email.as_str());
    }
    if let Some(phone) = args.get_one::<String>("phone") {
        request = request.with_phone(phone.as_str());
    }

    let generator = Arc::new(MockPixGenerator::new(config.pix_config()));
    let service = standard_payment_service(config.payment_secret.clone(), None, generator, &config.http)?;
    let payment = service.create(&request).await?;
    println!("{}", serde_json::to_string_pretty(&payment)?);
    Ok(())
}
