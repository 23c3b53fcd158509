use clap::Parser;
use open_monitor_client::app::session::{SessionSettings, TableSession};
use open_monitor_client::core::output::{write_page, OutputFormat};
use open_monitor_client::utils::error::{ClientError, ErrorSeverity};
use open_monitor_client::utils::{logger, validation::Validate};
use open_monitor_client::{CliArgs, DashboardClient, ReqwestTransport, Result, TableQuery};
use tokio_util::sync::CancellationToken;

fn exit_with(e: &ClientError) -> ! {
    tracing::error!(
        "❌ open-monitor failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match (e, e.severity()) {
        (ClientError::Aborted, _) => 130,
        (_, ErrorSeverity::Low) => 0,
        (_, ErrorSeverity::Medium) => 2,   // worth retrying later
        (_, ErrorSeverity::High) => 1,     // request or data problem
        (_, ErrorSeverity::Critical) => 3, // local system problem
    };
    std::process::exit(exit_code);
}

async fn run_once(
    client: &DashboardClient<ReqwestTransport>,
    path: &str,
    query: &TableQuery,
    format: OutputFormat,
) -> Result<()> {
    let page = client.fetch_table(path, query).await?;
    tracing::info!(
        "📄 Page {}/{} ({} matching rows)",
        page.page,
        page.total_pages,
        page.total_items
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_page(&page, format, &mut out)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if config.json_logs() {
        logger::init_json_logger(config.log_level());
    } else {
        logger::init_cli_logger(config.log_level(), args.verbose);
    }

    tracing::info!("Starting open-monitor against {}", config.base_url());
    if args.verbose {
        tracing::debug!("Config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        exit_with(&e);
    }
    let format = match args.output_format() {
        Ok(format) => format,
        Err(e) => exit_with(&e),
    };

    let abort = CancellationToken::new();
    {
        let abort = abort.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, aborting");
                abort.cancel();
            }
        });
    }

    let mut transport = ReqwestTransport::new()
        .with_timeout(config.timeout())
        .with_origin(config.base_url())?;
    if let Some(cookie) = &config.client.session_cookie {
        transport = transport.with_session_cookie(cookie.clone());
    }
    if let Some(token) = &config.client.bearer_token {
        transport = transport.with_bearer_token(token.clone());
    }

    let client = DashboardClient::new(config.base_url(), transport, config.retry_policy())
        .with_credentials(config.credentials())
        .with_abort_signal(abort.clone());
    let query = args.table_query(&config);

    let result = if args.interactive {
        let settings = SessionSettings {
            debounce_wait: config.debounce_wait(),
            throttle_limit: config.throttle_limit(),
            filter_key: config.filter_key().to_string(),
            format,
        };
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut session = TableSession::new(&client, args.path.clone(), query, settings)
            .with_abort_signal(abort);
        session.run(stdin, &mut std::io::stdout()).await
    } else {
        run_once(&client, &args.path, &query, format).await
    };

    if let Err(e) = result {
        exit_with(&e);
    }

    Ok(())
}
