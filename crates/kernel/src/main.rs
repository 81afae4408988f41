//! Tessera CMS server and operator commands.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use axum::http::{HeaderName, HeaderValue, Method, header};
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tessera_kernel::config::Config;
use tessera_kernel::db;
use tessera_kernel::deploy::{DeployOptions, DeployService, DeployTarget, SystemCommandRunner};
use tessera_kernel::metrics::Metrics;
use tessera_kernel::models::{CreateTenant, Tenant};
use tessera_kernel::routes;
use tessera_kernel::services::tenant_clone::{CloneOptions, clone_tenant_content};
use tessera_kernel::session;
use tessera_kernel::state::AppState;
use tessera_kernel::tenant::{TENANT_DOMAIN_HEADER, TENANT_ID_HEADER};

#[derive(Parser, Debug)]
#[command(author, version, about = "Tessera multi-tenant CMS", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (the default).
    Serve,

    /// Manage tenants.
    #[command(subcommand)]
    Tenant(TenantCommand),

    /// Write and activate the NGINX config of a tenant.
    Deploy {
        /// Tenant id.
        #[arg(long)]
        tenant: i64,

        /// Domain to serve; defaults to the tenant's domain.
        #[arg(long)]
        domain: Option<String>,

        /// Request a Let's Encrypt certificate after activation.
        #[arg(long)]
        issue_certificate: bool,

        /// Certbot contact address.
        #[arg(long)]
        email: Option<String>,

        /// Print the rendered config without writing it.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TenantCommand {
    /// Create a tenant, optionally cloning the master tenant's content.
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        domain: Option<String>,

        /// Clone content from the master tenant.
        #[arg(long)]
        clone: bool,
    },

    /// Clone content into an existing tenant.
    Clone {
        /// Tenant receiving the content.
        #[arg(long)]
        target: i64,

        /// Tenant to copy from; defaults to the master tenant.
        #[arg(long)]
        source: Option<i64>,

        /// Keep rows that already exist in the target.
        #[arg(long)]
        skip_existing: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Tenant(command) => tenant(&config, command).await,
        Command::Deploy {
            tenant,
            domain,
            issue_certificate,
            email,
            dry_run,
        } => {
            let options = DeployOptions {
                issue_certificate,
                email,
                dry_run,
            };
            deploy(&config, tenant, domain, options).await
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!(port = config.port, "Starting Tessera CMS");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    info!("Database and Redis connections established");

    let session_layer =
        session::create_session_layer(&config.redis_url, session::same_site(&config.cookie_same_site))
            .await
            .context("failed to create session layer")?;

    // Layers (last added = first executed): TraceLayer → CORS → session → routes
    let app = routes::router(state)
        .layer(session_layer)
        .layer(build_cors_layer(&config))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn tenant(config: &Config, command: TenantCommand) -> Result<()> {
    let pool = db::create_pool(config).await?;
    db::run_migrations(&pool).await?;

    match command {
        TenantCommand::Create {
            name,
            domain,
            clone,
        } => {
            let tenant = Tenant::create(
                &pool,
                CreateTenant {
                    name,
                    slug: None,
                    domain,
                    is_active: Some(true),
                    settings: None,
                },
            )
            .await?;
            info!(tenant_id = tenant.id, slug = %tenant.slug, "tenant created");
            println!("{}", serde_json::to_string_pretty(&tenant)?);

            if clone {
                let options = CloneOptions {
                    source_tenant_id: config.master_tenant_id,
                    skip_existing: false,
                };
                let report = clone_tenant_content(&pool, &tenant, options).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        TenantCommand::Clone {
            target,
            source,
            skip_existing,
        } => {
            let Some(tenant) = Tenant::find_by_id(&pool, target).await? else {
                bail!("tenant {target} not found");
            };
            let options = CloneOptions {
                source_tenant_id: source.unwrap_or(config.master_tenant_id),
                skip_existing,
            };
            let report = clone_tenant_content(&pool, &tenant, options).await?;
            info!(
                tenant_id = tenant.id,
                created = report.total_created(),
                "tenant content cloned"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn deploy(
    config: &Config,
    tenant_id: i64,
    domain: Option<String>,
    options: DeployOptions,
) -> Result<()> {
    let pool = db::create_pool(config).await?;

    let Some(tenant) = Tenant::find_by_id(&pool, tenant_id).await? else {
        bail!("tenant {tenant_id} not found");
    };
    let Some(domain) = domain.or(tenant.domain.clone()) else {
        bail!("tenant {tenant_id} has no domain; pass --domain");
    };

    let service = DeployService::new(
        config.deploy.clone(),
        Arc::new(SystemCommandRunner),
        Arc::new(Metrics::new()),
    )?;
    let target = DeployTarget {
        tenant_id: tenant.id,
        tenant_slug: tenant.slug.clone(),
        domain,
    };

    let outcome = service.deploy(&target, &options).await;
    if let Some(rendered) = &outcome.config {
        println!("{rendered}");
    }
    if !outcome.success {
        bail!("deploy failed: {}", outcome.message);
    }
    info!(tenant_id, message = %outcome.message, "deploy finished");

    Ok(())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [
        header::CONTENT_TYPE,
        HeaderName::from_static(TENANT_ID_HEADER),
        HeaderName::from_static(TENANT_DOMAIN_HEADER),
    ];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(headers)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        // Credentialed CORS requires an explicit header list.
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
