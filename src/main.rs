use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{Result, eyre::Context};
use kubegate::{
    FileCredentialProvider, GracefulShutdown, MtlsConnector,
    config::{ServerConfig, ServerConfigValidator, loader::load_config},
    tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Start the gateway server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve(&config).await,
        None => serve(&args.config).await,
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let config: ServerConfig = load_config(config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    ServerConfigValidator::validate(&config).context("Invalid configuration")?;

    tracing_setup::init_tracing(&config.logging).context("Failed to initialize tracing")?;
    tracing::info!(config = %config_path, "Configuration loaded");

    let credentials = Arc::new(
        FileCredentialProvider::new(&config.auth).context("Failed to build credential provider")?,
    );
    let connector = Arc::new(
        MtlsConnector::from_config(&config.backend).context("Failed to build backend connector")?,
    );

    let graceful_shutdown = Arc::new(GracefulShutdown::new());
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        signal_handler_shutdown.run_signal_handler().await;
    });

    let app = kubegate::build_router(
        &config,
        credentials,
        connector,
        graceful_shutdown.relay_token(),
    )?;

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        backend_port = config.backend.port,
        tenants = config.auth.tenants.len(),
        retry_attempts = config.retry.max_attempts,
        "kubegate starting"
    );

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("Server error")?;
        },
        shutdown_reason = graceful_shutdown.wait_for_shutdown_signal() => {
            tracing::info!("Shutdown signal received: {:?}", shutdown_reason);
            tracing::info!("Graceful shutdown completed");
        }
    }

    Ok(())
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match ServerConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Backend Port: {}", config.backend.port);
            println!("   • Tenants: {}", config.auth.tenants.len());
            println!("   • Retry Attempts: {}", config.retry.max_attempts);
            println!("   • Built-in Filters: {}", config.filters.builtin_rules);
            println!("   • Extra Filter Rules: {}", config.filters.rules.len());
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Verify listen address format (e.g., '0.0.0.0:8443')");
            println!("   • Check that tenant certificate and key paths exist");
            println!("   • Keep '{{space_id}}' in the namespace template");
            println!("   • Use valid durations (e.g., '500ms', '10s')");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# kubegate configuration

listen_addr: "0.0.0.0:8443"

backend:
  port: 6443
  # Extra trust anchors for tenant API servers
  # ca_cert_path: "/etc/kubegate/backend-ca.pem"
  connect_timeout: "10s"

retry:
  max_attempts: 1
  backoff: "0s"

annotations:
  annotation_key: "containers-annotations.alpha.kubernetes.io"
  tenant_label: "kubegate.io/tenant"
  methods: ["POST"]

upgrade:
  # Refuse upgrades to anything other than "tcp" with 501
  reject_non_tcp: false

auth:
  token_header: "authorization"
  namespace_template: "s{space_id}-default"
  tenants:
    - token: "change-me"
      node: "https://kube-shard-1.internal:443"
      space_id: "1"
      cert_path: "/etc/kubegate/tenants/1/client.crt"
      key_path: "/etc/kubegate/tenants/1/client.key"

filters:
  builtin_rules: true
  placeholder_host: "host"
  placeholder_ip: "1.1.1.1"
  rules: []
  # - kind: "Node"
  #   selector:
  #     path: ["status", "addresses"]
  #     predicate: { test: "exists" }
  #   field: "addresses"
  #   action: { type: "remove" }

logging:
  level: "info"
  json: true
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'kubegate serve --config {config_path}' to start the server");
    Ok(())
}
