use attrgate::{authorize, settings, web};
use clap::Parser;
use miette::Result;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "attrgate",
    version,
    about = "Attribute-based access decisions for an identity provider"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "ATTRGATE_CONFIG")]
    config: String,

    /// Compile the policy, report it, and exit
    #[arg(long)]
    check_policy: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // compile the policy up front; an invalid policy must never serve requests
    let policy = authorize::loader::load_policy(&settings.policy.path)?;

    if cli.check_policy {
        for rule in &policy.rules {
            tracing::info!(
                attribute = %rule.attribute,
                patterns = rule.patterns.len(),
                relying_parties = ?rule.allowed_relying_parties,
                "Rule"
            );
        }
        return Ok(());
    }

    web::serve(settings, policy).await
}
