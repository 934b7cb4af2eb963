use clap::{Parser, Subcommand};
use eyre::{bail, Result, WrapErr};
use std::fs;
use std::path::{Path, PathBuf};

use neuroscan::render::{DocumentRenderer, PdfRenderer, TextRenderer};
use neuroscan::report::{compose_report, ReportRequest};
use neuroscan::users::UserStore;

#[derive(Parser)]
#[command(
    name = "neuroscan",
    about = "Brain MRI tumor classifier service with analysis reports."
)]
struct Cli {
    /// SQLite user database
    #[arg(long, global = true, env = "NEUROSCAN_DATABASE", default_value = "users.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP classifier service
    Serve {
        /// Address to bind to
        #[arg(long, env = "NEUROSCAN_BIND", default_value = "127.0.0.1:5000")]
        bind: String,

        /// Rate limit in requests per minute per IP (0 = no limit)
        #[arg(long, env = "NEUROSCAN_RATE_LIMIT", default_value_t = 60)]
        rate_limit: u32,

        /// Path for JSONL access log
        #[arg(long, env = "NEUROSCAN_ACCESS_LOG", default_value = "neuroscan-access.jsonl")]
        access_log: String,

        /// Access log size in bytes before rotation (0 = no limit)
        #[arg(long, env = "NEUROSCAN_MAX_ACCESS_LOG_BYTES", default_value_t = 50 * 1024 * 1024)]
        max_access_log_bytes: u64,

        /// Directory for persisted metrics
        #[arg(long, env = "NEUROSCAN_DATA_DIR", default_value = neuroscan::server::DEFAULT_DATA_DIR)]
        data_dir: String,

        /// Dense-head model artifact (JSON). Predict answers 503 without one.
        #[arg(long, env = "NEUROSCAN_MODEL")]
        model: Option<PathBuf>,

        /// HS256 signing secret for session tokens
        #[arg(long, env = "NEUROSCAN_JWT_SECRET", hide_env_values = true)]
        jwt_secret: Option<String>,

        /// Session token lifetime in seconds
        #[arg(long, env = "NEUROSCAN_TOKEN_TTL_SECS", default_value_t = neuroscan::auth::DEFAULT_TOKEN_TTL_SECS)]
        token_ttl_secs: i64,

        /// Require a bearer session token on predict and report
        #[arg(long, env = "NEUROSCAN_REQUIRE_TOKEN")]
        require_token: bool,

        /// Bearer key guarding /test-db
        #[arg(long, env = "NEUROSCAN_ADMIN_KEY", hide_env_values = true)]
        admin_key: Option<String>,

        /// Maximum request body size in bytes
        #[arg(long, env = "NEUROSCAN_MAX_BODY_BYTES", default_value_t = 32 * 1024 * 1024)]
        max_body_bytes: usize,
    },

    /// Resolve the classification record for a probability and identifier
    Classify {
        /// Tumor probability in [0, 1]
        #[arg(long)]
        probability: f64,

        /// Image identifier (normally the base64 payload)
        #[arg(long)]
        identifier: String,

        /// Output format: json or summary
        #[arg(long, default_value = "summary")]
        format: String,
    },

    /// Render a report offline from a /generate-report request body
    Report {
        /// JSON file: {user:{name,email}, predictions:{image:[...], result:[...]}}
        #[arg(long)]
        input: PathBuf,

        /// Where to write the report
        #[arg(long)]
        output: PathBuf,

        /// Output format: pdf or text
        #[arg(long, default_value = "pdf")]
        format: String,
    },

    /// Create the users table
    InitDb,

    /// Print registered users
    Users,
}

struct ServeArgs {
    bind: String,
    rate_limit: u32,
    access_log: String,
    max_access_log_bytes: u64,
    data_dir: String,
    model: Option<PathBuf>,
    jwt_secret: Option<String>,
    token_ttl_secs: i64,
    require_token: bool,
    admin_key: Option<String>,
    max_body_bytes: usize,
}

fn cmd_serve(database: PathBuf, args: ServeArgs) -> Result<()> {
    use neuroscan::server::{run_server, ServerConfig, DEV_JWT_SECRET};

    let bind_addr = args
        .bind
        .parse()
        .wrap_err_with(|| format!("Invalid bind address: {}", args.bind))?;

    let config = ServerConfig {
        bind_addr,
        rate_limit_rpm: args.rate_limit,
        access_log_path: args.access_log,
        max_access_log_bytes: args.max_access_log_bytes,
        data_dir: args.data_dir,
        database_path: database,
        model_path: args.model,
        jwt_secret: args.jwt_secret.unwrap_or_else(|| DEV_JWT_SECRET.to_string()),
        token_ttl_secs: args.token_ttl_secs,
        require_token: args.require_token,
        admin_key: args.admin_key,
        max_body_bytes: args.max_body_bytes,
    };
    tracing::debug!(?config, "starting server");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_server(config))?;

    Ok(())
}

fn cmd_classify(probability: f64, identifier: &str, format: &str) -> Result<()> {
    let record = neuroscan::classify(probability, identifier);

    match format {
        "json" => {
            let result = serde_json::json!({
                "probability": probability,
                "hash": neuroscan::stable_hash(identifier),
                "record": record,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Classification Result");
            println!("=====================");
            println!("Probability:    {:.2}%", probability * 100.0);
            println!("Label:          {}", record.label);
            println!("Severity Tier:  {}", record.severity_tier.as_str());
            println!("Risk Level:     {}", record.risk_level.as_str());
            println!("Priority:       {}", record.priority.as_str());
            println!();
            println!("{}", record.narrative);
            println!();
            for note in record.clinical_notes {
                println!("  * {note}");
            }
            println!();
            println!("Recommended Action: {}", record.recommended_action);
        }
    }
    Ok(())
}

fn cmd_report(input: &Path, output: &Path, format: &str) -> Result<()> {
    let content = fs::read(input).wrap_err_with(|| format!("failed to read {}", input.display()))?;
    let request: ReportRequest = serde_json::from_slice(&content)
        .wrap_err_with(|| format!("{} is not a valid report request", input.display()))?;
    let (patient, items) = request.into_items()?;
    let doc = compose_report(&patient, &items, chrono::Utc::now());

    let bytes = match format {
        "pdf" => PdfRenderer.render(&doc)?,
        "text" => TextRenderer.render(&doc)?,
        other => bail!("unknown report format '{other}' (expected pdf or text)"),
    };
    fs::write(output, &bytes).wrap_err_with(|| format!("failed to write {}", output.display()))?;

    eprintln!(
        "Wrote {} ({} scans, {} positive, {} bytes)",
        output.display(),
        doc.summary.total,
        doc.summary.positive,
        bytes.len()
    );
    Ok(())
}

fn cmd_init_db(database: &Path) -> Result<()> {
    let store = UserStore::open(database)
        .wrap_err_with(|| format!("failed to open {}", database.display()))?;
    eprintln!(
        "Database ready at {} ({} users)",
        database.display(),
        store.count()?
    );
    Ok(())
}

fn cmd_users(database: &Path) -> Result<()> {
    let store = UserStore::open(database)
        .wrap_err_with(|| format!("failed to open {}", database.display()))?;
    let users = store.list()?;
    if users.is_empty() {
        println!("No users registered.");
        return Ok(());
    }
    println!("{:<6}{:<24}{:<36}Registered", "ID", "Name", "Email");
    for (user, created_at) in &users {
        println!(
            "{:<6}{:<24}{:<36}{}",
            user.id, user.name, user.email, created_at
        );
    }
    println!("\n{} users", users.len());
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            bind,
            rate_limit,
            access_log,
            max_access_log_bytes,
            data_dir,
            model,
            jwt_secret,
            token_ttl_secs,
            require_token,
            admin_key,
            max_body_bytes,
        } => cmd_serve(
            cli.database,
            ServeArgs {
                bind,
                rate_limit,
                access_log,
                max_access_log_bytes,
                data_dir,
                model,
                jwt_secret,
                token_ttl_secs,
                require_token,
                admin_key,
                max_body_bytes,
            },
        ),
        Commands::Classify {
            probability,
            identifier,
            format,
        } => cmd_classify(probability, &identifier, &format),
        Commands::Report {
            input,
            output,
            format,
        } => cmd_report(&input, &output, &format),
        Commands::InitDb => cmd_init_db(&cli.database),
        Commands::Users => cmd_users(&cli.database),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}
