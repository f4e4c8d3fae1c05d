//! eatpal-authz - authorization inspector
//!
//! Loads a policy file, resolves the security context through the configured
//! backend and answers one authorization question per invocation.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use eatpal_authz::config::{AuthzConfig, BackendConfig};
use eatpal_authz::guard::{Guard, GuardState};
use eatpal_authz::{meets_role, ContextState, OwnershipDescriptor, Role};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eatpal-authz")]
#[command(version)]
#[command(about = "EatPal authorization inspector", long_about = None)]
struct Cli {
    /// Policy file
    #[arg(long, short = 'p', global = true, default_value = eatpal_authz::DEFAULT_POLICY_FILE)]
    policy: PathBuf,

    /// Act as this actor (static backend only)
    #[arg(long = "as", global = true)]
    actor: Option<String>,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved security context
    Whoami,
    /// Evaluate a permission, optionally against a resource owner
    Check {
        /// Permission token (e.g., food.view_own)
        permission: String,
        /// Owner id of the target resource
        #[arg(long)]
        owner: Option<String>,
    },
    /// Check a minimum role level
    Level {
        /// Minimum role (guest, user, moderator, admin)
        min: Role,
    },
    /// Evaluate a route guard for a destination
    Guard {
        /// Route the user is trying to reach
        destination: String,
        /// Require a permission
        #[arg(long)]
        permission: Option<String>,
        /// Require ownership (with --permission)
        #[arg(long, requires = "permission")]
        owner: Option<String>,
        /// Require a minimum role
        #[arg(long, conflicts_with = "permission")]
        role: Option<Role>,
    },
    /// Print a fresh CSRF token using the policy's TTL
    Csrf,
    /// End the backend session
    SignOut,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "eatpal_authz=debug" } else { "eatpal_authz=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_policy(path: &Path, actor: Option<&str>) -> anyhow::Result<AuthzConfig> {
    let mut config = AuthzConfig::load(path)
        .with_context(|| format!("failed to load policy {}", path.display()))?;

    if let Some(actor) = actor {
        match &mut config.spec.backend {
            BackendConfig::Static { session, .. } => *session = Some(actor.to_string()),
            BackendConfig::Http { .. } => bail!("--as is only supported with the static backend"),
        }
        config.validate()?;
    }
    Ok(config)
}

fn print_guard_state(state: &GuardState, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
        return Ok(());
    }
    match state {
        GuardState::Loading => println!("loading"),
        GuardState::Authorized => println!("✓ authorized"),
        GuardState::Unauthenticated {
            redirect,
            retry_available,
        } => {
            println!("→ redirect {}", redirect);
            if *retry_available {
                println!("  (session lookup failed; retry available)");
            }
        }
        GuardState::Denied { reason } => {
            println!("✗ denied: {}", reason);
            println!("  {}", eatpal_authz::guard::denial_message(*reason));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_policy(&cli.policy, cli.actor.as_deref())?;
    let base_dir = cli
        .policy
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    if let Commands::Csrf = cli.command {
        let mut store = config.csrf_store();
        let token = store.token().to_string();
        if cli.json {
            println!(
                "{}",
                serde_json::json!({ "token": token, "ttlSeconds": store.ttl().num_seconds() })
            );
        } else {
            println!("{}", token);
        }
        return Ok(());
    }

    let provider = config.provider(&base_dir)?;
    let state = provider.load().await;

    match cli.command {
        Commands::Whoami => match &state {
            ContextState::Ready(ctx) => {
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(ctx.as_ref())?);
                } else {
                    println!("Actor: {}", ctx.identity());
                    println!("Role:  {} (level {})", ctx.role(), ctx.role().level());
                    println!("Grants:");
                    for grant in ctx.permissions() {
                        println!("  {}", grant);
                    }
                }
            }
            ContextState::Unauthenticated(cause) => {
                println!("Not signed in: {:?}", cause);
                std::process::exit(1);
            }
            ContextState::Loading => unreachable!("load() always returns a terminal state"),
        },

        Commands::Check { permission, owner } => {
            eatpal_authz::Permission::parse(&permission)?;
            let evaluator = config.evaluator(&base_dir);
            let resource = owner.map(OwnershipDescriptor::new);
            let result = evaluator.check(&state, &permission, resource.as_ref());

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.allowed() {
                println!("✓ allowed: {}", permission);
            } else {
                println!("✗ denied: {} ({})", permission, result.reason());
            }
            if !result.allowed() {
                std::process::exit(1);
            }
        }

        Commands::Level { min } => {
            let ok = meets_role(&state, min);
            if cli.json {
                println!("{}", serde_json::json!({ "min": min, "meets": ok }));
            } else {
                println!("{} {}", if ok { "✓ meets" } else { "✗ below" }, min);
            }
            if !ok {
                std::process::exit(1);
            }
        }

        Commands::Guard {
            destination,
            permission,
            owner,
            role,
        } => {
            let guard = match (permission, owner, role) {
                (Some(p), Some(o), _) => Guard::permission_and_ownership(p, OwnershipDescriptor::new(o)),
                (Some(p), None, _) => Guard::permission(p),
                (None, _, Some(r)) => Guard::role_level(r),
                (None, _, None) => Guard::authenticated(),
            }
            .with_sign_in_path(config.spec.sign_in_path.clone());

            let decision = guard.evaluate(&state, &destination);
            print_guard_state(&decision, cli.json)?;
            if decision != GuardState::Authorized {
                std::process::exit(1);
            }
        }

        Commands::SignOut => {
            let actor = state.ready().map(|c| c.identity().to_string());
            let fresh = provider.sign_out().await.context("sign-out failed")?;
            let after = fresh.load().await;
            match actor {
                Some(actor) => println!("✓ signed out {}", actor),
                None => println!("no active session"),
            }
            if after.is_authenticated() {
                bail!("backend still reports a signed-in actor");
            }
        }

        Commands::Csrf => unreachable!("handled before context load"),
    }

    Ok(())
}
