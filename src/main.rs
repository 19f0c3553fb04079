//! Pushwire CLI - send encrypted Web Push notifications.
//!
//! This is the main binary entry point. See the `pushwire` library for the
//! delivery pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use pushwire::constants::{AUTH_SECRET_LEN, UNCOMPRESSED_POINT_LEN};
use pushwire::notifications::codec;
use pushwire::{
    notifications::push::SubscriptionStore, FileSubscriptionStore, NotificationRequest,
    PushConfig, PushDispatcher, PushService, PushSubscription, Urgency, VapidKeyPair,
};
use std::sync::Arc;
use std::time::Duration;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Version of this binary.
const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI
#[derive(Parser)]
#[command(name = "pushwire")]
#[command(version = VERSION)]
#[command(about = "Encrypted Web Push delivery with VAPID authentication")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage VAPID keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
    /// Register a push subscription for an owner
    Subscribe {
        /// Owner (user) the subscription belongs to
        #[arg(long)]
        owner: String,
        /// Browser `PushSubscription.toJSON()` output
        #[arg(long, conflicts_with_all = ["endpoint", "p256dh", "auth"])]
        json: Option<String>,
        /// Push service endpoint URL
        #[arg(long, requires_all = ["p256dh", "auth"])]
        endpoint: Option<String>,
        /// Device ECDH public key (base64url)
        #[arg(long)]
        p256dh: Option<String>,
        /// Device auth secret (base64url)
        #[arg(long)]
        auth: Option<String>,
    },
    /// Remove subscriptions by endpoint or by owner
    Unsubscribe {
        /// Endpoint to remove
        #[arg(long, conflicts_with = "owner", required_unless_present = "owner")]
        endpoint: Option<String>,
        /// Remove every subscription of this owner
        #[arg(long)]
        owner: Option<String>,
    },
    /// List stored subscriptions
    List {
        /// Only show this owner's subscriptions
        #[arg(long)]
        owner: Option<String>,
    },
    /// Send a notification to every device of an owner
    Send {
        /// Owner whose devices receive the notification
        #[arg(long)]
        owner: String,
        /// Notification title
        #[arg(long)]
        title: String,
        /// Notification body
        #[arg(long)]
        body: String,
        /// Click-through URL
        #[arg(long)]
        url: Option<String>,
        /// Icon URL
        #[arg(long)]
        icon: Option<String>,
        /// Badge URL
        #[arg(long)]
        badge: Option<String>,
        /// Notification tag
        #[arg(long)]
        tag: Option<String>,
        /// Urgency header (very-low, low, normal, high)
        #[arg(long)]
        urgency: Option<Urgency>,
        /// Topic header
        #[arg(long)]
        topic: Option<String>,
        /// Extra data entries (key=value, value parsed as JSON when possible)
        #[arg(long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,
        /// Print per-subscription outcomes
        #[arg(long)]
        verbose: bool,
    },
    /// Show the effective configuration (private key omitted)
    Config,
}

#[derive(Subcommand)]
enum KeysAction {
    /// Generate a fresh VAPID keypair
    Generate {
        /// Contact subject for tokens
        #[arg(long, default_value = "mailto:admin@example.com")]
        subject: String,
        /// Write the keys into config.json
        #[arg(long)]
        save: bool,
    },
    /// Print the configured public key (the browser's applicationServerKey)
    Public,
}

fn open_store(config: &PushConfig) -> Result<FileSubscriptionStore> {
    Ok(FileSubscriptionStore::new(config.subscriptions_path()?))
}

/// Split `key=value`, parsing the value as JSON and falling back to a string.
fn parse_data_entry(entry: &str) -> Result<(String, serde_json::Value)> {
    let (key, value) = entry
        .split_once('=')
        .with_context(|| format!("data entry '{entry}' must be KEY=VALUE"))?;
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn generate_keys(subject: &str, save: bool) -> Result<()> {
    let keys = VapidKeyPair::generate(subject);
    println!("VAPID_PUBLIC_KEY={}", keys.public_key_base64url());
    println!("VAPID_PRIVATE_KEY={}", keys.private_key_base64url());
    println!("VAPID_SUBJECT={}", keys.subject());

    if save {
        let mut config = PushConfig::load()?;
        config.vapid_public_key = Some(keys.public_key_base64url());
        config.vapid_private_key = Some(keys.private_key_base64url());
        config.vapid_subject = Some(keys.subject().to_string());
        config.save()?;
        log::info!("Saved new VAPID keys to config");
        println!("Saved to {}", PushConfig::config_dir()?.join("config.json").display());
    }
    Ok(())
}

/// Reject subscriptions whose endpoint or key material cannot be used.
fn check_subscription(subscription: &PushSubscription) -> Result<()> {
    pushwire::notifications::vapid::audience_for(&subscription.endpoint)?;
    codec::decode_exact(&subscription.p256dh, UNCOMPRESSED_POINT_LEN, "p256dh")?;
    codec::decode_exact(&subscription.auth, AUTH_SECRET_LEN, "auth")?;
    Ok(())
}

async fn subscribe(
    config: &PushConfig,
    owner: String,
    json: Option<String>,
    endpoint: Option<String>,
    p256dh: Option<String>,
    auth: Option<String>,
) -> Result<()> {
    let subscription = match (json, endpoint, p256dh, auth) {
        (Some(json), ..) => PushSubscription::from_browser_json(owner, &json)?,
        (None, Some(endpoint), Some(p256dh), Some(auth)) => PushSubscription {
            endpoint,
            p256dh,
            auth,
            owner,
        },
        _ => anyhow::bail!("Provide either --json or --endpoint, --p256dh and --auth"),
    };

    check_subscription(&subscription)?;

    let store = open_store(config)?;
    let endpoint = subscription.endpoint.clone();
    store.upsert(subscription).await?;
    println!("Subscribed {endpoint}");
    Ok(())
}

async fn unsubscribe(config: &PushConfig, endpoint: Option<String>, owner: Option<String>) -> Result<()> {
    let store = open_store(config)?;
    let removed = match (endpoint, owner) {
        (Some(endpoint), _) => store.delete_endpoints(&[endpoint]).await?,
        (None, Some(owner)) => store.remove_owner(&owner).await?,
        (None, None) => anyhow::bail!("Provide --endpoint or --owner"),
    };
    println!("Removed {removed} subscription(s)");
    Ok(())
}

async fn list(config: &PushConfig, owner: Option<String>) -> Result<()> {
    let store = open_store(config)?;
    let table = store.load().await?;
    for subscription in table.all() {
        if owner.as_deref().is_some_and(|o| o != subscription.owner) {
            continue;
        }
        println!("{}\t{}", subscription.owner, subscription.endpoint);
    }
    Ok(())
}

async fn send(config: &PushConfig, request: NotificationRequest, verbose: bool) -> Result<()> {
    let keys = Arc::new(config.vapid_keys()?);
    let dispatcher =
        PushDispatcher::with_timeout(keys, Duration::from_secs(config.request_timeout_secs))?
            .with_ttl(config.ttl_secs);
    let service = PushService::new(dispatcher, Arc::new(open_store(config)?));

    let report = service.deliver_with_report(&request).await?;
    if verbose {
        for outcome in &report.outcomes {
            println!("{}\t{}", outcome.reason, outcome.endpoint);
        }
    }

    let summary = pushwire::DeliverySummary::from(&report);
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let config = PushConfig::load()?;

    match cli.command {
        Commands::Keys { action } => match action {
            KeysAction::Generate { subject, save } => generate_keys(&subject, save)?,
            KeysAction::Public => println!("{}", config.vapid_keys()?.public_key_base64url()),
        },
        Commands::Subscribe {
            owner,
            json,
            endpoint,
            p256dh,
            auth,
        } => subscribe(&config, owner, json, endpoint, p256dh, auth).await?,
        Commands::Unsubscribe { endpoint, owner } => unsubscribe(&config, endpoint, owner).await?,
        Commands::List { owner } => list(&config, owner).await?,
        Commands::Send {
            owner,
            title,
            body,
            url,
            icon,
            badge,
            tag,
            urgency,
            topic,
            data,
            verbose,
        } => {
            let mut request = NotificationRequest::new(owner, title, body);
            request.url = url;
            request.icon = icon;
            request.badge = badge;
            request.tag = tag;
            request.urgency = urgency;
            request.topic = topic;
            for entry in &data {
                let (key, value) = parse_data_entry(entry)?;
                request.extra_data.insert(key, value);
            }
            send(&config, request, verbose).await?;
        }
        Commands::Config => {
            let mut shown = config.clone();
            shown.vapid_private_key = None;
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}
