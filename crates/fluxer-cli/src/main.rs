mod chat;
mod render;
mod session_store;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use fluxer_core::{
    AuthResponse, Captcha, ChannelRef, ClientConfig, FluxerClient, IpAuthorizationRequired,
    LoginOutcome, Session,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use render::{channel_line, guild_line, message_line, user_line};
use session_store::SessionStore;

const IP_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Polls before the approval email is sent again
const RESEND_AFTER_POLLS: u64 = 30;

#[derive(Parser)]
#[command(name = "fluxer")]
#[command(about = "Terminal client for Fluxer", long_about = None, version)]
struct Cli {
    /// TOML config file (defaults to <config dir>/fluxer/config.toml)
    #[arg(long, env = "FLUXER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// API base URL, overriding the config file
    #[arg(long, env = "FLUXER_API_URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct CaptchaArgs {
    /// A solved captcha token
    #[arg(long)]
    captcha_token: Option<String>,

    /// Captcha provider (defaults to hcaptcha)
    #[arg(long, requires = "captcha_token")]
    captcha_type: Option<String>,
}

impl CaptchaArgs {
    fn into_captcha(self) -> Option<Captcha> {
        let captcha = Captcha::new(self.captcha_token?);
        Some(match self.captcha_type {
            Some(kind) => captcha.with_kind(kind),
            None => captcha,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and remember the session
    Login {
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "FLUXER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[command(flatten)]
        captcha: CaptchaArgs,
    },
    /// Create an account and remember the session
    Register {
        email: String,
        username: String,
        #[arg(long, env = "FLUXER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[command(flatten)]
        captcha: CaptchaArgs,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List your channels and direct messages
    Channels,
    /// List your servers
    Servers,
    /// List the channels of a server
    ServerChannels { guild_id: String },
    /// Open a channel interactively
    Chat {
        channel_id: String,
        /// Channel name for the header; fetched when omitted
        #[arg(long)]
        name: Option<String>,
    },
    /// Send one message
    Send {
        channel_id: String,
        #[arg(default_value = "")]
        text: String,
        /// Attach an image
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Replace the text of one of your messages
    Edit {
        channel_id: String,
        message_id: String,
        text: String,
    },
    /// Delete a message
    Delete {
        channel_id: String,
        message_id: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("fluxer"))
        .context("Could not determine the user config directory")
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => config_dir()?.join("config.toml"),
    };
    let mut config = ClientConfig::load_or_default(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    Ok(config)
}

fn read_password(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("No password given");
    }
    Ok(password)
}

fn require_session(store: &SessionStore) -> Result<Session> {
    store
        .load()?
        .ok_or_else(|| anyhow!("Not logged in; run `fluxer login <email>` first"))
}

/// Wait for the user to approve this login from their email
async fn wait_for_ip_authorization(
    client: &FluxerClient,
    pending: &IpAuthorizationRequired,
) -> Result<AuthResponse> {
    println!(
        "This login needs approval. Follow the link sent to {} to continue.",
        pending.email
    );

    let resend_after = RESEND_AFTER_POLLS.max(pending.resend_available_in / IP_POLL_INTERVAL.as_secs());
    let mut ticker = tokio::time::interval(IP_POLL_INTERVAL);
    let mut polls: u64 = 0;
    loop {
        ticker.tick().await;
        match client.poll_ip_authorization(&pending.ticket).await {
            Ok(poll) if poll.completed => {
                let token = poll
                    .token
                    .ok_or_else(|| anyhow!("Login approved but the server sent no token; log in again"))?;
                return Ok(AuthResponse { token, user_id: poll.user_id, user: None });
            }
            Ok(_) => {}
            Err(e) => debug!("IP authorization poll failed: {}", e),
        }

        polls += 1;
        if polls == resend_after {
            println!("Still waiting. Check your spam folder; sending the email again.");
            if let Err(e) = client.resend_ip_authorization(&pending.ticket).await {
                warn!("Resending the authorization email failed: {}", e);
            }
        }
    }
}

/// Store the session, fetching the profile if the auth response had none
async fn finish_login(client: &mut FluxerClient, store: &SessionStore, auth: AuthResponse) -> Result<()> {
    client.set_token(Some(auth.token.clone()));
    let user = match auth.user {
        Some(user) => Some(user),
        None => client
            .current_user()
            .await
            .map_err(|e| warn!("Could not fetch the profile: {}", e))
            .ok(),
    };

    let session = Session { token: auth.token, user };
    store.save(&session)?;
    println!("Logged in as {}", session.username().unwrap_or("(unknown user)"));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let store = SessionStore::in_dir(&config_dir()?);
    let sync = config.sync.clone();

    let mut client = FluxerClient::new(config).context("Invalid API base URL")?;

    match cli.command {
        Commands::Login { email, password, captcha } => {
            let password = read_password(password)?;
            let captcha = captcha.into_captcha();
            let auth = match client.login(&email, &password, captcha.as_ref()).await {
                Ok(LoginOutcome::Authenticated(auth)) => auth,
                Ok(LoginOutcome::IpAuthorizationRequired(pending)) => {
                    wait_for_ip_authorization(&client, &pending).await?
                }
                Err(e) if e.is_captcha() => bail!(
                    "The server requires a captcha. Solve it in a browser and pass the token with --captcha-token."
                ),
                Err(e) => return Err(e).context("Login failed"),
            };
            finish_login(&mut client, &store, auth).await?;
        }
        Commands::Register { email, username, password, captcha } => {
            let password = read_password(password)?;
            let captcha = captcha.into_captcha();
            let auth = client
                .register(&email, &password, &username, captcha.as_ref())
                .await
                .context("Registration failed")?;
            if auth.user.is_none() {
                bail!("Registration succeeded but the user profile is missing");
            }
            finish_login(&mut client, &store, auth).await?;
        }
        Commands::Logout => {
            if store.clear()? {
                println!("Logged out");
            } else {
                println!("No stored session");
            }
        }
        Commands::Whoami => {
            let session = require_session(&store)?;
            let client = client.with_token(session.token);
            let user = match session.user {
                Some(user) => user,
                None => client.current_user().await.context("Failed to fetch the profile")?,
            };
            println!("{}", user_line(&user, &client.config().media_base_url));
        }
        Commands::Channels => {
            let session = require_session(&store)?;
            let client = client.with_token(session.token);
            for channel in client.channels().await.context("Failed to list channels")? {
                println!("{}", channel_line(&channel));
            }
        }
        Commands::Servers => {
            let session = require_session(&store)?;
            let client = client.with_token(session.token);
            for guild in client.guilds().await.context("Failed to list servers")? {
                println!("{}", guild_line(&guild));
            }
        }
        Commands::ServerChannels { guild_id } => {
            let session = require_session(&store)?;
            let client = client.with_token(session.token);
            let channels = client
                .guild_channels(&guild_id)
                .await
                .context("Failed to list server channels")?;
            for channel in channels {
                println!("{}", channel_line(&channel));
            }
        }
        Commands::Chat { channel_id, name } => {
            let session = require_session(&store)?;
            let current_user = session.username().unwrap_or_default().to_string();
            let client = client.with_token(session.token);

            let channel = match name {
                Some(name) => ChannelRef::named(channel_id, name),
                None => match client.channel(&channel_id).await {
                    Ok(channel) => ChannelRef { id: channel_id, name: channel.name },
                    Err(e) => {
                        debug!("Could not fetch channel {}: {}", channel_id, e);
                        ChannelRef::new(channel_id)
                    }
                },
            };
            chat::run(Arc::new(client), channel, current_user, sync).await?;
        }
        Commands::Send { channel_id, text, image } => {
            let session = require_session(&store)?;
            let current_user = session.username().unwrap_or_default().to_string();
            let client = client.with_token(session.token);

            let message = match image {
                Some(path) => {
                    let image = chat::load_image(&path).await?;
                    client.send_message_with_image(&channel_id, &text, &image).await
                }
                None if text.trim().is_empty() => bail!("Nothing to send"),
                None => client.send_message(&channel_id, &text).await,
            }
            .context("Failed to send")?;
            println!("{}", message_line(&message, &current_user));
        }
        Commands::Edit { channel_id, message_id, text } => {
            if text.trim().is_empty() {
                bail!("A message cannot be edited to be empty; use `fluxer delete`");
            }
            let session = require_session(&store)?;
            let current_user = session.username().unwrap_or_default().to_string();
            let client = client.with_token(session.token);
            let message = client
                .edit_message(&channel_id, &message_id, &text)
                .await
                .context("Failed to edit")?;
            println!("{}", message_line(&message, &current_user));
        }
        Commands::Delete { channel_id, message_id } => {
            let session = require_session(&store)?;
            let client = client.with_token(session.token);
            client
                .delete_message(&channel_id, &message_id)
                .await
                .context("Failed to delete")?;
            println!("Deleted message {}", message_id);
        }
    }

    Ok(())
}
