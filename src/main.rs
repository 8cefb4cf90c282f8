use anyhow::{Context, Result};
use clap::Parser;
use portalctl::busy::{BusyTracker, LogObserver};
use portalctl::config::ApiConfig;
use portalctl::download::{self, Downloaded, SaveAs};
use portalctl::http::ApiClient;
use portalctl::runtime::RealRuntime;
use portalctl::security::{Authenticate, Credentials, SecurityService};
use portalctl::session::{FileSessionStore, SessionStore};
use std::path::PathBuf;
use std::sync::Arc;

/// portalctl - command-line client for the portal web API
///
/// Signs in against the portal's security endpoints and issues authenticated
/// requests. The session token is remembered in a local file between runs and
/// is forgotten again when the server reports it expired.
#[derive(Parser, Debug)]
#[command(author, version = env!("PORTALCTL_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API root URL
    #[arg(
        long = "api-url",
        env = "PORTALCTL_API_URL",
        value_name = "URL",
        global = true
    )]
    api_url: Option<String>,

    /// Security domain URL (defaults to the API root)
    #[arg(
        long = "security-url",
        env = "PORTALCTL_SECURITY_URL",
        value_name = "URL",
        global = true
    )]
    security_url: Option<String>,

    /// Session file location (defaults to the user config directory)
    #[arg(
        long = "session-file",
        env = "PORTALCTL_SESSION",
        value_name = "PATH",
        global = true
    )]
    session_file: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Sign in and remember the session
    Login(LoginArgs),

    /// End the session on the server and forget it locally
    Logout,

    /// Show the remembered user
    Whoami,

    /// Change the signed-in user's password
    ChangePassword(ChangePasswordArgs),

    /// GET an API path and print the JSON response
    Get(GetArgs),

    /// Download a file from an API path
    Download(DownloadArgs),

    /// Upload a file to an API path as a multipart form
    Upload(UploadArgs),
}

#[derive(clap::Args, Debug)]
struct LoginArgs {
    #[arg(long, short = 'u')]
    username: String,

    #[arg(long, short = 'p', env = "PORTALCTL_PASSWORD")]
    password: String,
}

#[derive(clap::Args, Debug)]
struct ChangePasswordArgs {
    #[arg(long)]
    old_password: String,

    #[arg(long)]
    new_password: String,
}

#[derive(clap::Args, Debug)]
struct GetArgs {
    /// API path, e.g. api/items
    path: String,
}

#[derive(clap::Args, Debug)]
struct DownloadArgs {
    /// API path, e.g. api/export
    path: String,

    /// Save under this exact path instead of the server-provided name
    #[arg(long = "to", value_name = "FILE", conflicts_with = "dir")]
    to: Option<PathBuf>,

    /// Directory for the server-named file (defaults to the current directory)
    #[arg(long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct UploadArgs {
    /// API path, e.g. api/documents
    path: String,

    /// File to upload
    file: PathBuf,
}

struct Setup {
    api_url: Option<String>,
    security_url: Option<String>,
    session_file: Option<PathBuf>,
}

impl Setup {
    fn session_store(&self) -> Result<Arc<dyn SessionStore>> {
        let runtime = RealRuntime;
        let path = match &self.session_file {
            Some(path) => path.clone(),
            None => FileSessionStore::default_path(&runtime)
                .context("Could not determine a config directory; pass --session-file")?,
        };
        Ok(Arc::new(FileSessionStore::new(runtime, path)))
    }

    fn client(&self) -> Result<ApiClient> {
        let api_url = self
            .api_url
            .clone()
            .context("--api-url is required (or set PORTALCTL_API_URL)")?;
        let config = ApiConfig::new(api_url, self.security_url.clone());
        ApiClient::new(
            config,
            self.session_store()?,
            BusyTracker::new(Box::new(LogObserver)),
        )
    }

    fn security(&self) -> Result<SecurityService> {
        Ok(SecurityService::new(self.client()?))
    }
}

async fn run_login(security: &impl Authenticate, username: String, password: String) -> Result<()> {
    let user = security.login(&Credentials { username, password }).await?;
    println!("Signed in as {}", user.user_name);
    Ok(())
}

async fn run_logout(security: &impl Authenticate) -> Result<()> {
    security.logout().await?;
    println!("Signed out");
    Ok(())
}

fn run_whoami(session: &dyn SessionStore) -> Result<()> {
    match session.current() {
        Some(user) => {
            println!("{}", user.user_name);
            if !user.roles.is_empty() {
                println!("Roles: {}", user.roles.join(", "));
            }
            if !user.access_rights.is_empty() {
                println!("Access rights: {}", user.access_rights.join(", "));
            }
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

async fn run_get(client: &ApiClient, path: &str) -> Result<()> {
    let value: serde_json::Value = client.get_json(path, None).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn run_download(client: &ApiClient, args: &DownloadArgs) -> Result<()> {
    let dir = args.dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let save_as = match &args.to {
        Some(to) => SaveAs::Path(to),
        None => SaveAs::ServerName(&dir),
    };

    let Downloaded { path, bytes } =
        download::download(client, &RealRuntime, &args.path, None, None, save_as).await?;
    println!("Saved {} ({} bytes)", path.display(), bytes);
    Ok(())
}

async fn run_upload(client: &ApiClient, args: &UploadArgs) -> Result<()> {
    let file_name = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{:?} has no usable file name", args.file))?
        .to_string();
    let contents = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {:?}", args.file))?;

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(contents).file_name(file_name),
    );

    let response: serde_json::Value = client.post_multipart(&args.path, form, None).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let setup = Setup {
        api_url: cli.api_url,
        security_url: cli.security_url,
        session_file: cli.session_file,
    };

    match cli.command {
        Commands::Login(args) => {
            run_login(&setup.security()?, args.username, args.password).await?
        }
        Commands::Logout => run_logout(&setup.security()?).await?,
        Commands::Whoami => run_whoami(setup.session_store()?.as_ref())?,
        Commands::ChangePassword(args) => {
            setup
                .security()?
                .change_password(&args.old_password, &args.new_password)
                .await?;
            println!("Password changed");
        }
        Commands::Get(args) => run_get(&setup.client()?, &args.path).await?,
        Commands::Download(args) => run_download(&setup.client()?, &args).await?,
        Commands::Upload(args) => run_upload(&setup.client()?, &args).await?,
    }
    Ok(())
}
