use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chat_mirror::api::client::RemoteStreamClient;
use chat_mirror::asset::{AssetPick, PickedAsset};
use chat_mirror::notice::{self, NoticeReceiver};
use chat_mirror::ui::chat_view::ChatView;
use chat_mirror::{
    AppConfig, CacheError, ChatApp, ChatSession, ConfigError, IdentityProvider, KeyValueStore,
    LocalIdentity, MemoryStore, MemoryStream, MessageCache, MessageStream, MessageView,
    SqliteStore, StreamError,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "chat-mirror", version, about = "Terminal chat with an offline message mirror")]
struct Cli {
    /// Config file to use instead of the one in the user config dir.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Login email to chat as.
    #[arg(long)]
    user: Option<String>,

    /// Document store server, e.g. chat.example.com
    #[arg(long)]
    server: Option<String>,

    /// Keep everything in memory: no server, no cache file.
    #[arg(long)]
    memory: bool,

    /// Write the effective settings back to the config file.
    #[arg(long)]
    remember: bool,
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Cache(#[from] CacheError),
    #[error("{0}")]
    Stream(#[from] StreamError),
    #[error("stdin: {0}")]
    Io(#[from] std::io::Error),
    #[error("no user configured, pass --user or set `user` in the config")]
    NoUser,
    #[error("no server configured, pass --server or use --memory")]
    NoServer,
    #[error("no data directory for the message cache, set `cache_path`")]
    NoCachePath,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run_cli(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run_cli(cli: Cli) -> Result<(), RunError> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(user) = cli.user {
        config.user = Some(user);
    }

    if cli.remember {
        match &cli.config {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
    }

    let identity = config.identity().ok_or(RunError::NoUser)?;
    let auth = LocalIdentity::signed_in(identity);
    let (notices, notice_rx) = notice::channel();

    if cli.memory {
        let cache = MessageCache::new(Arc::new(MemoryStore::new()), &config.cache_key);
        let app = ChatApp::new(cache, Arc::new(MemoryStream::new()), notices)
            .with_max_image_bytes(config.max_image_bytes);
        return run(app, &auth, notice_rx).await;
    }

    let server = config.server_url().ok_or(RunError::NoServer)?;
    let store = SqliteStore::open(config.cache_path().ok_or(RunError::NoCachePath)?)?;
    let mut client = RemoteStreamClient::new(&server, config.collection.clone())?;
    if let Ok(token) = std::env::var("CHAT_MIRROR_TOKEN") {
        client = client.with_token(token);
    }
    let cache = MessageCache::new(Arc::new(store), &config.cache_key);
    let app = ChatApp::new(cache, Arc::new(client), notices)
        .with_max_image_bytes(config.max_image_bytes);
    run(app, &auth, notice_rx).await
}

async fn run<C: KeyValueStore, S: MessageStream>(
    mut app: ChatApp<C, S>,
    auth: &LocalIdentity,
    mut notices: NoticeReceiver,
) -> Result<(), RunError> {
    let mut auth_rx = auth.watch();
    let state = auth_rx.borrow_and_update().clone();
    app.apply(&state).await;
    let mut view_rx = app.session().map(ChatSession::view);
    if let Some(session) = app.session() {
        print_view(&session.current_view(), session.identity().as_str());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&mut app, auth, line).await {
                    break;
                }
            }
            changed = auth_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = auth_rx.borrow_and_update().clone();
                app.apply(&state).await;
                view_rx = app.session().map(ChatSession::view);
                if app.session().is_none() {
                    println!("-- signed out, /quit to exit");
                }
            }
            view = view_changed(&mut view_rx) => {
                if let Some(session) = app.session() {
                    print_view(&view, session.identity().as_str());
                }
            }
            Some(notice) = notices.recv() => {
                if notice.is_blocking() {
                    eprintln!("!! {notice}");
                } else {
                    eprintln!("-- {notice}");
                }
            }
        }
    }

    app.shutdown().await;
    Ok(())
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Quit,
    Logout,
    /// `/image <uri> [caption]`
    Image {
        uri: String,
        caption: Option<String>,
    },
    Text(String),
}

impl Command {
    fn parse(line: String) -> Self {
        let command = line.trim();
        match command {
            "/quit" => return Self::Quit,
            "/logout" => return Self::Logout,
            _ => {}
        }
        if let Some(rest) = command.strip_prefix("/image ") {
            let rest = rest.trim_start();
            let (uri, caption) = match rest.split_once(char::is_whitespace) {
                Some((uri, caption)) => (uri, Some(caption.trim())),
                None => (rest, None),
            };
            return Self::Image {
                uri: uri.to_string(),
                caption: caption.filter(|c| !c.is_empty()).map(str::to_string),
            };
        }
        Self::Text(line)
    }
}

/// Returns `false` when the user asked to quit.
async fn handle_line<C: KeyValueStore, S: MessageStream>(
    app: &mut ChatApp<C, S>,
    auth: &LocalIdentity,
    line: String,
) -> bool {
    let command = match Command::parse(line) {
        Command::Quit => return false,
        Command::Logout => {
            auth.sign_out();
            return true;
        }
        command => command,
    };

    let Some(session) = app.session_mut() else {
        println!("-- not signed in");
        return true;
    };
    let sent = match command {
        Command::Image { uri, caption } => {
            if let Some(caption) = caption {
                session.composer_mut().set_draft(caption);
            }
            session.send_image(AssetPick::Picked(PickedAsset::new(uri))).await
        }
        Command::Text(text) => {
            session.composer_mut().set_draft(text);
            session.send_text().await
        }
        Command::Quit | Command::Logout => return true,
    };
    if let Err(err) = sent {
        log::debug!("send failed: {err}");
    }
    true
}

async fn view_changed(rx: &mut Option<watch::Receiver<MessageView>>) -> MessageView {
    if let Some(rx) = rx {
        if rx.changed().await.is_ok() {
            return rx.borrow_and_update().clone();
        }
    }
    std::future::pending().await
}

fn print_view(view: &MessageView, me: &str) {
    println!("------------------------------");
    for line in ChatView::to_lines(view, me) {
        println!("{line}");
    }
}
