use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use lms::config::DEFAULT_TOKEN_PATH;
use lms::realtime::PresenceState;
use lms::services::types::{Answer, CourseFilter, Role, SignUp};
use lms::{ApiClient, ApiError, ClientConfig, ConfigError, RealtimeChannel, RealtimeEvent, TokenStoreKind};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("not signed in; run `lms login` first")]
    NotSignedIn,
    #[error("failed to read {path}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "lms", about = "LMS API and realtime CLI")]
struct Cli {
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long, env = "LMS_TOKEN_PATH", default_value = DEFAULT_TOKEN_PATH)]
    token_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LMS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Signup(SignupArgs),
    Logout,
    Whoami,
    Courses(CoursesCommand),
    Categories,
    Enroll {
        course_id: String,
    },
    Enrollments,
    Conversations,
    Messages {
        conversation_id: String,
        #[arg(long)]
        before: Option<String>,
    },
    Send {
        receiver_id: String,
        content: String,
    },
    Quiz(QuizCommand),
    Upload {
        path: PathBuf,
        #[arg(long)]
        content_type: Option<String>,
    },
    Dashboard {
        #[arg(long, default_value_t = false)]
        teacher: bool,
    },
    /// Print realtime events until interrupted.
    Listen {
        #[arg(long = "conversation")]
        conversations: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct SignupArgs {
    #[arg(long)]
    email: String,
    #[arg(long, env = "LMS_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long, default_value_t = false)]
    teacher: bool,
}

#[derive(Args, Debug)]
struct CoursesCommand {
    #[command(subcommand)]
    command: CoursesSubcommand,
}

#[derive(Subcommand, Debug)]
enum CoursesSubcommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        page: Option<u32>,
    },
    Show {
        course_id: String,
    },
    Teaching,
}

#[derive(Args, Debug)]
struct QuizCommand {
    #[command(subcommand)]
    command: QuizSubcommand,
}

#[derive(Subcommand, Debug)]
enum QuizSubcommand {
    Show {
        quiz_id: String,
    },
    Start {
        quiz_id: String,
    },
    Submit {
        attempt_id: String,
        #[arg(long, help = "JSON array of {questionId, optionIds, text}")]
        answers: String,
    },
    Attempts {
        quiz_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url);
    }
    config.token_store = TokenStoreKind::File(cli.token_path);
    tracing::debug!(base_url = %config.base_url, realtime_url = %config.realtime_url, "lms cli starting");
    let client = ApiClient::from_config(&config)?;

    let result = run(&client, &config, cli.command).await;
    if let Err(CliError::Api(e)) = &result {
        if e.is_terminal() {
            eprintln!("session ended; run `lms login` to sign in again");
        }
    }
    result
}

async fn run(client: &ApiClient, config: &ClientConfig, command: Command) -> Result<(), CliError> {
    if requires_session(&command) && client.store().get().is_empty() {
        return Err(CliError::NotSignedIn);
    }

    match command {
        Command::Login { email, password } => {
            let session = client.auth().sign_in(&email, &password).await?;
            println!("signed in as {}", session.user.display_name());
        }
        Command::Signup(args) => {
            let form = SignUp {
                email: args.email,
                password: args.password,
                first_name: args.first_name,
                last_name: args.last_name,
                role: if args.teacher { Role::Teacher } else { Role::Student },
            };
            let session = client.auth().sign_up(&form).await?;
            println!("signed up as {}", session.user.display_name());
        }
        Command::Logout => {
            client.auth().logout().await;
            println!("signed out");
        }
        Command::Whoami => print_json(&client.auth().verify().await?)?,
        Command::Courses(courses) => run_courses(client, courses).await?,
        Command::Categories => print_json(&client.categories().list().await?)?,
        Command::Enroll { course_id } => print_json(&client.enrollments().enroll(&course_id).await?)?,
        Command::Enrollments => print_json(&client.enrollments().mine().await?)?,
        Command::Conversations => print_json(&client.messages().conversations().await?)?,
        Command::Messages { conversation_id, before } => {
            print_json(&client.messages().history(&conversation_id, before.as_deref()).await?)?;
        }
        Command::Send { receiver_id, content } => {
            print_json(&client.messages().send(&receiver_id, &content).await?)?;
        }
        Command::Quiz(quiz) => run_quiz(client, quiz).await?,
        Command::Upload { path, content_type } => {
            let bytes = std::fs::read(&path).map_err(|source| CliError::ReadFile { path: path.clone(), source })?;
            let content_type = content_type.unwrap_or_else(|| guess_content_type(&path).to_owned());
            let file_name = path.file_name().map_or_else(|| "upload".to_owned(), |n| n.to_string_lossy().into_owned());
            print_json(&client.files().upload(&file_name, &content_type, bytes).await?)?;
        }
        Command::Dashboard { teacher } => {
            if teacher {
                print_json(&client.dashboard().teacher().await?)?;
            } else {
                print_json(&client.dashboard().student().await?)?;
            }
        }
        Command::Listen { conversations } => listen(client, config, &conversations).await?,
    }
    Ok(())
}

async fn run_courses(client: &ApiClient, courses: CoursesCommand) -> Result<(), CliError> {
    match courses.command {
        CoursesSubcommand::List { search, category, page } => {
            let filter = CourseFilter { search, category_id: category, page };
            print_json(&client.courses().list(&filter).await?)
        }
        CoursesSubcommand::Show { course_id } => print_json(&client.courses().get(&course_id).await?),
        CoursesSubcommand::Teaching => print_json(&client.courses().teaching().await?),
    }
}

async fn run_quiz(client: &ApiClient, quiz: QuizCommand) -> Result<(), CliError> {
    match quiz.command {
        QuizSubcommand::Show { quiz_id } => print_json(&client.quizzes().get(&quiz_id).await?),
        QuizSubcommand::Start { quiz_id } => print_json(&client.quizzes().start(&quiz_id).await?),
        QuizSubcommand::Submit { attempt_id, answers } => {
            let answers = serde_json::from_str::<Vec<Answer>>(&answers)?;
            print_json(&client.quizzes().submit(&attempt_id, &answers).await?)
        }
        QuizSubcommand::Attempts { quiz_id } => print_json(&client.quizzes().attempts(&quiz_id).await?),
    }
}

async fn listen(client: &ApiClient, config: &ClientConfig, conversations: &[String]) -> Result<(), CliError> {
    // Renews a stale access token before it is handed to the socket.
    client.auth().verify().await?;

    let channel = RealtimeChannel::connect(config.realtime_url.clone(), Arc::clone(client.store()));
    let mut events = channel.subscribe();
    let mut status = channel.status();
    for conversation_id in conversations {
        channel.join_conversation(conversation_id);
    }

    let mut presence = PresenceState::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                eprintln!("connection: {:?}", *status.borrow_and_update());
            }
            received = events.recv() => match received {
                Ok(event) => {
                    if presence.apply(&event) {
                        eprintln!("online: {}", presence.online().collect::<Vec<_>>().join(", "));
                    }
                    print_event(&event)?;
                }
                Err(RecvError::Lagged(skipped)) => eprintln!("skipped {skipped} events"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

fn print_event(event: &RealtimeEvent) -> Result<(), CliError> {
    match event {
        RealtimeEvent::MessageNew(message) => print_json(message),
        RealtimeEvent::MessageRead { conversation_id, reader_id, .. } => {
            println!("{reader_id} read {conversation_id}");
            Ok(())
        }
        RealtimeEvent::TypingStart { conversation_id, user_id } => {
            println!("{user_id} is typing in {conversation_id}");
            Ok(())
        }
        RealtimeEvent::PresenceList { .. }
        | RealtimeEvent::UserOnline { .. }
        | RealtimeEvent::UserOffline { .. }
        | RealtimeEvent::TypingStop { .. } => Ok(()),
    }
}

fn requires_session(command: &Command) -> bool {
    !matches!(command, Command::Login { .. } | Command::Signup(_) | Command::Logout | Command::Categories)
        && !matches!(command, Command::Courses(CoursesCommand { command: CoursesSubcommand::List { .. } }))
}

fn guess_content_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("mp4") => "video/mp4",
        Some("txt" | "md") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
