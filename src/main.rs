use anyhow::Result;
use clap::{Parser, Subcommand};
use syllabus::api::TokenStore;
use syllabus::app::Target;
use syllabus::{App, Config, ContentKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "syllabus")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the access token for the curriculum service
    Login {
        /// Bearer token issued by the service
        token: String,
    },
    /// Remove the stored access token
    Logout,
    /// Show a course outline with completion status
    Outline {
        /// Course ID
        course: String,
    },
    /// Show progress for a course
    Progress {
        /// Course ID
        course: String,
    },
    /// Open a course, optionally at a task or item
    Open {
        /// Course ID
        course: String,
        /// Task ID
        task: Option<String>,
        /// Content type (page, video, document, mcq_group, coding_question)
        kind: Option<ContentKind>,
        /// Content item ID
        id: Option<String>,
    },
    /// Move to the next item
    Next,
    /// Move to the previous item
    Prev,
    /// Mark the current item complete
    Complete,
    /// Reset the current task so its quizzes can be retaken
    Reattempt,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syllabus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Login { token } => {
            let token = token.trim();
            TokenStore::set_token(token)?;
            format!("Token stored ({})", TokenStore::mask_token(token))
        }
        Commands::Logout => {
            TokenStore::delete_token()?;
            "Token removed".to_string()
        }
        Commands::Outline { course } => app()?.outline(&course).await?,
        Commands::Progress { course } => app()?.progress(&course).await?,
        Commands::Open { course, task, kind, id } => {
            app()?.open(&course, Target { task_id: task, kind, id }).await?
        }
        Commands::Next => app()?.next().await?,
        Commands::Prev => app()?.prev().await?,
        Commands::Complete => app()?.complete().await?,
        Commands::Reattempt => app()?.reattempt().await?,
    };

    println!("{output}");
    Ok(())
}

fn app() -> Result<App> {
    let config = Config::load()?;
    App::new(config)
}
