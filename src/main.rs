use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use uuid::Uuid;

use groupscholar_career_progress::config::EngineConfig;
use groupscholar_career_progress::db::{self, PgStore, SEED_CAREER};
use groupscholar_career_progress::entry_flow::MemorySession;
use groupscholar_career_progress::navigation::{ClickSource, CompletionChoice, NavigationIntent};
use groupscholar_career_progress::{report, CareerEngine, Error};

#[derive(Parser)]
#[command(name = "career-progress")]
#[command(about = "Career progress engine for Group Scholar learners", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LearnerScope {
    #[arg(long, default_value = SEED_CAREER)]
    career: String,
    #[arg(long)]
    learner: Uuid,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialogChoice {
    Restart,
    View,
    Dismiss,
}

impl From<DialogChoice> for CompletionChoice {
    fn from(choice: DialogChoice) -> Self {
        match choice {
            DialogChoice::Restart => CompletionChoice::Restart,
            DialogChoice::View => CompletionChoice::ViewCourse,
            DialogChoice::Dismiss => CompletionChoice::Dismiss,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a sample career curriculum
    Seed,
    /// Import progress events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show the learner's trajectory and course states
    Trajectory {
        #[command(flatten)]
        scope: LearnerScope,
    },
    /// Describe the course under a chart pointer position
    Hover {
        #[command(flatten)]
        scope: LearnerScope,
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
    },
    /// Resolve a click on a course from the career view
    Click {
        #[command(flatten)]
        scope: LearnerScope,
        #[arg(long)]
        course: String,
        #[arg(long)]
        post: Option<String>,
        /// Answer to the completion dialog of a completed course
        #[arg(long, value_enum)]
        choose: Option<DialogChoice>,
    },
    /// Record that the learner opened a post
    View {
        #[command(flatten)]
        scope: LearnerScope,
        #[arg(long)]
        course: String,
        #[arg(long)]
        post: String,
    },
    /// Mark a post completed (or not, with --undo)
    Complete {
        #[command(flatten)]
        scope: LearnerScope,
        #[arg(long)]
        course: String,
        #[arg(long)]
        post: String,
        #[arg(long)]
        undo: bool,
    },
    /// Clear the learner's progress in a course
    Restart {
        #[command(flatten)]
        scope: LearnerScope,
        #[arg(long)]
        course: String,
    },
    /// Generate a markdown progress report
    Report {
        #[command(flatten)]
        scope: LearnerScope,
        #[arg(long, default_value = "career-report.md")]
        out: PathBuf,
    },
}

async fn load_engine(
    store: &PgStore,
    scope: &LearnerScope,
    config: &EngineConfig,
) -> anyhow::Result<CareerEngine> {
    let engine = CareerEngine::load(
        Arc::new(store.clone()),
        &scope.career,
        scope.learner,
        config.clone(),
        MemorySession::new(),
    )
    .await
    .with_context(|| format!("failed to load career '{}'", scope.career))?;
    Ok(engine)
}

fn course_id(engine: &CareerEngine, slug: &str) -> Result<Uuid, Error> {
    engine
        .curriculum()
        .course_by_slug(slug)
        .map(|course| course.id)
        .ok_or_else(|| Error::UnknownCourse(slug.to_string()))
}

fn post_id(engine: &CareerEngine, course_id: Uuid, slug: &str) -> Result<Uuid, Error> {
    engine
        .curriculum()
        .post_by_slug(course_id, slug)
        .map(|post| post.id)
        .ok_or_else(|| Error::UnknownPost(slug.to_string()))
}

fn describe_intent(engine: &CareerEngine, intent: &NavigationIntent) -> String {
    let curriculum = engine.curriculum();
    let course = curriculum
        .course(intent.course_id())
        .map(|course| course.slug.as_str())
        .unwrap_or("?");
    match intent {
        NavigationIntent::Reject { reason, .. } => format!("Rejected: {course} is {}.", reason.as_str()),
        NavigationIntent::OpenCompletionDialog { .. } => {
            format!("{course} is complete. Choose restart, view or dismiss with --choose.")
        }
        NavigationIntent::OpenContinue { course_id, post_id } => {
            let post = curriculum
                .posts_of(*course_id)
                .iter()
                .find(|post| post.id == *post_id)
                .map(|post| post.slug.as_str())
                .unwrap_or("?");
            format!("Open /{course}/{post}")
        }
        NavigationIntent::OpenAtRoot { .. } => format!("Open /{course}"),
        NavigationIntent::Restart { .. } => format!("Restarted {course}; open /{course}"),
    }
}

fn print_trajectory(engine: &CareerEngine) {
    let view = engine.view();
    println!(
        "Career {}: {:.1}% readiness at {:.1}h of {:.0}h",
        view.career, view.cursor.readiness, view.cursor_hours, view.total_hours
    );
    for course in &view.courses {
        println!(
            "- {} [{}]{} {}/{} posts ({:.2}), weight {:.1}, {:.1}h",
            course.name,
            course.state.label(),
            if course.active { " *" } else { "" },
            course.completed_count,
            course.total_count,
            course.progress_fraction,
            course.contribution,
            course.hours
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool);

    match cli.command {
        Commands::InitDb => {
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(store.pool()).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let applied = db::import_csv(&store, &csv).await?;
            println!("Applied {applied} progress events from {}.", csv.display());
        }
        Commands::Trajectory { scope } => {
            let engine = load_engine(&store, &scope, &config).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&engine.view())?);
            } else {
                print_trajectory(&engine);
            }
        }
        Commands::Hover { scope, x, y } => {
            let mut engine = load_engine(&store, &scope, &config).await?;
            match engine.hover(x, y) {
                Some(descriptor) if cli.json => {
                    println!("{}", serde_json::to_string_pretty(&descriptor)?);
                }
                Some(descriptor) => {
                    let name = engine
                        .curriculum()
                        .course(descriptor.course_id)
                        .map(|course| course.name.as_str())
                        .unwrap_or("?");
                    println!(
                        "{} ({}): {:.1}h, {:.1}% readiness, {}/{} posts, next post {}",
                        name,
                        descriptor.phase.label(),
                        descriptor.hours,
                        descriptor.readiness,
                        descriptor.completed_count,
                        descriptor.total_count,
                        descriptor.next_post_ordinal
                    );
                }
                None => println!("No course under the pointer."),
            }
        }
        Commands::Click {
            scope,
            course,
            post,
            choose,
        } => {
            let mut engine = load_engine(&store, &scope, &config).await?;
            let course_id = course_id(&engine, &course)?;
            let target = post
                .as_deref()
                .map(|slug| post_id(&engine, course_id, slug))
                .transpose()?;

            let mut intent = engine.click(course_id, target, ClickSource::Course)?;
            if let (NavigationIntent::OpenCompletionDialog { .. }, Some(choice)) = (intent, choose) {
                match engine.choose_completion(choice.into()).await? {
                    Some(chosen) => intent = chosen,
                    None => {
                        println!("Dialog dismissed.");
                        return Ok(());
                    }
                }
            }

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&intent)?);
            } else {
                println!("{}", describe_intent(&engine, &intent));
            }
            if let NavigationIntent::Reject { .. } = intent {
                return Err(Error::RejectedNavigation { course }.into());
            }
            info!(entry_flow = ?engine.entry_flow(), "navigation resolved");
        }
        Commands::View {
            scope,
            course,
            post,
        } => {
            let mut engine = load_engine(&store, &scope, &config).await?;
            let course_id = course_id(&engine, &course)?;
            let post_id = post_id(&engine, course_id, &post)?;
            engine.mark_viewed(post_id).await?;
            print_trajectory(&engine);
        }
        Commands::Complete {
            scope,
            course,
            post,
            undo,
        } => {
            let mut engine = load_engine(&store, &scope, &config).await?;
            let course_id = course_id(&engine, &course)?;
            let post_id = post_id(&engine, course_id, &post)?;
            engine.mark_completed(post_id, !undo).await?;
            print_trajectory(&engine);
        }
        Commands::Restart { scope, course } => {
            let mut engine = load_engine(&store, &scope, &config).await?;
            let course_id = course_id(&engine, &course)?;
            engine.restart_course(course_id).await?;
            print_trajectory(&engine);
        }
        Commands::Report { scope, out } => {
            let engine = load_engine(&store, &scope, &config).await?;
            let report = report::build_report(&engine.view(), scope.learner);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
