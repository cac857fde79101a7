use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use courseforge::model::entity::{Course, CourseGraph};
use courseforge::model::{DbConnection, ModelManager, create_course_graph};
use courseforge::storage::LocalStore;
use courseforge::submission::{
    ContentSubmission, CourseSubmission, FormValue, ModuleSubmission, UploadedFile, validate,
};
use courseforge::utils::uploads::resolve_uploads_dir;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(about = "CLI tool for seeding and inspecting the course DB", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseCommands,
    },
}

/// Course management
#[derive(Subcommand, Debug)]
pub enum CourseCommands {
    Add {
        /// Path to a TOML manifest describing the course
        #[arg(long)]
        manifest: PathBuf,
    },
    List,
    Show {
        #[arg(long)]
        id: Uuid,
    },
}

/// On-disk course description. File entries are local paths resolved against
/// the manifest's directory. Scalars are optional so an incomplete manifest
/// still reaches validation and gets the same messages the form would show.
#[derive(Debug, Deserialize)]
struct CourseManifest {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    feature_video: Option<PathBuf>,
    #[serde(default)]
    modules: Vec<ModuleManifest>,
}

#[derive(Debug, Deserialize)]
struct ModuleManifest {
    title: Option<String>,
    #[serde(default)]
    contents: Vec<ContentManifest>,
}

#[derive(Debug, Deserialize)]
struct ContentManifest {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
    link: Option<String>,
    image: Option<PathBuf>,
    video: Option<PathBuf>,
}

// same trim rules the form decoder applies
fn scalar(value: Option<String>) -> Option<FormValue> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(FormValue::Str(trimmed.to_string()))
    }
}

fn load_upload(base: &Path, path: Option<&Path>) -> std::io::Result<Option<UploadedFile>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let full = base.join(path);
    let bytes = std::fs::read(&full)?;
    let filename = full
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    Ok(UploadedFile::new(filename, bytes))
}

fn to_submission(manifest: CourseManifest, base: &Path) -> std::io::Result<CourseSubmission> {
    let mut submission = CourseSubmission {
        title: scalar(manifest.title),
        description: scalar(manifest.description),
        category: scalar(manifest.category),
        feature_video: load_upload(base, manifest.feature_video.as_deref())?,
        modules: BTreeMap::new(),
    };

    for (module_index, module) in manifest.modules.into_iter().enumerate() {
        let mut entry = ModuleSubmission {
            title: scalar(module.title),
            contents: BTreeMap::new(),
        };

        for (content_index, content) in module.contents.into_iter().enumerate() {
            entry.contents.insert(
                content_index,
                ContentSubmission {
                    kind: scalar(content.kind),
                    text: scalar(content.text),
                    link: scalar(content.link),
                    image: load_upload(base, content.image.as_deref())?,
                    video: load_upload(base, content.video.as_deref())?,
                },
            );
        }

        submission.modules.insert(module_index, entry);
    }

    Ok(submission)
}

fn print_graph(graph: &CourseGraph) {
    let course = graph.course();
    println!("{}  {}", course.id(), course.title());
    if let Some(category) = course.category() {
        println!("category: {category}");
    }
    if let Some(description) = course.description() {
        println!("{description}");
    }
    if let Some(video) = course.feature_video() {
        println!("feature video: {video}");
    }

    for module in graph.modules() {
        println!("{}. {}", module.order_index(), module.title());
        for content in module.contents() {
            let kind = content.kind().map(|k| k.as_str()).unwrap_or("?");
            println!(
                "   {}.{} [{}] {}",
                module.order_index(),
                content.order_index(),
                kind,
                content.data()
            );
        }
    }
}

#[tokio::main]
async fn main() -> courseforge::error::AppResult<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    let db_con = DbConnection::connect(&std::env::var("DATABASE_URL").unwrap())?;
    let mm = ModelManager::new(db_con);

    match args.command {
        Commands::Course { action } => match action {
            CourseCommands::Add { manifest } => {
                let raw = std::fs::read_to_string(&manifest)?;
                let parsed: CourseManifest = match toml::from_str(&raw) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        eprintln!("Manifest does not parse: {e}");
                        std::process::exit(1);
                    }
                };

                let base = manifest.parent().unwrap_or(Path::new("."));
                let submission = to_submission(parsed, base)?;

                let course = match validate(submission) {
                    Ok(course) => course,
                    Err(failure) => {
                        eprintln!("Manifest is invalid:");
                        for error in &failure.errors {
                            eprintln!("  {}: {}", error.field, error.message);
                        }
                        std::process::exit(1);
                    }
                };

                let uploads_dir =
                    std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string());
                let store = LocalStore::new(resolve_uploads_dir(&uploads_dir)?);

                let created = create_course_graph(&mm, &store, course).await?;
                println!("Course created: {}", created.id());
            }

            CourseCommands::List => {
                for course in Course::list(&mm).await? {
                    println!(
                        "{}  {}  {}",
                        course.id(),
                        course.created_at().format("%Y-%m-%d %H:%M"),
                        course.title()
                    );
                }
            }

            CourseCommands::Show { id } => {
                let Some(graph) = Course::find_graph_by_id(&mm, id).await? else {
                    eprintln!("No course with id {id}");
                    std::process::exit(1);
                };
                print_graph(&graph);
            }
        },
    }

    Ok(())
}
