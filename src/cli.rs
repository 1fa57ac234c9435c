use clap::{Args, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::path::PathBuf;
use std::time::Duration;

use facefolio_protocol::api::{ImageFilter, PersonSort, SortOrder};
use facefolio_protocol::common::{Image, ImageId, Person, PersonId};

use crate::browse::BrowseSession;
use crate::client::{ApiClient, HttpClient};
use crate::collection::PageRequest;
use crate::config::{Config, ConfigService};
use crate::error::{FolioError, Result};
use crate::gallery::{ImageGallery, PeopleDirectory, TracingNotifier};
use crate::image::ImageService;
use crate::person::PersonService;
use crate::stats::StatsService;
use crate::ui::UI;
use crate::upload::UploadService;
use crate::version::format_version_info;

#[derive(Subcommand)]
pub enum Commands {
    /// List images
    #[command(aliases = &["ls"])]
    Images(ImagesArgs),

    /// List images with faces nobody has been assigned to
    Unidentified(PageArgs),

    /// List people
    People(PeopleArgs),

    /// Show or manage one person
    Person {
        #[command(subcommand)]
        command: PersonCommand,
    },

    /// Show or manage one image
    Image {
        #[command(subcommand)]
        command: ImageCommand,
    },

    /// Upload image files or directories
    #[command(aliases = &["up"])]
    Upload(UploadArgs),

    /// Show library statistics
    Stats,

    /// Check the server connection
    #[command(aliases = &["st"])]
    Status,

    /// Browse images and people interactively
    Browse,

    /// Configure settings
    #[command(aliases = &["cfg"])]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    #[arg(short, long, default_value_t = 1)]
    pub page: u32,

    /// Items per page (defaults to the configured page size)
    #[arg(long)]
    pub per_page: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct ImagesArgs {
    /// all, identified or unidentified
    #[arg(short, long, default_value = "all")]
    pub filter: ImageFilter,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Args, Debug, Clone)]
pub struct PeopleArgs {
    #[arg(short, long)]
    pub search: Option<String>,

    /// name, created_at or image_count
    #[arg(long, default_value = "name")]
    pub sort: PersonSort,

    #[arg(long, default_value = "asc")]
    pub order: SortOrder,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PersonCommand {
    /// Show a person and their images
    Show {
        id: String,
        #[command(flatten)]
        page: PageArgs,
    },
    Create {
        name: String,
    },
    Rename {
        id: String,
        name: String,
    },
    Delete {
        id: String,
        /// Delete the person's images too instead of unassigning them
        #[arg(long)]
        delete_images: bool,
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ImageCommand {
    Show {
        id: String,
    },
    Delete {
        id: String,
        #[arg(short, long)]
        force: bool,
    },
    /// Assign an image to a person
    Assign {
        id: String,
        person_id: String,
    },
    Unassign {
        id: String,
    },
    /// Run face detection again
    Reprocess {
        id: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    Show,
    SetEndpoint { url: String },
    SetTimeout { seconds: u64 },
    SetPageSize { size: u32 },
    SetVerbose { enabled: String },
    Reset,
}

/// CLI handler for processing commands
pub struct CliHandler {
    config: Config,
    config_path: Option<PathBuf>,
    ui: UI,
}

impl CliHandler {
    /// Create a handler, loading settings from `config_path` or the default location
    pub async fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config = match &config_path {
            Some(path) => Config::load_from(path).await?,
            None => Config::load().await?,
        };

        Ok(Self {
            config,
            config_path,
            ui: UI::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn client(&self) -> Result<HttpClient> {
        HttpClient::new(self.config.to_client_config()?)
    }

    fn page_request(&self, args: &PageArgs) -> PageRequest {
        PageRequest::new(args.per_page.unwrap_or(self.config.per_page)).with_page(args.page)
    }

    /// Execute a CLI command
    pub async fn execute(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Images(args) => {
                let request = self.page_request(&args.page).with_filter(args.filter);
                self.handle_images(request).await
            }
            Commands::Unidentified(args) => {
                let request = self
                    .page_request(&args)
                    .with_filter(ImageFilter::Unidentified);
                self.handle_images(request).await
            }
            Commands::People(args) => self.handle_people(args).await,
            Commands::Person { command } => self.handle_person(command).await,
            Commands::Image { command } => self.handle_image(command).await,
            Commands::Upload(args) => self.handle_upload(args).await,
            Commands::Stats => self.handle_stats().await,
            Commands::Status => self.handle_status().await,
            Commands::Browse => self.handle_browse().await,
            Commands::Config(args) => self.handle_config(args).await,
        }
    }

    async fn handle_images(&mut self, request: PageRequest) -> Result<()> {
        let client = self.client()?;
        let mut gallery = ImageGallery::new(&client, &TracingNotifier, request);
        gallery.open().await?;

        let collection = gallery.collection();
        self.ui.header(&gallery.title());
        self.ui.image_table(collection.items());
        self.ui.page_footer(
            collection.page(),
            collection.total_pages(),
            collection.total_count(),
        );
        Ok(())
    }

    async fn handle_people(&mut self, args: PeopleArgs) -> Result<()> {
        let client = self.client()?;
        let mut request = self.page_request(&args.page);
        if let Some(term) = &args.search {
            request = request.with_search(term);
        }

        let mut directory = PeopleDirectory::new(&client, &TracingNotifier, request)
            .with_sort(args.sort, args.order);
        directory.open().await?;

        let collection = directory.collection();
        self.ui.header("People");
        self.ui.people_table(collection.items());
        self.ui.page_footer(
            collection.page(),
            collection.total_pages(),
            collection.total_count(),
        );
        Ok(())
    }

    async fn handle_person(&mut self, command: PersonCommand) -> Result<()> {
        let client = self.client()?;
        let service = PersonService::new(&client);

        match command {
            PersonCommand::Show { id, page } => {
                let request = self.page_request(&page);
                let mut gallery =
                    ImageGallery::for_person(&client, &TracingNotifier, PersonId::new(id), request);
                gallery.open().await?;

                if let Some(person) = gallery.person() {
                    self.print_person(person);
                }
                let collection = gallery.collection();
                self.ui.image_table(collection.items());
                self.ui.page_footer(
                    collection.page(),
                    collection.total_pages(),
                    collection.total_count(),
                );
            }
            PersonCommand::Create { name } => {
                let person = service.create(&name).await?;
                self.ui
                    .success(&format!("Created {} ({})", person.name, person.id));
            }
            PersonCommand::Rename { id, name } => {
                let person = service.rename(&PersonId::new(id), &name).await?;
                self.ui.success(&format!("Renamed to {}", person.name));
            }
            PersonCommand::Delete {
                id,
                delete_images,
                force,
            } => {
                let person_id = PersonId::new(id);
                let prompt = if delete_images {
                    format!("Delete person {} and all of their images?", person_id)
                } else {
                    format!("Delete person {}? Their images will be unassigned", person_id)
                };
                if !confirm(&prompt, force)? {
                    self.ui.info("Deletion cancelled");
                    return Ok(());
                }
                let message = service.delete(&person_id, delete_images).await?;
                self.ui.success(&message);
            }
        }
        Ok(())
    }

    async fn handle_image(&mut self, command: ImageCommand) -> Result<()> {
        let client = self.client()?;
        let service = ImageService::new(&client);

        match command {
            ImageCommand::Show { id } => {
                let image = service.get(&ImageId::new(id)).await?;
                self.print_image(&image);
            }
            ImageCommand::Delete { id, force } => {
                let image_id = ImageId::new(id);
                if !confirm(&format!("Delete image {}?", image_id), force)? {
                    self.ui.info("Deletion cancelled");
                    return Ok(());
                }
                let message = service.delete(&image_id).await?;
                self.ui.success(&message);
            }
            ImageCommand::Assign { id, person_id } => {
                let person_id = PersonId::new(person_id);
                let (_, message) = service.assign(&ImageId::new(id), Some(&person_id)).await?;
                self.ui.success(&message);
            }
            ImageCommand::Unassign { id } => {
                let (_, message) = service.assign(&ImageId::new(id), None).await?;
                self.ui.success(&message);
            }
            ImageCommand::Reprocess { id } => {
                let result = service.reprocess(&ImageId::new(id)).await?;
                let matched = result
                    .matched_person
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string());
                self.ui.card(
                    "Reprocessed",
                    vec![
                        ("Faces detected", result.faces_detected.to_string()),
                        ("Matched person", matched),
                    ],
                );
            }
        }
        Ok(())
    }

    async fn handle_upload(&mut self, args: UploadArgs) -> Result<()> {
        let client = self.client()?;
        let service = UploadService::new(&client, !args.no_progress);
        let summary = service.upload_paths(&args.paths).await?;

        for result in &summary.results {
            if result.success {
                let matched = result
                    .matched_person
                    .as_ref()
                    .map(|p| format!(", matched {}", p))
                    .unwrap_or_default();
                self.ui.success(&format!(
                    "{}: {} face(s){}",
                    result.filename, result.faces_detected, matched
                ));
            } else {
                self.ui.error(&format!(
                    "{}: {}",
                    result.filename,
                    result.error.as_deref().unwrap_or("upload failed")
                ));
            }
        }
        self.ui.blank_line();
        self.ui.info(&summary.describe());
        if summary.failed() > 0 && summary.succeeded() > 0 {
            self.ui
                .warning(&format!("{} file(s) were not uploaded", summary.failed()));
        }

        if summary.succeeded() == 0 {
            return Err(FolioError::upload("No files were uploaded"));
        }
        Ok(())
    }

    async fn handle_stats(&mut self) -> Result<()> {
        let client = self.client()?;
        let service = StatsService::new(&client);
        let stats = service.dashboard().await?;

        self.ui.card(
            "Library",
            vec![
                ("Images", stats.total_images.to_string()),
                ("People", stats.total_people.to_string()),
                ("Identified images", stats.identified_images.to_string()),
                ("Unidentified faces", stats.unidentified_faces.to_string()),
                (
                    "Identification rate",
                    format!("{:.1}%", stats.identification_rate),
                ),
            ],
        );

        let top_people = service.people_summary().await?;
        if !top_people.is_empty() {
            self.ui.header("Top people");
            self.ui.people_table(&top_people);
        }

        let recent = service.recent().await?;
        if !recent.is_empty() {
            self.ui.header("Recent uploads");
            self.ui.image_table(&recent);
        }

        let unidentified = service.unidentified().await?;
        if !unidentified.is_empty() {
            self.ui.header("Waiting for a name");
            self.ui.image_table(&unidentified);
        }
        Ok(())
    }

    async fn handle_status(&mut self) -> Result<()> {
        let client = self.client()?;
        let endpoint = client.config().base_url.clone();

        let server = match StatsService::new(&client).health().await {
            Ok(health) => {
                let detail = health.message.unwrap_or(health.status);
                format!("{} ({})", self.ui.format_server_status(true), detail)
            }
            Err(e) => format!("{} ({})", self.ui.format_server_status(false), e),
        };

        self.ui.card(
            "Status",
            vec![
                ("Version", format_version_info()),
                ("Endpoint", endpoint),
                ("Server", server),
            ],
        );
        Ok(())
    }

    async fn handle_browse(&mut self) -> Result<()> {
        let client = self.client()?;
        let session = BrowseSession::new(
            &client,
            self.config.per_page,
            Duration::from_secs(self.config.cache_ttl),
        );
        session.run().await
    }

    async fn handle_config(&mut self, args: ConfigArgs) -> Result<()> {
        let mut service = match self.config_path.clone() {
            Some(path) => ConfigService::with_config_path(self.config.clone(), path),
            None => ConfigService::new(self.config.clone()),
        };
        service.handle_config(args.command).await?;
        self.config = service.config().clone();
        Ok(())
    }

    fn print_person(&self, person: &Person) {
        self.ui.card(
            &person.name,
            vec![
                ("ID", person.id.to_string()),
                ("Images", person.image_count.to_string()),
                ("Created", format_timestamp(person.created_at)),
            ],
        );
    }

    fn print_image(&self, image: &Image) {
        let owner = match (&image.person, &image.person_id) {
            (Some(person), _) => format!("{} ({})", person.name, person.id),
            (None, Some(id)) => id.to_string(),
            (None, None) => "-".to_string(),
        };
        self.ui.card(
            image.display_name(),
            vec![
                ("ID", image.id.to_string()),
                ("URL", image.url.clone()),
                ("Faces", image.face_count.to_string()),
                ("Status", self.ui.format_identity(image)),
                ("Person", owner),
                ("Uploaded", format_timestamp(image.created_at)),
            ],
        );
    }
}

/// Ask before a destructive action unless `force` is set
pub fn confirm(prompt: &str, force: bool) -> Result<bool> {
    if force {
        return Ok(true);
    }
    let proceed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    Ok(proceed)
}

pub fn format_timestamp(timestamp: Option<chrono::NaiveDateTime>) -> String {
    timestamp
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::test_helpers::*;

    #[tokio::test]
    async fn test_handler_loads_config_from_path() {
        let dir = create_temp_dir();
        let path = dir.path().join("config.json");
        Config {
            per_page: 7,
            ..Config::default()
        }
        .save(&path)
        .await
        .unwrap();

        let handler = CliHandler::new(Some(path)).await.unwrap();
        assert_eq!(handler.config().per_page, 7);

        let request = handler.page_request(&PageArgs {
            page: 3,
            per_page: None,
        });
        assert_eq!(request.per_page, 7);
        assert_eq!(request.page, 3);
    }

    #[test]
    fn test_confirm_with_force_skips_prompt() {
        assert!(confirm("Delete?", true).unwrap());
    }

    #[test]
    fn test_format_timestamp() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0);
        assert_eq!(format_timestamp(ts), "2024-05-01 09:30");
        assert_eq!(format_timestamp(None), "-");
    }
}
