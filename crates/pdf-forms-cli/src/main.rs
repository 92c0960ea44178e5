use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_forms::{
    DirectoryBundle, FieldValues, MemoryBundle, TemplateCatalog, TemplateDescriptor,
    TemplateStore,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pdff", about = "PDF form filling CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the template store from a bundle directory
    Init {
        /// Directory of bundled <name>.pdf templates
        #[arg(long)]
        bundle: PathBuf,

        /// Writable template store directory
        #[arg(long)]
        store: PathBuf,
    },

    /// List known templates
    List {
        /// Template store directory
        #[arg(long)]
        store: PathBuf,

        /// Template catalog (JSON)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Only templates in this category (case-insensitive)
        #[arg(long)]
        category: Option<String>,
    },

    /// Show the fields a template declares
    Fields {
        /// Template store directory
        #[arg(long)]
        store: PathBuf,

        /// Template name
        #[arg(short, long)]
        template: String,
    },

    /// Fill a template and write the flattened result
    Fill {
        /// Template store directory
        #[arg(long)]
        store: PathBuf,

        /// Template catalog (JSON)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Template name
        #[arg(short, long)]
        template: String,

        /// JSON object of field name → value
        #[arg(long)]
        values: PathBuf,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Flatten all form fields of a PDF into page content
    Flatten {
        /// Input PDF file
        #[arg(short, long)]
        input: PathBuf,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Merge PDFs in order
    Merge {
        /// Input PDF files, in output order
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,
    },
}

async fn load_catalog(path: Option<&Path>) -> Result<TemplateCatalog> {
    match path {
        Some(path) => TemplateCatalog::load(path)
            .await
            .with_context(|| format!("loading catalog {}", path.display())),
        None => Ok(TemplateCatalog::new()),
    }
}

/// Store for commands that only read already-seeded templates
fn open_store(store: PathBuf, catalog: TemplateCatalog) -> TemplateStore {
    TemplateStore::new(MemoryBundle::new(), store, catalog)
}

fn print_descriptors(descriptors: &[TemplateDescriptor]) {
    if descriptors.is_empty() {
        println!("No templates");
        return;
    }
    for d in descriptors {
        let status = if d.exists { "" } else { " (missing)" };
        match &d.metadata {
            Some(meta) => println!(
                "{}{} - {} [{}]",
                d.name, status, meta.display_name, meta.category
            ),
            None => println!("{}{}", d.name, status),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { bundle, store } => {
            let store = TemplateStore::new(DirectoryBundle::new(bundle), store, TemplateCatalog::new());
            let report = store.initialize()?;
            println!("Template store: {}", store.store_dir().display());
            println!("  Copied: {}", report.copied.len());
            for name in &report.copied {
                println!("    {}", name);
            }
            println!("  Already present: {}", report.skipped.len());
        }

        Commands::List {
            store,
            catalog,
            category,
        } => {
            let store = open_store(store, load_catalog(catalog.as_deref()).await?);
            let descriptors = match category {
                Some(category) => store.list_by_category(&category)?,
                None => store.list_all()?,
            };
            print_descriptors(&descriptors);
        }

        Commands::Fields { store, template } => {
            let store = open_store(store, TemplateCatalog::new());
            let fields = store.template_fields(&template)?;
            println!("{} field(s) in `{}`:", fields.len(), template);
            for field in fields {
                let mut line = format!("  {} ({})", field.name, field.kind);
                if let Some(rect) = field.rect {
                    line.push_str(&format!(
                        " page {} at {:.1},{:.1} size {:.1}x{:.1}",
                        rect.page, rect.x, rect.y, rect.width, rect.height
                    ));
                }
                if field.required {
                    line.push_str(" required");
                }
                if let Some(unit) = &field.unit {
                    line.push_str(&format!(" unit={}", unit));
                }
                println!("{}", line);
            }
        }

        Commands::Fill {
            store,
            catalog,
            template,
            values,
            output,
        } => {
            let store = open_store(store, load_catalog(catalog.as_deref()).await?);
            let template = store.get_template(&template)?;

            let json = tokio::fs::read(&values)
                .await
                .with_context(|| format!("reading values {}", values.display()))?;
            let json: serde_json::Value = serde_json::from_slice(&json)
                .with_context(|| format!("parsing values {}", values.display()))?;
            let values = FieldValues::from_json(&json)?;
            log::debug!("Read {} field value(s) for `{}`", values.len(), template.name);

            let warnings = pdf_forms::fill_to_path(template.content, values, &output).await?;
            for warning in &warnings {
                println!("warning: {}", warning);
            }
            println!(
                "Filled `{}` → {} ({} warning(s))",
                template.name,
                output.display(),
                warnings.len()
            );
        }

        Commands::Flatten { input, output } => {
            let count = pdf_forms::flatten_to_path(&input, &output).await?;
            println!("Flattened {} widget(s) → {}", count, output.display());
        }

        Commands::Merge { input, output } => {
            let pages = pdf_forms::merge_files(&input, &output).await?;
            println!(
                "Merged {} document(s), {} page(s) → {}",
                input.len(),
                pages,
                output.display()
            );
        }
    }

    Ok(())
}
