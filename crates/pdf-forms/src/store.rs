//! Template storage
//!
//! Templates ship in a read-only bundle and are copied once into a writable store
//! directory, one `<name>.pdf` file per template. After seeding, the store is the
//! only source the engine reads templates from.

use crate::catalog::{TemplateCatalog, TemplateMetadata};
use crate::fields::field_definitions;
use crate::types::*;
use lopdf::Document;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

const TEMPLATE_EXTENSION: &str = "pdf";

/// Read-only source of template bytes
pub trait TemplateBundle: Send + Sync {
    /// Names of every template in the bundle
    fn names(&self) -> io::Result<Vec<String>>;

    /// Byte content of one template
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;
}

/// A directory of `<name>.pdf` files
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateBundle for DirectoryBundle {
    fn names(&self) -> io::Result<Vec<String>> {
        pdf_names_in(&self.root)
    }

    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(template_file(&self.root, name))
    }
}

/// Templates embedded in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryBundle {
    templates: BTreeMap<String, Vec<u8>>,
}

impl MemoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.templates.insert(name.into(), content.into());
    }
}

impl TemplateBundle for MemoryBundle {
    fn names(&self) -> io::Result<Vec<String>> {
        Ok(self.templates.keys().cloned().collect())
    }

    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        self.templates.get(name).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("template `{}` is not in the bundle", name),
            )
        })
    }
}

/// Outcome of seeding the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Templates copied from the bundle
    pub copied: Vec<String>,
    /// Templates already present and left untouched
    pub skipped: Vec<String>,
}

/// One entry of the store listing
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub metadata: Option<TemplateMetadata>,
    /// Whether the template's bytes are present in the store
    pub exists: bool,
}

/// A template read from the store
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub content: Vec<u8>,
    pub metadata: Option<TemplateMetadata>,
}

/// Named templates backed by a writable directory
pub struct TemplateStore {
    bundle: Box<dyn TemplateBundle>,
    store_dir: PathBuf,
    catalog: TemplateCatalog,
}

impl TemplateStore {
    pub fn new(
        bundle: impl TemplateBundle + 'static,
        store_dir: impl Into<PathBuf>,
        catalog: TemplateCatalog,
    ) -> Self {
        Self {
            bundle: Box::new(bundle),
            store_dir: store_dir.into(),
            catalog,
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Path a template has (or would have) in the store
    pub fn template_path(&self, name: &str) -> PathBuf {
        template_file(&self.store_dir, name)
    }

    /// Copy every bundled template that is not yet in the store.
    ///
    /// Existing files are never overwritten, so calling this again is a no-op.
    pub fn initialize(&self) -> Result<SeedReport> {
        fs::create_dir_all(&self.store_dir).map_err(|source| FormError::TemplateInitialization {
            path: self.store_dir.clone(),
            source,
        })?;

        let mut names = self
            .bundle
            .names()
            .map_err(|source| FormError::TemplateInitialization {
                path: self.store_dir.clone(),
                source,
            })?;
        names.sort();
        names.dedup();

        let mut report = SeedReport::default();
        for name in names {
            let target = self.template_path(&name);
            let init_error = |source: io::Error| FormError::TemplateInitialization {
                path: target.clone(),
                source,
            };

            validate_name(&name).map_err(init_error)?;
            if target.exists() {
                log::debug!("Template `{}` already in store, skipping", name);
                report.skipped.push(name);
                continue;
            }

            let content = self.bundle.read(&name).map_err(init_error)?;
            self.write_atomically(&target, &content).map_err(init_error)?;
            log::debug!("Seeded template `{}` ({} bytes)", name, content.len());
            report.copied.push(name);
        }

        log::info!(
            "Template store seeded: {} copied, {} skipped",
            report.copied.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Write through a temp file in the store so readers never see a partial template
    fn write_atomically(&self, target: &Path, content: &[u8]) -> io::Result<()> {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = self.store_dir.join(format!(
            ".{}.{}-{}.tmp",
            file_name,
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&temp, content)?;
        if let Err(e) = fs::rename(&temp, target) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        Ok(())
    }

    /// Read a template's bytes from the store
    pub fn get_template(&self, name: &str) -> Result<Template> {
        if validate_name(name).is_err() {
            return Err(FormError::TemplateNotFound(name.to_string()));
        }

        let content = match fs::read(self.template_path(name)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FormError::TemplateNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Template {
            name: name.to_string(),
            content,
            metadata: self.catalog.get(name).cloned(),
        })
    }

    /// Registered metadata for a template
    pub fn get_metadata(&self, name: &str) -> Result<TemplateMetadata> {
        self.catalog
            .get(name)
            .cloned()
            .ok_or_else(|| FormError::TemplateNotFound(name.to_string()))
    }

    /// Every known template: catalog entries plus any template file in the store,
    /// sorted by name. Each call reads the store afresh.
    pub fn list_all(&self) -> Result<Vec<TemplateDescriptor>> {
        let stored: BTreeSet<String> = match pdf_names_in(&self.store_dir) {
            Ok(names) => names.into_iter().collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => return Err(e.into()),
        };

        let mut names: BTreeSet<String> = self.catalog.names().map(str::to_string).collect();
        names.extend(stored.iter().cloned());

        Ok(names
            .into_iter()
            .map(|name| TemplateDescriptor {
                path: self.template_path(&name),
                metadata: self.catalog.get(&name).cloned(),
                exists: stored.contains(&name),
                name,
            })
            .collect())
    }

    /// Templates whose category matches, ignoring case
    pub fn list_by_category(&self, category: &str) -> Result<Vec<TemplateDescriptor>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|d| d.metadata.as_ref().is_some_and(|m| m.in_category(category)))
            .collect())
    }

    /// Field definitions declared by a stored template
    pub fn template_fields(&self, name: &str) -> Result<Vec<FieldDefinition>> {
        let template = self.get_template(name)?;
        let doc = Document::load_mem(&template.content)?;
        field_definitions(&doc)
    }
}

fn template_file(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, TEMPLATE_EXTENSION))
}

/// Stems of the `.pdf` files directly inside `dir`, sorted
fn pdf_names_in(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        // Exact match: lookups always build `<name>.pdf`
        let is_pdf = path.extension().is_some_and(|ext| ext == TEMPLATE_EXTENSION);
        let stem = path.file_stem().and_then(|s| s.to_str());
        if let (true, Some(stem)) = (is_pdf, stem) {
            if !stem.starts_with('.') {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Template names map to a single file in the store directory
fn validate_name(name: &str) -> io::Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid template name `{}`", name),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("job_card").is_ok());
        assert!(validate_name("Job Card 2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../escape").is_err());
        assert!(validate_name("nested/name").is_err());
        assert!(validate_name(".hidden").is_err());
    }

    #[test]
    fn test_memory_bundle_read() {
        let bundle = MemoryBundle::new().with_template("a", b"%PDF".to_vec());
        assert_eq!(bundle.names().unwrap(), vec!["a".to_string()]);
        assert_eq!(bundle.read("a").unwrap(), b"%PDF");
        assert_eq!(bundle.read("b").unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
