use tessera_core::memory::{
    InMemoryRepository, InMemoryTemplateCatalog, InMemoryTransactionManager,
    RecordingResourceProcessor,
};
use tessera_core::{HandlerType, ResourceId, SessionEnvironment, Template, WriteSession};

pub const SITE: &str = "SiteHandler";
pub const PAGE: &str = "PageHandler";
pub const META: &str = "MetaHandler";
pub const BLOG: &str = "BlogHandler";
pub const ARCHIVE: &str = "ArchiveHandler";
pub const POST: &str = "PostHandler";

/// Handler type from a handler name
#[allow(dead_code)]
pub fn handler(name: &str) -> HandlerType {
    HandlerType::new(name)
}

/// Templates of the test site
///
/// - `site` holds pages in `home`/`footer`, a membership-aware blog in `blog`
///   and a plain archive in `archive`
/// - `blog` and `archive` hold `post` members; a blog also has a `banner`
/// - pages and posts carry an optional `meta` attachment
#[allow(dead_code)]
pub fn templates() -> InMemoryTemplateCatalog {
    InMemoryTemplateCatalog::from_templates([
        Template::resource("site", SITE)
            .with_attachment("home", "page")
            .with_attachment("footer", "page")
            .with_attachment("blog", "blog")
            .with_attachment("archive", "archive"),
        Template::resource("page", PAGE).with_attachment("meta", "meta"),
        Template::resource("meta", META),
        Template::container("blog", BLOG, "post")
            .membership_aware()
            .with_attachment("banner", "meta"),
        Template::container("archive", ARCHIVE, "post"),
        Template::resource("post", POST).with_attachment("meta", "meta"),
    ])
}

#[allow(dead_code)]
pub fn site() -> ResourceId {
    ResourceId::new("s1", "site")
}

#[allow(dead_code)]
pub fn home() -> ResourceId {
    ResourceId::new("home", "page")
}

#[allow(dead_code)]
pub fn news() -> ResourceId {
    ResourceId::new("news", "blog")
}

#[allow(dead_code)]
pub fn archive() -> ResourceId {
    ResourceId::new("old", "archive")
}

#[allow(dead_code)]
pub fn banner() -> ResourceId {
    ResourceId::new("b1", "meta")
}

#[allow(dead_code)]
pub fn post(name: &str) -> ResourceId {
    ResourceId::new(name, "post")
}

/// Seeded repository:
///
/// ```text
/// s1 (site)
/// ├── home  -> home (page)
/// ├── blog  -> news (blog) [b1 in banner; members p1, p2]
/// └── archive -> old (archive) [member a1]
/// ```
#[allow(dead_code)]
pub fn seeded_repository() -> InMemoryRepository {
    let mut repository = InMemoryRepository::new();
    repository.seed_root(site());
    repository.seed_attachment(&site(), "home", home()).unwrap();
    repository.seed_attachment(&site(), "blog", news()).unwrap();
    repository
        .seed_attachment(&site(), "archive", archive())
        .unwrap();
    repository.seed_attachment(&news(), "banner", banner()).unwrap();
    repository.seed_member(&news(), post("p1")).unwrap();
    repository.seed_member(&news(), post("p2")).unwrap();
    repository.seed_member(&archive(), post("a1")).unwrap();
    repository
}

/// Collaborators for one session; inspect them once the session is gone
pub struct Fixture {
    pub repository: InMemoryRepository,
    pub templates: InMemoryTemplateCatalog,
    pub transactions: InMemoryTransactionManager,
    pub processor: RecordingResourceProcessor,
}

#[allow(dead_code)]
impl Fixture {
    pub fn new() -> Self {
        Self {
            repository: seeded_repository(),
            templates: templates(),
            transactions: InMemoryTransactionManager::new(),
            processor: RecordingResourceProcessor::new(),
        }
    }

    pub fn with_processor(processor: RecordingResourceProcessor) -> Self {
        Self {
            processor,
            ..Self::new()
        }
    }

    pub fn session(&mut self) -> WriteSession<'_> {
        WriteSession::open(SessionEnvironment {
            repository: &mut self.repository,
            templates: &self.templates,
            transactions: &mut self.transactions,
            processor: &mut self.processor,
        })
    }
}
