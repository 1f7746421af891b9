//! Paste creation, lookup and removal on top of the storage port.
//!
//! Creation validates every file before any slug is drawn, allocates all
//! identifiers from one [`SlugBatch`], and persists the paste in a single
//! insert. Reads route through the [`ExpiryReaper`] lazy check so expired
//! content is never served.

use crate::config::Config;
use crate::db::{PasteStore, SlugTarget};
use crate::error::AppError;
use crate::expiry::ExpiryReaper;
use crate::models::paste::{ExpiryRequest, File, NewFile, NewPaste, Paste, PasteReceipt};
use crate::render::Renderer;
use crate::slug::{SlugAllocator, SlugBatch, SlugMode};
use crate::validation;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Entry point used by every front end (HTTP, curl form, CLI).
#[derive(Clone)]
pub struct PasteService {
    store: Arc<dyn PasteStore>,
    config: Arc<Config>,
    renderer: Arc<dyn Renderer>,
    allocator: SlugAllocator,
    reaper: ExpiryReaper,
}

/// A file that passed validation and has been rendered.
struct PreparedFile {
    raw: String,
    rendered: String,
    lexer: String,
    filename: Option<String>,
}

impl PasteService {
    pub fn new(store: Arc<dyn PasteStore>, config: Arc<Config>, renderer: Arc<dyn Renderer>) -> Self {
        let allocator = SlugAllocator::new(store.clone(), config.slug_retries, config.slug_min_width);
        let reaper = ExpiryReaper::new(store.clone());
        Self {
            store,
            config,
            renderer,
            allocator,
            reaper,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle to the expiry reaper sharing this service's store.
    pub fn reaper(&self) -> ExpiryReaper {
        self.reaper.clone()
    }

    /// Named expiry choices, in seconds.
    pub fn expiries(&self) -> &BTreeMap<String, u64> {
        &self.config.expiries
    }

    /// Create a paste as of now.
    pub fn create(&self, new_paste: NewPaste) -> Result<PasteReceipt, AppError> {
        self.create_at(new_paste, Utc::now())
    }

    /// Validate, allocate identifiers for, and persist a new paste.
    ///
    /// # Returns
    /// The paste slug, its removal token and every file slug in order.
    ///
    /// # Errors
    /// - [`AppError::Validation`] / [`AppError::Spam`] for rejected content.
    /// - [`AppError::AllocationExhausted`] when no free slug could be drawn.
    /// - Storage errors from the insert.
    pub fn create_at(&self, new_paste: NewPaste, now: DateTime<Utc>) -> Result<PasteReceipt, AppError> {
        if new_paste.files.is_empty() {
            return Err(AppError::Validation("a paste needs at least one file".to_string()));
        }
        let lifetime = self.resolve_expiry(&new_paste.expiry)?;
        let prepared = self.prepare_files(new_paste.files)?;

        let mode = if new_paste.long {
            SlugMode::long()
        } else {
            SlugMode::Adaptive
        };
        let mut batch = self.allocator.batch(mode);

        let mut files = Vec::with_capacity(prepared.len());
        for file in prepared {
            files.push(File {
                slug: batch.next_slug()?,
                paste_slug: String::new(),
                raw: file.raw,
                rendered: file.rendered,
                lexer: file.lexer,
                filename: file.filename,
                created_at: now,
            });
        }
        let mut paste = Paste {
            slug: String::new(),
            removal: batch.removal_token()?,
            created_at: now,
            expires_at: lifetime.map(|lifetime| now + lifetime),
            source: new_paste.source,
            files,
        };
        link_files(&mut paste);

        self.insert_with_retry(&mut paste, &mut batch)?;
        batch.release();

        tracing::info!(
            "Created paste {} with {} file(s) from {}",
            paste.slug,
            paste.files.len(),
            paste.source
        );
        Ok(PasteReceipt::from(&paste))
    }

    /// Map a requested expiry to a lifetime; `None` means "never expires".
    ///
    /// # Errors
    /// [`AppError::Validation`] for names not in the configured table.
    pub fn resolve_expiry(&self, request: &ExpiryRequest) -> Result<Option<Duration>, AppError> {
        let seconds = match request {
            ExpiryRequest::Named(name) => *self
                .config
                .expiries
                .get(name)
                .ok_or_else(|| AppError::Validation(format!("invalid expiry '{}'", name)))?,
            ExpiryRequest::Seconds(seconds) => *seconds,
        };
        if seconds == 0 {
            return Ok(None);
        }
        let seconds = i64::try_from(seconds)
            .map_err(|_| AppError::Validation("expiry is too far in the future".to_string()))?;
        Duration::try_seconds(seconds)
            .map(Some)
            .ok_or_else(|| AppError::Validation("expiry is too far in the future".to_string()))
    }

    fn prepare_files(&self, files: Vec<NewFile>) -> Result<Vec<PreparedFile>, AppError> {
        let mut prepared = Vec::with_capacity(files.len());
        let mut total_size = 0usize;
        for file in files {
            validation::require_content(&file.content)?;
            let lexer =
                validation::resolve_lexer(file.lexer.as_deref(), &self.config.default_lexer)?;
            validation::check_spam(&file.content, self.config.spamscore)?;

            let rendered = self.renderer.render(&file.content, &lexer);
            if rendered.len() > self.config.paste_size {
                return Err(AppError::Validation(format!(
                    "file is too large ({} bytes rendered, limit {})",
                    rendered.len(),
                    self.config.paste_size
                )));
            }
            total_size += rendered.len();

            prepared.push(PreparedFile {
                raw: file.content,
                rendered,
                lexer,
                filename: file.filename.filter(|name| !name.trim().is_empty()),
            });
        }
        if total_size > self.config.paste_size {
            return Err(AppError::Validation(format!(
                "paste is too large ({} bytes rendered, limit {})",
                total_size, self.config.paste_size
            )));
        }
        Ok(prepared)
    }

    /// Insert, replacing whichever slug the store reports as taken.
    fn insert_with_retry(&self, paste: &mut Paste, batch: &mut SlugBatch<'_>) -> Result<(), AppError> {
        let attempts = self.allocator.retries();
        for attempt in 1..=attempts {
            let slug = match self.store.insert(paste) {
                Ok(()) => return Ok(()),
                Err(AppError::StorageConflict { slug }) => slug,
                Err(err) => return Err(err),
            };
            tracing::debug!(
                "Slug {} was taken at commit (attempt {}/{})",
                slug,
                attempt,
                attempts
            );

            if slug == paste.removal {
                paste.removal = batch.removal_token()?;
            } else if let Some(file) = paste.files.iter_mut().find(|file| file.slug == slug) {
                file.slug = batch.replace(&slug)?;
            } else {
                return Err(AppError::StorageMessage(format!(
                    "Store reported a conflict on unrelated slug '{}'",
                    slug
                )));
            }
            link_files(paste);
        }

        tracing::error!(
            "Giving up on paste creation after {} conflicting inserts",
            attempts
        );
        Err(AppError::AllocationExhausted { attempts })
    }

    /// Fetch a paste and all its files.
    pub fn paste(&self, slug: &str) -> Result<Paste, AppError> {
        self.paste_at(slug, Utc::now())
    }

    /// Fetch a live paste as of `now`.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when absent or expired.
    pub fn paste_at(&self, slug: &str, now: DateTime<Utc>) -> Result<Paste, AppError> {
        let paste = self.store.find_paste(slug)?.ok_or(AppError::NotFound)?;
        self.reaper.enforce_not_expired(paste, now)
    }

    /// Fetch one file, provided its paste is still live.
    pub fn file(&self, slug: &str) -> Result<File, AppError> {
        self.file_at(slug, Utc::now())
    }

    /// Fetch one file as of `now`.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the file is absent or its paste expired.
    pub fn file_at(&self, slug: &str, now: DateTime<Utc>) -> Result<File, AppError> {
        let file = self.store.find_file(slug)?.ok_or(AppError::NotFound)?;
        self.paste_at(&file.paste_slug, now)?;
        Ok(file)
    }

    /// Resolve a slug of either kind to its live paste.
    pub fn lookup(&self, slug: &str) -> Result<Paste, AppError> {
        self.lookup_at(slug, Utc::now())
    }

    /// Resolve a slug of either kind to its live paste as of `now`.
    pub fn lookup_at(&self, slug: &str, now: DateTime<Utc>) -> Result<Paste, AppError> {
        match self.store.find_by_slug(slug)? {
            Some(SlugTarget::Paste(paste)) => self.reaper.enforce_not_expired(paste, now),
            Some(SlugTarget::File(file)) => self.paste_at(&file.paste_slug, now),
            None => Err(AppError::NotFound),
        }
    }

    /// Remove the paste owning `token`.
    pub fn remove(&self, token: &str) -> Result<String, AppError> {
        self.remove_at(token, Utc::now())
    }

    /// Remove the live paste owning `token` as of `now`.
    ///
    /// # Returns
    /// The slug of the removed paste.
    ///
    /// # Errors
    /// [`AppError::NotFound`] for unknown tokens and expired pastes.
    pub fn remove_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, AppError> {
        let paste = self
            .store
            .find_by_removal_token(token)?
            .ok_or(AppError::NotFound)?;
        let paste = self.reaper.enforce_not_expired(paste, now)?;
        if !self.store.delete(&paste.slug)? {
            return Err(AppError::NotFound);
        }
        tracing::info!("Removed paste {} by removal token", paste.slug);
        Ok(paste.slug)
    }

    /// Delete a paste by slug, without a removal token.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when nothing was deleted.
    pub fn delete(&self, slug: &str) -> Result<(), AppError> {
        if !self.store.delete(slug)? {
            return Err(AppError::NotFound);
        }
        tracing::info!("Deleted paste {}", slug);
        Ok(())
    }

    /// Run one active expiry sweep as of now.
    pub fn reap(&self) -> Result<usize, AppError> {
        self.reaper.reap(Utc::now())
    }
}

/// Point every file at its paste and give the paste its first file's slug.
fn link_files(paste: &mut Paste) {
    if let Some(first) = paste.files.first() {
        paste.slug = first.slug.clone();
    }
    for file in &mut paste.files {
        file.paste_slug = paste.slug.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::PlainRenderer;
    use crate::test_support::setup_temp_db;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    fn service_over(store: Arc<dyn PasteStore>, config: Config) -> PasteService {
        PasteService::new(store, Arc::new(config), Arc::new(PlainRenderer))
    }

    fn new_file(content: &str) -> NewFile {
        NewFile {
            lexer: None,
            content: content.to_string(),
            filename: None,
        }
    }

    fn submission(files: Vec<NewFile>, expiry: ExpiryRequest) -> NewPaste {
        NewPaste {
            files,
            expiry,
            long: false,
            source: "test".to_string(),
        }
    }

    #[test]
    fn created_paste_round_trips_with_files_in_order() {
        let (db, _temp) = setup_temp_db();
        let service = service_over(Arc::new(db), Config::default());
        let contents = ["first", "second", "third", "fourth"];

        let receipt = service
            .create(submission(
                contents.iter().map(|content| new_file(content)).collect(),
                ExpiryRequest::Named("1day".to_string()),
            ))
            .unwrap();

        assert_eq!(receipt.file_slugs.len(), contents.len());
        assert_eq!(receipt.file_slugs[0], receipt.slug);
        assert_eq!(receipt.removal.len(), 13);

        let paste = service.paste(&receipt.slug).unwrap();
        let raws: Vec<&str> = paste.files.iter().map(|file| file.raw.as_str()).collect();
        assert_eq!(raws, contents);
        assert!(paste.files.iter().all(|file| file.paste_slug == receipt.slug));
        assert!(paste.expires_at.is_some());
        assert_eq!(paste.source, "test");
    }

    #[test]
    fn any_slug_resolves_to_its_paste() {
        let (db, _temp) = setup_temp_db();
        let service = service_over(Arc::new(db), Config::default());
        let receipt = service
            .create(submission(
                vec![new_file("a"), new_file("b")],
                ExpiryRequest::Seconds(0),
            ))
            .unwrap();

        assert_eq!(service.lookup(&receipt.file_slugs[1]).unwrap().slug, receipt.slug);
        assert_eq!(service.file(&receipt.file_slugs[1]).unwrap().raw, "b");
        assert!(service.paste(&receipt.slug).unwrap().expires_at.is_none());
        assert!(matches!(service.lookup("ZZZZZZ"), Err(AppError::NotFound)));
    }

    #[test]
    fn long_slugs_are_fixed_width() {
        let (db, _temp) = setup_temp_db();
        let service = service_over(Arc::new(db), Config::default());
        let mut request = submission(vec![new_file("x")], ExpiryRequest::Seconds(60));
        request.long = true;
        let receipt = service.create(request).unwrap();
        assert_eq!(receipt.slug.len(), 26);
    }

    #[test]
    fn rejected_content_persists_nothing() {
        let (db, _temp) = setup_temp_db();
        let db = Arc::new(db);
        let service = service_over(db.clone(), Config::default());

        let unknown_lexer = NewFile {
            lexer: Some("klingon".to_string()),
            ..new_file("x")
        };
        let cases = vec![
            submission(vec![], ExpiryRequest::Seconds(0)),
            submission(vec![new_file("ok"), new_file("   ")], ExpiryRequest::Seconds(0)),
            submission(vec![unknown_lexer], ExpiryRequest::Seconds(0)),
            submission(vec![new_file("ok")], ExpiryRequest::Named("1century".to_string())),
            submission(
                vec![new_file("http://spam.example/a http://spam.example/b")],
                ExpiryRequest::Seconds(0),
            ),
        ];
        for case in cases {
            assert!(service.create(case).is_err());
        }
        assert_eq!(db.count(crate::EntityKind::Paste).unwrap(), 0);
    }

    #[test]
    fn oversized_pastes_are_rejected() {
        let (db, _temp) = setup_temp_db();
        let config = Config {
            paste_size: 400,
            ..Config::default()
        };
        let service = service_over(Arc::new(db), config);

        let one_big = submission(vec![new_file(&"x".repeat(500))], ExpiryRequest::Seconds(0));
        assert!(matches!(service.create(one_big), Err(AppError::Validation(_))));

        // Each file alone fits, together they do not.
        let many_small = submission(
            vec![new_file("aaaa"), new_file("bbbb"), new_file("cccc")],
            ExpiryRequest::Seconds(0),
        );
        assert!(matches!(service.create(many_small), Err(AppError::Validation(_))));
    }

    #[test]
    fn expired_paste_is_not_found_and_removed() {
        let (db, _temp) = setup_temp_db();
        let db = Arc::new(db);
        let service = service_over(db.clone(), Config::default());
        let created = Utc::now();
        let receipt = service
            .create_at(submission(vec![new_file("brief")], ExpiryRequest::Seconds(1)), created)
            .unwrap();

        assert!(service.paste_at(&receipt.slug, created).is_ok());
        let later = created + Duration::seconds(2);
        assert!(matches!(
            service.paste_at(&receipt.slug, later),
            Err(AppError::NotFound)
        ));
        assert!(db.find_paste(&receipt.slug).unwrap().is_none());
    }

    #[test]
    fn removal_token_deletes_once() {
        let (db, _temp) = setup_temp_db();
        let service = service_over(Arc::new(db), Config::default());
        let receipt = service
            .create(submission(vec![new_file("bye")], ExpiryRequest::Seconds(0)))
            .unwrap();

        assert_eq!(service.remove(&receipt.removal).unwrap(), receipt.slug);
        assert!(matches!(service.paste(&receipt.slug), Err(AppError::NotFound)));
        assert!(matches!(service.remove(&receipt.removal), Err(AppError::NotFound)));
        assert!(matches!(service.delete(&receipt.slug), Err(AppError::NotFound)));
    }

    #[test]
    fn removal_token_of_expired_paste_is_not_found() {
        let (db, _temp) = setup_temp_db();
        let db = Arc::new(db);
        let service = service_over(db.clone(), Config::default());
        let created = Utc::now() - Duration::seconds(10);
        let receipt = service
            .create_at(submission(vec![new_file("gone")], ExpiryRequest::Seconds(1)), created)
            .unwrap();

        assert!(matches!(
            service.remove_at(&receipt.removal, created + Duration::seconds(5)),
            Err(AppError::NotFound)
        ));
        assert!(db.find_paste(&receipt.slug).unwrap().is_none());
        assert!(matches!(service.remove(&receipt.removal), Err(AppError::NotFound)));
    }

    #[test]
    fn removal_before_expiry_still_succeeds() {
        let (db, _temp) = setup_temp_db();
        let service = service_over(Arc::new(db), Config::default());
        let created = Utc::now();
        let receipt = service
            .create_at(submission(vec![new_file("soon")], ExpiryRequest::Seconds(60)), created)
            .unwrap();
        assert_eq!(
            service.remove_at(&receipt.removal, created + Duration::seconds(30)).unwrap(),
            receipt.slug
        );
    }

    /// Store whose first inserts fail with a conflict on a chosen slug position.
    struct ConflictingStore {
        conflicts_left: Mutex<u32>,
        conflict_on_removal: bool,
        attempts: std::sync::atomic::AtomicU32,
        inserted: Mutex<Option<Paste>>,
    }

    impl ConflictingStore {
        fn new(conflicts: u32, conflict_on_removal: bool) -> Self {
            Self {
                conflicts_left: Mutex::new(conflicts),
                conflict_on_removal,
                attempts: std::sync::atomic::AtomicU32::new(0),
                inserted: Mutex::new(None),
            }
        }
    }

    impl PasteStore for ConflictingStore {
        fn count(&self, _kind: crate::EntityKind) -> Result<u64, AppError> {
            Ok(0)
        }

        fn exists(&self, _slug: &str) -> Result<bool, AppError> {
            Ok(false)
        }

        fn insert(&self, paste: &Paste) -> Result<(), AppError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let mut left = self.conflicts_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                let slug = if self.conflict_on_removal {
                    paste.removal.clone()
                } else {
                    paste.slug.clone()
                };
                return Err(AppError::StorageConflict { slug });
            }
            *self.inserted.lock().unwrap() = Some(paste.clone());
            Ok(())
        }

        fn delete(&self, _slug: &str) -> Result<bool, AppError> {
            Ok(false)
        }

        fn find_paste(&self, _slug: &str) -> Result<Option<Paste>, AppError> {
            Ok(None)
        }

        fn find_file(&self, _slug: &str) -> Result<Option<File>, AppError> {
            Ok(None)
        }

        fn find_by_removal_token(&self, _token: &str) -> Result<Option<Paste>, AppError> {
            Ok(None)
        }

        fn find_expired(&self, _now: DateTime<Utc>) -> Result<Vec<Paste>, AppError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn commit_conflict_regenerates_the_offending_slug() {
        let store = Arc::new(ConflictingStore::new(2, false));
        let service = service_over(store.clone(), Config::default());
        let receipt = service
            .create(submission(vec![new_file("a"), new_file("b")], ExpiryRequest::Seconds(0)))
            .unwrap();

        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        let stored = store.inserted.lock().unwrap().clone().expect("inserted");
        assert_eq!(stored.slug, receipt.slug);
        assert_eq!(stored.files[0].slug, stored.slug);
        assert!(stored.files.iter().all(|file| file.paste_slug == stored.slug));
    }

    #[test]
    fn commit_conflict_on_removal_token_draws_a_new_token() {
        let store = Arc::new(ConflictingStore::new(1, true));
        let service = service_over(store.clone(), Config::default());
        let receipt = service
            .create(submission(vec![new_file("a")], ExpiryRequest::Seconds(0)))
            .unwrap();
        assert_eq!(receipt.removal.len(), 13);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn endless_conflicts_exhaust_the_retry_budget() {
        let store = Arc::new(ConflictingStore::new(u32::MAX, false));
        let config = Config {
            slug_retries: 3,
            ..Config::default()
        };
        let service = service_over(store.clone(), config);
        let err = service
            .create(submission(vec![new_file("a")], ExpiryRequest::Seconds(0)))
            .expect_err("never commits");
        assert!(matches!(err, AppError::AllocationExhausted { attempts: 3 }));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        assert!(store.inserted.lock().unwrap().is_none());
    }
}
