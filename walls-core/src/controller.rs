//! The interaction loop: turns user actions into session transitions and
//! background work, and folds finished work back into the session.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::WallpaperApplier;
use crate::cache::CacheStore;
use crate::error::{Result, WallsError};
use crate::models::{CacheKind, Purity, PurityCycle, SearchPage, Wallpaper};
use crate::scheduler::{Completion, Group, TaskFailure, WorkerScheduler};
use crate::session::{BrowseMode, NavOutcome, Request, SessionState};
use crate::sources::CatalogSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    Submit(String),
    Next,
    Previous,
    Highlight(usize),
    /// Set the highlighted entry as the desktop background.
    Activate,
    ToggleCacheMode,
    CyclePurity,
    Quit,
}

/// Result of a background task, delivered through the scheduler.
#[derive(Debug)]
pub enum Outcome {
    Searched(Result<SearchPage>),
    CacheListed(Result<Vec<Wallpaper>>),
    Previewed {
        wallpaper: Wallpaper,
        result: Result<Option<PathBuf>>,
    },
    PreviewCleared,
    Applied {
        wallpaper: Wallpaper,
        from_cache: bool,
        result: Result<()>,
    },
}

/// What the preview area currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewPane {
    pub image: Option<PathBuf>,
    pub details: String,
}

/// Draws the session. Called after every action and every fresh completion.
pub trait Presenter: Send {
    fn render(&mut self, session: &SessionState, preview: &PreviewPane);
}

/// Collaborators the controller hands to background tasks.
#[derive(Clone)]
pub struct Services {
    pub source: Arc<dyn CatalogSource>,
    pub store: Arc<CacheStore>,
    pub applier: Arc<dyn WallpaperApplier>,
}

pub struct Controller<P> {
    session: SessionState,
    preview: PreviewPane,
    scheduler: WorkerScheduler<Outcome>,
    completions: mpsc::UnboundedReceiver<Completion<Outcome>>,
    services: Services,
    purity_cycle: PurityCycle,
    presenter: P,
}

impl<P: Presenter> Controller<P> {
    /// Must be called from within a tokio runtime.
    pub fn new(services: Services, purity: Purity, purity_cycle: PurityCycle, presenter: P) -> Self {
        let (scheduler, completions) = WorkerScheduler::new();
        let session = SessionState::new(purity, services.source.has_api_key());
        Self {
            session,
            preview: PreviewPane::default(),
            scheduler,
            completions,
            services,
            purity_cycle,
            presenter,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn preview(&self) -> &PreviewPane {
        &self.preview
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub async fn run(mut self, mut actions: mpsc::Receiver<UserAction>) {
        info!(source = self.services.source.name(), applier = self.services.applier.name(), "browser started");
        self.render();

        loop {
            tokio::select! {
                action = actions.recv() => {
                    let Some(action) = action else {
                        debug!("action channel closed");
                        break;
                    };
                    if self.handle(action).is_break() {
                        break;
                    }
                }
                Some(completion) = self.completions.recv() => {
                    self.on_completion(completion);
                }
            }
        }

        info!("browser stopped");
    }

    pub fn handle(&mut self, action: UserAction) -> ControlFlow<()> {
        debug!(?action, "user action");
        match action {
            UserAction::Quit => return ControlFlow::Break(()),
            UserAction::Submit(text) => {
                if let Some(request) = self.session.submit_query(&text) {
                    self.dispatch(request);
                }
            }
            UserAction::Next => {
                let nav = self.session.next();
                self.navigate(nav);
            }
            UserAction::Previous => {
                let nav = self.session.previous();
                self.navigate(nav);
            }
            UserAction::Highlight(index) => {
                if let Some(wallpaper) = self.session.highlight(index) {
                    self.show_preview(wallpaper);
                }
            }
            UserAction::Activate => self.apply_selected(),
            UserAction::ToggleCacheMode => {
                if let Some(request) = self.session.toggle_cache_mode() {
                    self.dispatch(request);
                }
                match self.session.selected().cloned() {
                    Some(wallpaper) => self.show_preview(wallpaper),
                    None => self.clear_preview(),
                }
            }
            UserAction::CyclePurity => {
                let purity = self.session.cycle_purity(&self.purity_cycle);
                info!(%purity, "purity filter changed");
            }
        }
        self.render();
        ControlFlow::Continue(())
    }

    /// Fold a finished task into the session, unless a newer submission to
    /// the same group has superseded it.
    pub fn on_completion(&mut self, completion: Completion<Outcome>) {
        if !self.scheduler.is_current(&completion) {
            debug!(
                group = %completion.group,
                generation = completion.generation,
                "discarding stale completion"
            );
            return;
        }

        let group = completion.group;
        match completion.outcome {
            Ok(outcome) => self.absorb(outcome),
            Err(failure) => self.task_failed(group, &failure),
        }
        self.render();
    }

    fn absorb(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Searched(Ok(page)) => {
                info!(
                    results = page.wallpapers.len(),
                    page = page.meta.current_page,
                    last_page = page.meta.last_page,
                    "search loaded"
                );
                match self.session.search_loaded(page) {
                    Some(first) => self.show_preview(first),
                    None => self.clear_preview(),
                }
            }
            Outcome::Searched(Err(e)) => {
                warn!("search failed: {e}");
                self.session.search_failed(&e);
            }
            Outcome::CacheListed(Ok(listing)) => {
                if self.session.mode() != BrowseMode::CacheBrowse {
                    debug!("cache listing arrived after leaving cache mode");
                    return;
                }
                match self.session.cache_listed(listing) {
                    Some(first) => self.show_preview(first),
                    None => self.clear_preview(),
                }
            }
            Outcome::CacheListed(Err(e)) => {
                warn!("cache listing failed: {e}");
                self.session.report_error(&e);
            }
            Outcome::Previewed { wallpaper, result } => {
                self.preview = match result {
                    Ok(image) => PreviewPane {
                        image,
                        details: wallpaper.details(),
                    },
                    Err(e) => {
                        debug!(id = %wallpaper.id, "preview failed: {e}");
                        PreviewPane {
                            image: None,
                            details: format!("{}\nError: {e}", wallpaper.details()),
                        }
                    }
                };
            }
            Outcome::PreviewCleared => {}
            Outcome::Applied {
                wallpaper,
                from_cache,
                result,
            } => match result {
                Ok(()) => {
                    info!(id = %wallpaper.id, from_cache, "wallpaper set");
                    self.session.applied(&wallpaper, from_cache);
                }
                Err(e) => {
                    warn!(id = %wallpaper.id, "failed to set wallpaper: {e}");
                    self.session.report_error(&e);
                }
            },
        }
    }

    fn task_failed(&mut self, group: Group, failure: &TaskFailure) {
        match group {
            Group::Apply => self
                .session
                .set_status(format!("Wallpaper set failed: {failure}")),
            Group::Search => self.session.search_aborted(&failure.to_string()),
            Group::Preview => self
                .session
                .set_status(format!("Error: {group} task failed: {failure}")),
        }
    }

    fn navigate(&mut self, nav: NavOutcome) {
        match nav {
            NavOutcome::Stay => {}
            NavOutcome::Dispatch(request) => self.dispatch(request),
            NavOutcome::Preview(wallpaper) => self.show_preview(wallpaper),
        }
    }

    fn dispatch(&mut self, request: Request) {
        match request {
            Request::Search(search) => {
                info!(query = %search.query, page = search.page, purity = %search.purity, "searching");
                let source = Arc::clone(&self.services.source);
                self.scheduler.submit(Group::Search, async move {
                    Outcome::Searched(source.search(&search.query, search.purity, search.page).await)
                });
            }
            Request::ListCache => {
                let store = Arc::clone(&self.services.store);
                self.scheduler.submit(Group::Search, async move {
                    let listing = tokio::task::spawn_blocking(move || store.list_cached())
                        .await
                        .unwrap_or_else(|e| Err(WallsError::Io(std::io::Error::other(e))));
                    Outcome::CacheListed(listing)
                });
            }
        }
    }

    fn show_preview(&mut self, wallpaper: Wallpaper) {
        let store = Arc::clone(&self.services.store);
        self.scheduler.submit(Group::Preview, async move {
            let result = load_preview(&store, &wallpaper).await;
            Outcome::Previewed { wallpaper, result }
        });
    }

    /// Blank the pane and make sure no older preview lands on top of it.
    fn clear_preview(&mut self) {
        self.preview = PreviewPane::default();
        self.scheduler
            .submit(Group::Preview, async { Outcome::PreviewCleared });
    }

    fn apply_selected(&mut self) {
        let Some(wallpaper) = self.session.begin_apply() else {
            return;
        };
        let from_cache = self.session.mode() == BrowseMode::CacheBrowse;
        let store = Arc::clone(&self.services.store);
        let applier = Arc::clone(&self.services.applier);
        self.scheduler.submit(Group::Apply, async move {
            let result = set_wallpaper(&store, applier.as_ref(), &wallpaper, from_cache).await;
            Outcome::Applied {
                wallpaper,
                from_cache,
                result,
            }
        });
    }

    fn render(&mut self) {
        self.presenter.render(&self.session, &self.preview);
    }
}

async fn load_preview(store: &CacheStore, wallpaper: &Wallpaper) -> Result<Option<PathBuf>> {
    if wallpaper.is_cached_entry() {
        return existing_file(&wallpaper.full_url).await.map(Some);
    }
    if wallpaper.thumb_url.is_empty() {
        return Ok(None);
    }
    store.fetch(wallpaper, CacheKind::Thumbnail).await.map(Some)
}

async fn set_wallpaper(
    store: &CacheStore,
    applier: &dyn WallpaperApplier,
    wallpaper: &Wallpaper,
    from_cache: bool,
) -> Result<()> {
    let path = if from_cache {
        existing_file(&wallpaper.full_url).await?
    } else {
        store.fetch(wallpaper, CacheKind::Full).await?
    };
    applier.apply(&path).await
}

async fn existing_file(location: &str) -> Result<PathBuf> {
    let path = PathBuf::from(location);
    match tokio::fs::try_exists(&path).await {
        Ok(true) => Ok(path),
        _ => Err(WallsError::FileNotFound(path)),
    }
}
