// src/app/mod.rs — window state, background catalogue load, frame loop

// ---- Standard lib imports ----
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

// ---- Crates ----
use eframe::egui as eg;
use tracing::{error, info};

// ---- Local modules ----
pub mod detail;
pub mod filters;
pub mod results;
pub mod stats;
pub mod types;

use crate::catalogue::{Catalogue, CatalogueStats};
use crate::config::AppConfig;
use crate::discovery::{Discovery, FilterChoices, MovieDetail};
use crate::notice::{Notice, NoticeLevel};
use crate::query::SearchResult;
use filters::FilterState;
use types::{BootPhase, CatalogueMsg};

// ---- Tunables ----
const MAX_NOTICES_KEPT: usize = 50;
const MAX_MSGS_PER_FRAME: usize = 16;

pub struct ReelQuestApp {
    discovery: Option<Arc<Discovery>>,
    startup_error: Option<String>,

    // catalogue
    boot_phase: BootPhase,
    catalogue_rx: Option<Receiver<CatalogueMsg>>,
    catalogue: Option<Arc<Catalogue>>,
    choices: FilterChoices,
    stats: Option<CatalogueStats>,

    // search
    filters: FilterState,
    results: Arc<Vec<SearchResult>>,
    dirty: bool,

    // detail
    selected: Option<MovieDetail>,

    // status bar
    status_message: String,
    notices: Vec<Notice>,
    show_notices: bool,

    did_init: bool,
}

impl ReelQuestApp {
    pub fn new(cfg: AppConfig) -> Self {
        let (discovery, startup_error) = match Discovery::from_config(&cfg) {
            Ok(d) => (Some(Arc::new(d)), None),
            Err(e) => {
                error!("warehouse unavailable: {e}");
                (None, Some(e.to_string()))
            }
        };
        Self {
            discovery,
            startup_error,

            boot_phase: BootPhase::Starting,
            catalogue_rx: None,
            catalogue: None,
            choices: FilterChoices::default(),
            stats: None,

            filters: FilterState::default(),
            results: Arc::new(Vec::new()),
            dirty: true,

            selected: None,

            status_message: String::new(),
            notices: Vec::new(),
            show_notices: false,

            did_init: false,
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn set_status<S: Into<String>>(&mut self, s: S) {
        self.status_message = s.into();
    }

    /// One-shot catalogue load on a worker thread; results arrive via `poll_catalogue`.
    fn start_catalogue_load(&mut self) {
        let Some(discovery) = self.discovery.clone() else {
            return;
        };
        let (tx, rx) = mpsc::channel::<CatalogueMsg>();
        self.catalogue_rx = Some(rx);
        self.boot_phase = BootPhase::Loading;

        std::thread::spawn(move || {
            let send = |m: CatalogueMsg| {
                let _ = tx.send(m);
            };
            send(CatalogueMsg::Info("Loading movie catalogue…".into()));
            match discovery.catalogue() {
                Some(cat) => send(CatalogueMsg::Done(cat)),
                None => send(CatalogueMsg::Error(
                    "Catalogue unavailable; filters and details are disabled.".into(),
                )),
            }
        });
    }

    fn poll_catalogue(&mut self, ctx: &eg::Context) {
        use std::sync::mpsc::TryRecvError;

        let mut seen_any = false;
        let mut processed = 0;

        if let Some(rx) = self.catalogue_rx.take() {
            let mut keep = Some(rx);

            while let Some(r) = keep.as_ref() {
                if processed >= MAX_MSGS_PER_FRAME {
                    break;
                }
                match r.try_recv() {
                    Ok(CatalogueMsg::Info(s)) => {
                        self.set_status(s);
                        processed += 1;
                        seen_any = true;
                    }
                    Ok(CatalogueMsg::Done(cat)) => {
                        self.choices = FilterChoices {
                            genres: cat.genres(),
                            languages: cat.languages(),
                        };
                        self.stats = Some(cat.stats());
                        self.set_status(format!("Catalogue ready: {} movies.", cat.len()));
                        info!("catalogue ready in UI: {} movies", cat.len());
                        self.catalogue = Some(cat);
                        self.boot_phase = BootPhase::Ready;
                        keep = None;
                        seen_any = true;
                    }
                    Ok(CatalogueMsg::Error(e)) => {
                        self.set_status(e);
                        self.boot_phase = BootPhase::Degraded;
                        keep = None;
                        seen_any = true;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.boot_phase = BootPhase::Degraded;
                        keep = None;
                        break;
                    }
                }
            }

            if let Some(rx_back) = keep {
                self.catalogue_rx = Some(rx_back);
            }
        }

        if seen_any {
            ctx.request_repaint();
        }
    }

    fn collect_notices(&mut self) {
        let Some(d) = self.discovery.as_ref() else {
            return;
        };
        let fresh = d.notices().drain();
        if fresh.is_empty() {
            return;
        }
        if fresh.iter().any(|n| n.level == NoticeLevel::Error) {
            self.show_notices = true;
        }
        self.notices.extend(fresh);
        if self.notices.len() > MAX_NOTICES_KEPT {
            let excess = self.notices.len() - MAX_NOTICES_KEPT;
            self.notices.drain(..excess);
        }
    }

    fn run_search_if_dirty(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        let Some(d) = self.discovery.as_ref() else {
            return;
        };
        self.results = d.search(&self.filters.to_filter_set());
    }

    fn refresh(&mut self) {
        if matches!(self.boot_phase, BootPhase::Loading) {
            return;
        }
        if let Some(d) = self.discovery.as_ref() {
            d.refresh();
        }
        self.catalogue = None;
        self.choices = FilterChoices::default();
        self.stats = None;
        self.selected = None;
        self.start_catalogue_load();
        self.mark_dirty();
    }

    fn ui_render_status_bar(&mut self, ctx: &eg::Context) {
        eg::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if matches!(self.boot_phase, BootPhase::Loading) {
                    ui.add(eg::Spinner::new().size(12.0));
                }
                ui.label(eg::RichText::new(self.boot_phase.label()).strong());
                ui.separator();
                ui.label(&self.status_message);

                ui.with_layout(eg::Layout::right_to_left(eg::Align::Center), |ui| {
                    let label = format!("Notices ({})", self.notices.len());
                    ui.toggle_value(&mut self.show_notices, label);
                    let can_reload = self.discovery.is_some()
                        && !matches!(self.boot_phase, BootPhase::Loading);
                    if ui
                        .add_enabled(can_reload, eg::Button::new("Reload"))
                        .on_hover_text("Drop cached catalogue and searches")
                        .clicked()
                    {
                        self.refresh();
                    }
                });
            });

            if self.show_notices && !self.notices.is_empty() {
                ui.separator();
                eg::ScrollArea::vertical()
                    .max_height(120.0)
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for n in &self.notices {
                            let color = match n.level {
                                NoticeLevel::Info => ui.visuals().text_color(),
                                NoticeLevel::Warning => ui.visuals().warn_fg_color,
                                NoticeLevel::Error => ui.visuals().error_fg_color,
                            };
                            ui.label(eg::RichText::new(n.display_line()).color(color));
                        }
                    });
                if ui.small_button("Clear notices").clicked() {
                    self.notices.clear();
                }
            }
        });
    }
}

// ========== App impl ==========
impl eframe::App for ReelQuestApp {
    fn update(&mut self, ctx: &eg::Context, _frame: &mut eframe::Frame) {
        if !self.did_init {
            self.did_init = true;
            self.start_catalogue_load();
        }

        self.poll_catalogue(ctx);
        if self.catalogue_rx.is_some() {
            // keep polling while the worker runs
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        if let Some(err) = self.startup_error.clone() {
            eg::CentralPanel::default().show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(40.0);
                    ui.heading("ReelQuest");
                    ui.label(
                        eg::RichText::new("Could not open the movie warehouse.")
                            .color(ui.visuals().error_fg_color),
                    );
                    ui.monospace(err);
                    ui.separator();
                    ui.label("Check config.json or the REELQUEST_* environment variables, then restart.");
                });
            });
            return;
        }

        self.run_search_if_dirty();
        self.collect_notices();

        self.ui_render_status_bar(ctx);

        eg::SidePanel::left("filters_panel")
            .resizable(false)
            .default_width(220.0)
            .show(ctx, |ui| {
                eg::ScrollArea::vertical().show(ui, |ui| {
                    self.ui_render_filters(ui);
                    ui.add_space(12.0);
                    self.ui_render_stats(ui);
                });
            });

        if self.selected.is_some() {
            self.ui_render_detail_panel(ctx);
        }

        eg::CentralPanel::default().show(ctx, |ui| {
            self.ui_render_results(ui);
        });
    }
}
