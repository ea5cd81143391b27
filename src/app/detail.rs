// src/app/detail.rs
use eframe::egui as eg;

use crate::query::SearchResult;

impl crate::app::ReelQuestApp {
    /// Resolve a picked title and fetch its metadata (blocking, up to three lookups).
    pub(crate) fn open_detail(&mut self, title: &str, average_rating: f64) {
        let Some(d) = self.discovery.as_ref() else {
            return;
        };
        match d.details(title, average_rating) {
            Some(detail) => {
                self.set_status(format!("Showing {title}"));
                self.selected = Some(detail);
            }
            None => {
                self.set_status(format!("No details available for {title}"));
                self.selected = None;
            }
        }
    }

    pub(crate) fn ui_render_detail_panel(&mut self, ctx: &eg::Context) {
        let mut close = false;

        eg::SidePanel::right("detail_panel")
            .resizable(true)
            .default_width(340.0)
            .min_width(260.0)
            .show(ctx, |ui| {
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    ui.heading("Details");
                    ui.with_layout(eg::Layout::right_to_left(eg::Align::Center), |ui| {
                        if ui.button("Close").clicked() {
                            close = true;
                        }
                    });
                });
                ui.separator();

                let Some(detail) = self.selected.as_ref() else {
                    return;
                };
                let m = &detail.movie;

                let title = match m.release_year {
                    Some(y) => format!("{} ({})", m.title, y),
                    None => m.title.clone(),
                };
                ui.heading(title);
                ui.add_space(6.0);

                eg::Grid::new("detail_grid")
                    .num_columns(2)
                    .spacing([12.0, 4.0])
                    .show(ui, |ui| {
                        ui.label(eg::RichText::new("Genre").strong());
                        ui.label(m.genre_list().join(", "));
                        ui.end_row();

                        ui.label(eg::RichText::new("Language").strong());
                        ui.label(if m.language.is_empty() { "—" } else { m.language.as_str() });
                        ui.end_row();

                        ui.label(eg::RichText::new("Average rating").strong());
                        ui.label(super::results::star_line(&SearchResult {
                            title: m.title.clone(),
                            average_rating: detail.average_rating,
                        }));
                        ui.end_row();
                    });

                ui.add_space(8.0);
                ui.separator();

                ui.label(eg::RichText::new("Poster").strong());
                match &detail.metadata.poster_url {
                    Some(url) => {
                        ui.hyperlink_to("Open poster image", url);
                    }
                    None => {
                        ui.label(eg::RichText::new(format!("No poster found for {}", m.title)).weak());
                    }
                }
                ui.add_space(6.0);

                ui.label(eg::RichText::new("Description").strong());
                match &detail.metadata.synopsis {
                    Some(text) => {
                        ui.add(eg::Label::new(text.as_str()).wrap());
                    }
                    None => {
                        ui.label(eg::RichText::new("No description available.").weak());
                    }
                }
                ui.add_space(6.0);

                ui.label(eg::RichText::new("Trailer").strong());
                match &detail.metadata.trailer_url {
                    Some(url) => {
                        ui.hyperlink_to("Watch on YouTube", url);
                    }
                    None => {
                        ui.label(eg::RichText::new("No trailer found.").weak());
                    }
                }
            });

        if close {
            self.selected = None;
        }
    }
}
