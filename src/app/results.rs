// src/app/results.rs — search box and result list
use eframe::egui as eg;

use crate::query::{SearchResult, MAX_RATING};

pub(crate) fn star_line(r: &SearchResult) -> String {
    let full = r.stars();
    let empty = (MAX_RATING as usize).saturating_sub(full);
    format!("{}{} ({:.1})", "★".repeat(full), "☆".repeat(empty), r.display_rating())
}

impl crate::app::ReelQuestApp {
    pub(crate) fn ui_render_results(&mut self, ui: &mut eg::Ui) {
        ui.horizontal(|ui| {
            let resp = ui.add(
                eg::TextEdit::singleline(&mut self.filters.title)
                    .hint_text("Type to search for movie titles")
                    .desired_width(320.0),
            );
            if resp.changed() {
                self.mark_dirty();
            }
            if !self.filters.title.is_empty() && ui.small_button("✖").clicked() {
                self.filters.title.clear();
                self.mark_dirty();
            }
        });
        ui.separator();

        if self.results.is_empty() {
            ui.label("No matching titles found.");
            return;
        }
        ui.label(format!("Number of movies found: {}", self.results.len()));
        ui.add_space(4.0);

        let mut picked: Option<(String, f64)> = None;
        let results = std::sync::Arc::clone(&self.results);
        let row_h = ui.spacing().interact_size.y + 4.0;

        eg::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show_rows(ui, row_h, results.len(), |ui, range| {
                for r in &results[range] {
                    ui.horizontal(|ui| {
                        let is_selected = self
                            .selected
                            .as_ref()
                            .is_some_and(|d| d.movie.title == r.title);
                        if ui.selectable_label(is_selected, r.title.as_str()).clicked() {
                            picked = Some((r.title.clone(), r.average_rating));
                        }
                        ui.label(eg::RichText::new(star_line(r)).weak());
                    });
                }
            });

        if let Some((title, avg)) = picked {
            self.open_detail(&title, avg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_line_pads_to_five() {
        let r = SearchResult {
            title: "Toy Story".into(),
            average_rating: 4.5,
        };
        assert_eq!(star_line(&r), "★★★★☆ (4.5)");

        let low = SearchResult {
            title: "Toy Soldiers".into(),
            average_rating: 2.0,
        };
        assert_eq!(star_line(&low), "★★☆☆☆ (2.0)");
    }
}
