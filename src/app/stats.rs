// src/app/stats.rs — catalogue counts by language and primary genre
use eframe::egui as eg;

const TOP_N: usize = 10;

fn counts_grid(ui: &mut eg::Ui, id: &str, rows: &[(String, usize)]) {
    eg::Grid::new(id).num_columns(2).striped(true).show(ui, |ui| {
        for (name, n) in rows.iter().take(TOP_N) {
            ui.label(name.as_str());
            ui.label(n.to_string());
            ui.end_row();
        }
    });
    if rows.len() > TOP_N {
        ui.label(eg::RichText::new(format!("…and {} more", rows.len() - TOP_N)).weak());
    }
}

impl crate::app::ReelQuestApp {
    pub(crate) fn ui_render_stats(&mut self, ui: &mut eg::Ui) {
        eg::CollapsingHeader::new("Catalogue statistics")
            .default_open(false)
            .show(ui, |ui| {
                let Some(stats) = self.stats.as_ref() else {
                    ui.label(eg::RichText::new("Catalogue not loaded.").weak());
                    return;
                };
                ui.label(format!("{} movies", stats.total));
                ui.add_space(4.0);
                ui.label(eg::RichText::new("By language").strong());
                counts_grid(ui, "stats_language", &stats.by_language);
                ui.add_space(4.0);
                ui.label(eg::RichText::new("By primary genre").strong());
                counts_grid(ui, "stats_genre", &stats.by_primary_genre);
            });
    }
}
