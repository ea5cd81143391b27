// src/app/filters.rs — filter panel state and widgets
use chrono::Datelike;
use eframe::egui as eg;

use crate::query::{FilterSet, MAX_RATING, MIN_RELEASE_YEAR};

/// Lower bound the year range starts at.
pub const DEFAULT_FROM_YEAR: i32 = 1900;

/// What the widgets hold between frames.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterState {
    pub title: String,
    /// Empty = any genre.
    pub genre: String,
    /// Empty = any language.
    pub language: String,
    pub limit_years: bool,
    pub year_from: i32,
    pub year_to: i32,
    /// 0 = no threshold.
    pub min_rating: f64,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            title: String::new(),
            genre: String::new(),
            language: String::new(),
            limit_years: true,
            year_from: DEFAULT_FROM_YEAR,
            year_to: current_year(),
            min_rating: 0.0,
        }
    }
}

pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

impl FilterState {
    pub fn to_filter_set(&self) -> FilterSet {
        let mut f = FilterSet::title(self.title.clone());
        if !self.genre.trim().is_empty() {
            f = f.with_genre(self.genre.clone());
        }
        if !self.language.trim().is_empty() {
            f = f.with_language(self.language.clone());
        }
        if self.limit_years {
            f = f.with_years(self.year_from, self.year_to);
        }
        if self.min_rating > 0.0 {
            f = f.with_min_rating(self.min_rating.min(MAX_RATING));
        }
        f
    }
}

fn choice_combo(
    ui: &mut eg::Ui,
    id: &str,
    value: &mut String,
    choices: &[String],
    enabled: bool,
) -> bool {
    let mut changed = false;
    let shown = if value.is_empty() { "Any" } else { value.as_str() }.to_owned();
    ui.add_enabled_ui(enabled, |ui| {
        eg::ComboBox::from_id_source(id)
            .selected_text(shown)
            .width(160.0)
            .show_ui(ui, |ui| {
                changed |= ui.selectable_value(value, String::new(), "Any").clicked();
                for c in choices {
                    changed |= ui.selectable_value(value, c.clone(), c.as_str()).clicked();
                }
            });
    });
    changed
}

impl crate::app::ReelQuestApp {
    pub(crate) fn ui_render_filters(&mut self, ui: &mut eg::Ui) {
        let have_choices = self.catalogue.is_some();
        let mut changed = false;

        ui.heading("Filters");
        ui.separator();

        ui.label("Genre");
        changed |= choice_combo(
            ui,
            "genre_combo",
            &mut self.filters.genre,
            &self.choices.genres,
            have_choices,
        );
        ui.add_space(6.0);

        ui.label("Language");
        changed |= choice_combo(
            ui,
            "language_combo",
            &mut self.filters.language,
            &self.choices.languages,
            have_choices,
        );
        ui.add_space(6.0);

        changed |= ui
            .checkbox(&mut self.filters.limit_years, "Released between")
            .changed();
        let max_year = current_year();
        ui.add_enabled_ui(self.filters.limit_years, |ui| {
            changed |= ui
                .add(eg::Slider::new(&mut self.filters.year_from, MIN_RELEASE_YEAR..=max_year).text("from"))
                .changed();
            changed |= ui
                .add(eg::Slider::new(&mut self.filters.year_to, MIN_RELEASE_YEAR..=max_year).text("to"))
                .changed();
        });
        ui.add_space(6.0);

        ui.label("Minimum average rating");
        changed |= ui
            .add(
                eg::Slider::new(&mut self.filters.min_rating, 0.0..=MAX_RATING)
                    .step_by(0.5)
                    .custom_formatter(|v, _| if v <= 0.0 { "off".into() } else { format!("{v:.1}") }),
            )
            .changed();

        ui.add_space(8.0);
        if ui.button("Reset filters").clicked() {
            self.filters = FilterState {
                title: std::mem::take(&mut self.filters.title),
                ..FilterState::default()
            };
            changed = true;
        }

        if changed {
            self.mark_dirty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_limit_years_only() {
        let f = FilterState::default().to_filter_set();
        assert!(f.effective_title_prefix().is_none());
        assert!(f.genre.is_none() && f.language.is_none());
        let years = f.years.unwrap();
        assert_eq!(years.from(), DEFAULT_FROM_YEAR);
        assert_eq!(years.to(), current_year());
        assert!(f.min_rating.is_none());
    }

    #[test]
    fn zero_rating_means_no_threshold() {
        let mut s = FilterState {
            limit_years: false,
            ..FilterState::default()
        };
        assert!(s.to_filter_set().is_unfiltered());
        s.min_rating = 3.0;
        assert_eq!(s.to_filter_set().min_rating, Some(3.0));
    }

    #[test]
    fn picked_choices_pass_through() {
        let s = FilterState {
            title: "Toy".into(),
            genre: "Animation".into(),
            language: "en".into(),
            year_from: 2000,
            year_to: 1990,
            ..FilterState::default()
        };
        let f = s.to_filter_set();
        assert_eq!(f.effective_title_prefix().as_deref(), Some("toy"));
        assert_eq!(f.effective_genre(), Some("Animation"));
        assert_eq!(f.effective_language(), Some("en"));
        assert_eq!(f.years.map(|y| (y.from(), y.to())), Some((1990, 2000)));
    }
}
