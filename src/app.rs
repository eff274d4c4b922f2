//! Desktop UI: flashcard sets, study sessions against the simulated clock,
//! notes, and JSON import/export of sets.

use chrono::{DateTime, Utc};
use eframe::egui;
use log::{error, warn};
use rusqlite::Connection;
use study_notes::database::{StoreResult, db, notes};
use study_notes::export::ExportError;
use study_notes::export::json::{build_export, export_json_to_path, import_into, import_json};
use study_notes::models::{
    Difficulty, Flashcard, FlashcardSet, LearningSession, Note, NoteDraft, ReviewOutcome,
};

/// Application screen states
#[derive(Default, PartialEq, Eq)]
enum AppScreen {
    #[default]
    Main,
    LearningSession,
    Notes,
}

struct SetRow {
    set: FlashcardSet,
    due: u32,
}

/// Main application state
pub struct MyApp {
    conn: Connection,
    user_id: i64,
    current_date: Option<DateTime<Utc>>,

    show_confirmation_dialog: bool,
    allowed_to_close: bool,
    current_screen: AppScreen,

    sets: Vec<SetRow>,
    selected_set_id: Option<i64>,
    cards: Vec<Flashcard>,
    new_set_name: String,
    new_set_description: String,
    current_front: String,
    current_back: String,
    current_difficulty: Difficulty,

    learning_session: Option<LearningSession>,
    last_outcome: Option<ReviewOutcome>,

    notes: Vec<Note>,
    note_title: String,
    note_content: String,
    note_tags: String,

    show_export_dialog: bool,
    show_message_dialog: bool,
    message: String,
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        match self.current_screen {
            AppScreen::Main => self.render_main_screen(ctx),
            AppScreen::LearningSession => self.render_learning_screen(ctx),
            AppScreen::Notes => self.render_notes_screen(ctx),
        }

        if ctx.input(|i| i.viewport().close_requested()) && !self.allowed_to_close {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.show_confirmation_dialog = true;
        }

        if self.show_confirmation_dialog {
            egui::Window::new("Do you want to quit?")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        if ui.button("No").clicked() {
                            self.show_confirmation_dialog = false;
                            self.allowed_to_close = false;
                        }

                        if ui.button("Yes").clicked() {
                            self.show_confirmation_dialog = false;
                            self.allowed_to_close = true;
                            ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                        }
                    });
                });
        }

        if self.show_export_dialog {
            let mut export_set_id: Option<i64> = None;
            let mut should_cancel = false;

            egui::Window::new("Export Flashcard Set")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label("Select a set to export:");
                    ui.separator();

                    for row in &self.sets {
                        if ui
                            .button(format!("{} ({} cards)", row.set.name, row.set.card_count))
                            .clicked()
                        {
                            export_set_id = Some(row.set.id);
                        }
                    }

                    ui.separator();
                    if ui.button("Cancel").clicked() {
                        should_cancel = true;
                    }
                });

            if let Some(set_id) = export_set_id {
                self.handle_export(set_id);
            }
            if should_cancel {
                self.show_export_dialog = false;
            }
        }

        if self.show_message_dialog {
            egui::Window::new("Study Notes")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(&self.message);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.show_message_dialog = false;
                    }
                });
        }
    }
}

impl MyApp {
    pub fn new(conn: Connection, user_id: i64) -> Self {
        let mut app = Self {
            conn,
            user_id,
            current_date: None,
            show_confirmation_dialog: false,
            allowed_to_close: false,
            current_screen: AppScreen::Main,
            sets: Vec::new(),
            selected_set_id: None,
            cards: Vec::new(),
            new_set_name: String::new(),
            new_set_description: String::new(),
            current_front: String::new(),
            current_back: String::new(),
            current_difficulty: Difficulty::default(),
            learning_session: None,
            last_outcome: None,
            notes: Vec::new(),
            note_title: String::new(),
            note_content: String::new(),
            note_tags: String::new(),
            show_export_dialog: false,
            show_message_dialog: false,
            message: String::new(),
        };
        app.reload();
        app.selected_set_id = app.sets.first().map(|row| row.set.id);
        app.reload_cards();
        app
    }

    fn now(&self) -> DateTime<Utc> {
        self.current_date.unwrap_or_else(Utc::now)
    }

    fn show_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.show_message_dialog = true;
    }

    fn report<T>(&mut self, context: &str, result: StoreResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("event=ui_action module=app status=error action={context} error={err}");
                self.show_message(format!("{context} failed: {err}"));
                None
            }
        }
    }

    /// Reloads the clock and the set list with due counts.
    fn reload(&mut self) {
        match db::get_current_date(&self.conn) {
            Ok(date) => self.current_date = Some(date),
            Err(err) => error!("event=clock_read module=app status=error error={err}"),
        }
        let now = self.now();

        let sets = db::list_flashcard_sets(&self.conn, self.user_id, None).and_then(|sets| {
            sets.into_iter()
                .map(|set| {
                    let due = db::count_due_flashcards(&self.conn, set.id, now)?;
                    Ok(SetRow { set, due })
                })
                .collect::<StoreResult<Vec<_>>>()
        });
        if let Some(sets) = self.report("Loading sets", sets) {
            self.sets = sets;
        }
    }

    fn reload_cards(&mut self) {
        self.cards.clear();
        if let Some(set_id) = self.selected_set_id {
            let cards = db::list_flashcards(&self.conn, self.user_id, set_id, None);
            if let Some(cards) = self.report("Loading flashcards", cards) {
                self.cards = cards;
            }
        }
    }

    fn reload_notes(&mut self) {
        let notes = notes::list_notes(&self.conn, self.user_id, &notes::NoteFilter::default());
        if let Some(notes) = self.report("Loading notes", notes) {
            self.notes = notes;
        }
    }

    fn render_main_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                let date = self
                    .current_date
                    .map(|date| date.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                ui.label(date);

                if ui.button("Next Day").clicked() {
                    let advanced = db::advance_day(&self.conn);
                    if self.report("Advancing the day", advanced).is_some() {
                        self.reload();
                        self.reload_cards();
                    }
                }
                if ui.button("Notes").clicked() {
                    self.reload_notes();
                    self.current_screen = AppScreen::Notes;
                }
            });
            ui.separator();

            ui.horizontal(|ui| {
                if ui.button("Export Set").clicked() {
                    self.show_export_dialog = true;
                }
                if ui.button("Import Set").clicked() {
                    self.handle_import();
                }
            });
            ui.separator();

            ui.heading("Create New Set");
            ui.horizontal(|ui| {
                ui.label("Name:");
                ui.text_edit_singleline(&mut self.new_set_name);
            });
            ui.horizontal(|ui| {
                ui.label("Description:");
                ui.text_edit_singleline(&mut self.new_set_description);
            });
            if ui.button("Create Set").clicked() && !self.new_set_name.trim().is_empty() {
                self.handle_create_set();
            }
            ui.separator();

            ui.heading(format!("Flashcard Sets ({})", self.sets.len()));

            let mut action_select: Option<i64> = None;
            let mut action_learn: Option<i64> = None;
            let mut action_delete: Option<i64> = None;

            egui::ScrollArea::vertical()
                .id_source("sets_list")
                .max_height(150.0)
                .show(ui, |ui| {
                    for row in &self.sets {
                        let is_selected = self.selected_set_id == Some(row.set.id);
                        ui.horizontal(|ui| {
                            let label = format!(
                                "{} ({} cards, {} due)",
                                row.set.name, row.set.card_count, row.due
                            );
                            if ui.selectable_label(is_selected, label).clicked() {
                                action_select = Some(row.set.id);
                            }
                            if ui
                                .add_enabled(row.due > 0, egui::Button::new("Learn"))
                                .clicked()
                            {
                                action_learn = Some(row.set.id);
                            }
                            if ui.small_button("Delete").clicked() {
                                action_delete = Some(row.set.id);
                            }
                        });
                    }
                });

            if let Some(set_id) = action_select {
                self.selected_set_id = Some(set_id);
                self.reload_cards();
            }
            if let Some(set_id) = action_learn {
                self.start_learning_session(set_id);
            }
            if let Some(set_id) = action_delete {
                let deleted = db::delete_flashcard_set(&self.conn, self.user_id, set_id);
                if self.report("Deleting the set", deleted).is_some() {
                    if self.selected_set_id == Some(set_id) {
                        self.selected_set_id = None;
                    }
                    self.reload();
                    self.reload_cards();
                }
            }

            ui.separator();
            self.render_selected_set(ui);
        });
    }

    fn render_selected_set(&mut self, ui: &mut egui::Ui) {
        let Some(set_id) = self.selected_set_id else {
            ui.label("Select a set to add flashcards");
            return;
        };
        let name = self
            .sets
            .iter()
            .find(|row| row.set.id == set_id)
            .map(|row| row.set.name.clone())
            .unwrap_or_default();
        ui.heading(format!("Selected Set: {name}"));

        ui.horizontal(|ui| {
            ui.label("Front:");
            ui.text_edit_singleline(&mut self.current_front);
        });
        ui.horizontal(|ui| {
            ui.label("Back:");
            ui.text_edit_singleline(&mut self.current_back);
        });
        ui.horizontal(|ui| {
            ui.label("Difficulty:");
            for difficulty in Difficulty::ALL {
                ui.radio_value(&mut self.current_difficulty, difficulty, difficulty.as_str());
            }
        });
        if ui.button("Add Flashcard").clicked()
            && !self.current_front.trim().is_empty()
            && !self.current_back.trim().is_empty()
        {
            let added = db::add_flashcard(
                &self.conn,
                self.user_id,
                set_id,
                &self.current_front,
                &self.current_back,
                self.current_difficulty,
                self.now(),
            );
            if self.report("Adding the flashcard", added).is_some() {
                self.current_front.clear();
                self.current_back.clear();
                self.reload();
                self.reload_cards();
            }
        }
        ui.separator();

        ui.heading(format!("Flashcards ({})", self.cards.len()));
        let now = self.now();
        egui::ScrollArea::vertical()
            .id_source("flashcards_list")
            .max_height(200.0)
            .show(ui, |ui| {
                for (i, card) in self.cards.iter().enumerate() {
                    ui.group(|ui| {
                        ui.label(format!("{}. {} [{}]", i + 1, card.front, card.difficulty));
                        ui.label(format!("   {}", card.back));
                        let schedule = &card.schedule;
                        let status = match schedule.next_review_at {
                            _ if schedule.is_new() => "new".to_string(),
                            _ if card.is_due(now) => "due now".to_string(),
                            Some(next) => format!("next review {}", next.format("%Y-%m-%d")),
                            None => "due now".to_string(),
                        };
                        ui.label(format!(
                            "   ease {:.2}, {} reviews ({:.0}% correct), {}",
                            schedule.ease_factor,
                            schedule.review_count,
                            schedule.accuracy(),
                            status
                        ));
                    });
                }
            });
    }

    fn render_learning_screen(&mut self, ctx: &egui::Context) {
        // Read before `session` mutably borrows `self.learning_session`.
        let now = self.now();
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(session) = &mut self.learning_session else {
                self.current_screen = AppScreen::Main;
                return;
            };
            ui.heading(format!("Learning: {}", session.set_name));
            ui.label(session.phase_message());
            ui.label(format!(
                "Progress: {} / {} learned ({} remaining)",
                session.learned_count(),
                session.total_count(),
                session.remaining_count()
            ));
            if let Some(outcome) = &self.last_outcome {
                ui.label(format!(
                    "Last card: next review in {} day(s), ease {:.2}",
                    outcome.interval, outcome.ease_factor
                ));
            }
            ui.add_space(20.0);

            let mut action_back = false;
            let mut action_toggle = false;
            let mut action_grade: Option<u8> = None;

            if session.is_completed() {
                ui.heading("Congratulations!");
                ui.label("You've learned all due cards in this set!");
                ui.add_space(20.0);
                if ui.button("Back to Main Screen").clicked() {
                    action_back = true;
                }
            } else if let Some(card) = session.current_card() {
                let show_back = session.show_back;
                let is_learned = card.is_learned;

                ui.group(|ui| {
                    ui.set_min_height(200.0);
                    ui.vertical_centered(|ui| {
                        ui.add_space(20.0);
                        ui.heading("Front:");
                        ui.label(&card.flashcard.front);
                        ui.add_space(20.0);
                        if show_back {
                            ui.heading("Back:");
                            ui.label(&card.flashcard.back);
                        } else {
                            ui.label("(Click 'Show Answer' to reveal)");
                        }
                        ui.add_space(20.0);
                    });
                });
                ui.add_space(20.0);

                if !show_back && ui.button("Show Answer").clicked() {
                    action_toggle = true;
                }

                if show_back && !is_learned {
                    ui.label("Rate your response:");
                    ui.horizontal(|ui| {
                        for (quality, label) in
                            [(0, "0 - Blackout"), (1, "1 - Wrong"), (2, "2 - Wrong (familiar)")]
                        {
                            if ui.button(label).clicked() {
                                action_grade = Some(quality);
                            }
                        }
                    });
                    ui.horizontal(|ui| {
                        for (quality, label) in
                            [(3, "3 - Difficult"), (4, "4 - Correct"), (5, "5 - Perfect")]
                        {
                            if ui.button(label).clicked() {
                                action_grade = Some(quality);
                            }
                        }
                    });
                }

                ui.add_space(20.0);
                if ui.button("Back to Main Screen").clicked() {
                    action_back = true;
                }
            }

            if action_toggle {
                session.toggle_back();
            }
            if let Some(quality) = action_grade {
                match session.grade_current_card(&self.conn, quality, now) {
                    Ok(outcome) => {
                        self.last_outcome = outcome;
                        session.next_card();
                    }
                    Err(err) => {
                        warn!("event=ui_review module=app status=error error={err}");
                        self.message = format!("Saving the review failed: {err}");
                        self.show_message_dialog = true;
                    }
                }
            }
            if action_back {
                self.finish_learning_session();
            }
        });
    }

    fn render_notes_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if ui.button("Back to Main Screen").clicked() {
                self.current_screen = AppScreen::Main;
            }
            ui.separator();

            ui.heading("New Note");
            ui.horizontal(|ui| {
                ui.label("Title:");
                ui.text_edit_singleline(&mut self.note_title);
            });
            ui.label("Content:");
            ui.text_edit_multiline(&mut self.note_content);
            ui.horizontal(|ui| {
                ui.label("Tags (comma separated):");
                ui.text_edit_singleline(&mut self.note_tags);
            });
            if ui.button("Save Note").clicked() && !self.note_title.trim().is_empty() {
                self.handle_create_note();
            }
            ui.separator();

            ui.heading(format!("Notes ({})", self.notes.len()));
            let mut action_delete: Option<i64> = None;
            egui::ScrollArea::vertical()
                .id_source("notes_list")
                .show(ui, |ui| {
                    for note in &self.notes {
                        ui.group(|ui| {
                            ui.horizontal(|ui| {
                                ui.strong(&note.title);
                                if ui.small_button("Delete").clicked() {
                                    action_delete = Some(note.id);
                                }
                            });
                            ui.label(note.excerpt(100));
                            if !note.tags.is_empty() {
                                ui.label(format!("Tags: {}", note.tags.join(", ")));
                            }
                        });
                    }
                });

            if let Some(note_id) = action_delete {
                let deleted = notes::delete_note(&self.conn, self.user_id, note_id);
                if self.report("Deleting the note", deleted).is_some() {
                    self.reload_notes();
                }
            }
        });
    }

    fn handle_create_set(&mut self) {
        let created = db::create_flashcard_set(
            &self.conn,
            self.user_id,
            &self.new_set_name,
            Some(self.new_set_description.as_str()),
            None,
            self.now(),
        );
        if let Some(set) = self.report("Creating the set", created) {
            self.new_set_name.clear();
            self.new_set_description.clear();
            self.selected_set_id = Some(set.id);
            self.reload();
            self.reload_cards();
        }
    }

    fn handle_create_note(&mut self) {
        let draft = NoteDraft {
            title: self.note_title.clone(),
            content: self.note_content.clone(),
            category_id: None,
            tags: self
                .note_tags
                .split(',')
                .map(str::to_string)
                .filter(|tag| !tag.trim().is_empty())
                .collect(),
            source_url: None,
        };
        let created = notes::create_note(&self.conn, self.user_id, &draft, self.now());
        if self.report("Saving the note", created).is_some() {
            self.note_title.clear();
            self.note_content.clear();
            self.note_tags.clear();
            self.reload_notes();
        }
    }

    /// Starts a session over the set's due cards, if any.
    fn start_learning_session(&mut self, set_id: i64) {
        let Some(set) = self
            .sets
            .iter()
            .find(|row| row.set.id == set_id)
            .map(|row| row.set.clone())
        else {
            return;
        };
        let started = LearningSession::start_for_due_cards(&self.conn, self.user_id, &set, self.now());
        match self.report("Starting the session", started) {
            Some(Some(session)) => {
                self.learning_session = Some(session);
                self.last_outcome = None;
                self.current_screen = AppScreen::LearningSession;
            }
            Some(None) => self.show_message(format!("No cards in '{}' are due today.", set.name)),
            None => {}
        }
    }

    fn finish_learning_session(&mut self) {
        if let Some(mut session) = self.learning_session.take() {
            let now = self.now();
            let finished = session.finish(&self.conn, now).map(|record| {
                format!(
                    "Session finished: {} studied, {:.0}% correct.",
                    record.cards_studied,
                    record.accuracy()
                )
            });
            if let Some(summary) = self.report("Ending the session", finished) {
                self.show_message(summary);
            }
        }
        self.current_screen = AppScreen::Main;
        self.reload();
        self.reload_cards();
    }

    fn handle_export(&mut self, set_id: i64) {
        self.show_export_dialog = false;
        let export = match build_export(&self.conn, self.user_id, set_id) {
            Ok(export) => export,
            Err(err) => {
                self.show_message(format!("Export failed: {err}"));
                return;
            }
        };

        if let Some(path) = rfd::FileDialog::new()
            .set_file_name(format!("{}.json", export.name))
            .add_filter("JSON files", &["json"])
            .save_file()
        {
            match export_json_to_path(&export, &path) {
                Ok(()) => self.show_message(format!("Set '{}' exported successfully!", export.name)),
                Err(err) => self.show_message(format!("Export failed: {err}")),
            }
        }
    }

    fn handle_import(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON files", &["json"])
            .pick_file()
        else {
            return;
        };

        let imported = import_json(&path)
            .and_then(|export| import_into(&self.conn, self.user_id, &export, self.now()));
        match imported {
            Ok(set) => {
                self.selected_set_id = Some(set.id);
                self.reload();
                self.reload_cards();
                self.show_message(format!(
                    "Set '{}' imported successfully with {} cards!",
                    set.name, set.card_count
                ));
            }
            Err(ExportError::DuplicateSet(name)) => self.show_message(format!(
                "Set '{name}' already exists! Please rename it in the JSON file."
            )),
            Err(err) => self.show_message(format!(
                "Import failed: {err}\n\nPlease check that the file has this structure:\n{{\n  \"name\": \"Set Name\",\n  \"flashcards\": [...]\n}}"
            )),
        }
    }
}
