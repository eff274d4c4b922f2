mod app;

use app::MyApp;
use chrono::Utc;
use log::{info, warn};
use rusqlite::Connection;
use study_notes::Config;
use study_notes::database::{StoreResult, db, open_db, users};
use study_notes::logging::init_logging;
use study_notes::models::Difficulty;

const SAMPLE_SET_NAME: &str = "Polish Vocabulary";
const SAMPLE_CARDS: [(&str, &str); 3] = [
    ("cześć", "hello"),
    ("dziękuję", "thank you"),
    ("proszę", "please"),
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    config.validate()?;

    if let Err(err) = init_logging(&config.log_level, &config.log_dir) {
        eprintln!("logging disabled: {err}");
    }

    let conn = open_db(&config.db_path)?;
    let user = users::get_or_create_user(&conn, &config.username, Utc::now())?;
    seed_sample_set(&conn, user.id)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([520.0, 760.0]),
        ..Default::default()
    };
    let user_id = user.id;
    eframe::run_native(
        "Study Notes",
        options,
        Box::new(move |_cc| Ok(Box::new(MyApp::new(conn, user_id)))),
    )?;
    Ok(())
}

/// Gives a fresh profile one set to study.
fn seed_sample_set(conn: &Connection, user_id: i64) -> StoreResult<()> {
    if !db::list_flashcard_sets(conn, user_id, None)?.is_empty() {
        return Ok(());
    }

    let now = db::get_current_date(conn)?;
    let set = db::create_flashcard_set(conn, user_id, SAMPLE_SET_NAME, None, None, now)?;
    for (front, back) in SAMPLE_CARDS {
        if let Err(err) = db::add_flashcard(conn, user_id, set.id, front, back, Difficulty::Easy, now) {
            warn!("event=seed module=main status=error set_id={} error={}", set.id, err);
        }
    }
    info!("event=seed module=main status=ok set_id={} cards={}", set.id, SAMPLE_CARDS.len());
    Ok(())
}
