// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::Router;
use axum::http::HeaderName;
use axum::http::StatusCode;
use axum::http::header::CACHE_CONTROL;
use axum::http::header::CONTENT_TYPE;
use axum::response::Html;
use axum::routing::get;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::time::sleep;

use crate::collection::Collection;
use crate::config::DEFAULT_LIMIT;
use crate::config::DEFAULT_PORT;
use crate::db::Database;
use crate::drill::get::get_handler;
use crate::drill::post::post_handler;
use crate::drill::state::MutableState;
use crate::drill::state::ServerState;
use crate::error::Fallible;
use crate::session::Direction;
use crate::session::Session;
use crate::types::timestamp::Timestamp;

pub async fn start_server(
    directory: Option<String>,
    deck: Option<String>,
    limit: Option<usize>,
    reverse: bool,
    port: Option<u16>,
) -> Fallible<()> {
    let collection = Collection::new(directory)?;
    let limit = limit.or(collection.config.limit).unwrap_or(DEFAULT_LIMIT);
    let port = port.or(collection.config.port).unwrap_or(DEFAULT_PORT);
    let direction = if reverse || collection.config.reverse.unwrap_or(false) {
        Direction::BackToFront
    } else {
        Direction::FrontToBack
    };
    let now = Timestamp::now();
    let session = open_session(&collection.db, deck, limit, direction, now)?;

    // The session's working set.
    let mut cards = HashMap::new();
    let snapshot = session.snapshot();
    for card_id in snapshot.primary.iter().chain(snapshot.deferred.iter()) {
        cards.insert(*card_id, collection.db.get_card(*card_id)?);
    }

    let state = ServerState {
        mutable: Arc::new(Mutex::new(MutableState {
            db: collection.db,
            session,
            cards,
            streak: None,
        })),
    };
    let app = Router::new();
    let app = app.route("/", get(get_handler));
    let app = app.route("/", post(post_handler));
    let app = app.route("/script.js", get(script));
    let app = app.route("/style.css", get(stylesheet));
    let app = app.fallback(not_found_handler);
    let app = app.with_state(state);
    let bind = format!("0.0.0.0:{port}");

    // Start a separate task to open the browser.
    let url = format!("http://{bind}/");
    let probe = bind.clone();
    tokio::spawn(async move {
        loop {
            if let Ok(stream) = TcpStream::connect(&probe).await {
                drop(stream);
                break;
            }
            sleep(Duration::from_millis(1)).await;
        }
        let _ = open::that(url);
    });

    // Start the server.
    log::debug!("Starting server on {bind}");
    let listener = TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Resume the most recent incomplete session for the grouping, or build a
/// fresh one. Open sessions from a previous day are abandoned, not resumed.
fn open_session(
    db: &Database,
    deck: Option<String>,
    limit: usize,
    direction: Direction,
    now: Timestamp,
) -> Fallible<Session> {
    let today = now.local_date();
    if let Some(snapshot) = db.latest_open_session(deck.as_deref())? {
        if snapshot.started_at.local_date() == today {
            log::debug!("Resuming session {}", snapshot.session_id);
            return Ok(Session::resume(snapshot));
        }
        db.abandon_session(snapshot.session_id, now)?;
    }
    let cards = db.get_cards(deck.as_deref())?;
    let mut session = Session::build(deck, &cards, limit, direction, now)?;
    session.set_id(db.insert_session(&session.snapshot())?);
    Ok(session)
}

async fn script() -> (StatusCode, [(HeaderName, &'static str); 1], &'static str) {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/javascript")],
        include_str!("script.js"),
    )
}

async fn stylesheet() -> (StatusCode, [(HeaderName, &'static str); 2], &'static [u8]) {
    let bytes = include_bytes!("style.css");
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/css"),
            (CACHE_CONTROL, "public, max-age=604800, immutable"),
        ],
        bytes,
    )
}

async fn not_found_handler() -> (StatusCode, Html<String>) {
    (StatusCode::NOT_FOUND, Html("Not Found".to_string()))
}
