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

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use maud::Markup;
use maud::html;

use crate::drill::state::ServerState;
use crate::drill::template::page_template;
use crate::session::Direction;

pub async fn get_handler(State(state): State<ServerState>) -> (StatusCode, Html<String>) {
    let mutable = state.mutable.lock().unwrap();
    let body = if mutable.session.is_completed() {
        let session = &mutable.session;
        html! {
            div.finished {
                h1 {
                    "Session Complete"
                }
                p.summary {
                    (session.known_count()) " known, "
                    (session.again_count()) " again, "
                    (session.later_count()) " later"
                }
                @if let Some(streak) = mutable.streak {
                    @if streak == 1 {
                        p.streak { "Streak: 1 day" }
                    } @else {
                        p.streak { "Streak: " (streak) " days" }
                    }
                }
            }
        }
    } else {
        let (done, total) = mutable.session.progress();
        let progress = format!("{done} / {total}");
        let revealed = mutable.session.is_revealed();
        let direction = mutable.session.direction();
        let (deck_name, prompt, answer) = match mutable.current_card() {
            Some(card) => match direction {
                Direction::FrontToBack => {
                    (card.deck_name.clone(), card.front.clone(), card.back.clone())
                }
                Direction::BackToFront => {
                    (card.deck_name.clone(), card.back.clone(), card.front.clone())
                }
            },
            // The working set always covers the current card; render an
            // empty card rather than panicking if it somehow does not.
            None => (String::new(), String::new(), String::new()),
        };
        let card_content: Markup = if revealed {
            html! {
                div.content {
                    div.question {
                        p {
                            (prompt)
                        }
                    }
                    div.answer {
                        p {
                            (answer)
                        }
                    }
                }
            }
        } else {
            html! {
                div.content {
                    div.question {
                        p {
                            (prompt)
                        }
                    }
                    div.answer {}
                }
            }
        };
        let card_controls = if revealed {
            html! {
                form action="/" method="post" {
                    input id="again" type="submit" name="action" value="Again";
                    input id="later" type="submit" name="action" value="Later";
                    input id="known" type="submit" name="action" value="Known";
                }
            }
        } else {
            html! {
                form action="/" method="post" {
                    input id="reveal" type="submit" name="action" value="Reveal";
                }
            }
        };
        html! {
            div.root {
                div.card {
                    div.header {
                        h1 {
                            (deck_name)
                        }
                        div.progress {
                            (progress)
                        }
                    }
                    (card_content)
                    div.controls {
                        (card_controls)
                    }
                }
            }
        }
    };
    let html = page_template(body);
    (StatusCode::OK, Html(html.into_string()))
}
