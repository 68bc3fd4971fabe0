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

use crate::db::Database;
use crate::session::Session;
use crate::types::card::Card;
use crate::types::card::CardId;

#[derive(Clone)]
pub struct ServerState {
    pub mutable: Arc<Mutex<MutableState>>,
}

pub struct MutableState {
    pub db: Database,
    pub session: Session,
    /// The session's working set of cards, kept in step with the database
    /// as evaluations are recorded.
    pub cards: HashMap<CardId, Card>,
    /// The streak as of session completion, for the summary page.
    pub streak: Option<u32>,
}

impl MutableState {
    pub fn current_card(&self) -> Option<&Card> {
        let card_id = self.session.current_card()?;
        self.cards.get(&card_id)
    }
}
